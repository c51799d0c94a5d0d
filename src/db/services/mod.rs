//! The `services` module is the data-access layer. Each sub-module owns the
//! queries for one entity (tags and ingredients share `attribute_service`);
//! HTTP handlers call these functions and never build queries themselves.
//!
//! Every function that reads or writes owned rows takes the owner's `user_id`
//! and filters on it, so a row belonging to another user is indistinguishable
//! from a missing one.

pub mod attribute_service;
pub mod recipe_service;
pub mod user_service;

pub use attribute_service::*;
pub use recipe_service::*;
pub use user_service::*;

use sea_orm::{DbErr, SqlErr};

/// True when the error is a unique constraint violation reported by the database.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
