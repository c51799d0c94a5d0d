//! SeaORM entities for the recipe store.
//!
//! Every row except `users` is owned by exactly one user through `user_id`,
//! directly or through the recipe it links.

pub mod user;
pub mod recipe;
pub mod tag;
pub mod ingredient;
pub mod recipe_tag;
pub mod recipe_ingredient;

