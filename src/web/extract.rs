use axum::extract::{FromRequest, FromRequestParts};

use crate::web::error::AppError;

/// `axum::Json`, but malformed or wrongly typed bodies become a 400 in the
/// same shape as field validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Path`. An id segment that does not parse names no
/// resource, so it is a JSON 404 rather than a plain-text 400.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);
