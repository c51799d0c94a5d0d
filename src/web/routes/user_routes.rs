use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::services::auth_service;
use crate::web::extract::AppJson;
use crate::web::middleware::auth::TOKEN_COOKIE;
use crate::web::models::{
    AuthenticatedUser, CreateUserRequest, TokenRequest, TokenResponse, UpdateProfileRequest, UserResponse,
};
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn create_user_handler(
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user_response = auth_service::register_user(&app_state.db_pool, &app_state.config, payload).await?;
    Ok((StatusCode::CREATED, Json(user_response)))
}

async fn create_token_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(payload): AppJson<TokenRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let token_response = auth_service::issue_token(&app_state.db_pool, &app_state.config, payload).await?;

    let auth_cookie = Cookie::build((TOKEN_COOKIE, token_response.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();

    Ok((jar.add(auth_cookie), Json(token_response)))
}

async fn get_me_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserResponse>, AppError> {
    let profile = auth_service::get_profile(&app_state.db_pool, authenticated_user.id).await?;
    Ok(Json(profile))
}

async fn update_me_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let profile =
        auth_service::update_profile(&app_state.db_pool, &app_state.config, authenticated_user.id, payload).await?;
    Ok(Json(profile))
}

// --- Router ---

pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/user/", post(create_user_handler))
        .route("/api/user/token/", post(create_token_handler))
}

/// Profile of the authenticated user. Only GET and PATCH are routed.
pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/user/me/", get(get_me_handler).patch(update_me_handler))
}
