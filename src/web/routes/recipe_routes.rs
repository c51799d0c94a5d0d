use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Extension, Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;
use tracing::info;

use crate::db::services;
use crate::services::image_service;
use crate::web::error::FieldErrors;
use crate::web::extract::{AppJson, AppPath};
use crate::web::models::{
    AuthenticatedUser, RecipeDetailResponse, RecipeImageResponse, RecipeListQuery, RecipePayload,
    RecipeResponse,
};
use crate::web::{AppError, AppState};

const IMAGE_FIELD: &str = "image";

fn recipe_not_found() -> AppError {
    AppError::NotFound("Recipe not found.".to_string())
}

// --- Route Handlers ---

async fn list_recipes_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<RecipeListQuery>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    let filter = query.into_filter()?;
    let recipes = services::list_recipes(&app_state.db_pool, authenticated_user.id, &filter).await?;
    Ok(Json(recipes.into_iter().map(RecipeResponse::from).collect()))
}

async fn create_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RecipePayload>,
) -> Result<(StatusCode, Json<RecipeDetailResponse>), AppError> {
    let new_recipe = payload.into_new_recipe()?;
    let created = services::create_recipe(&app_state.db_pool, authenticated_user.id, new_recipe).await?;
    Ok((StatusCode::CREATED, Json(RecipeDetailResponse::from(created))))
}

async fn get_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let recipe = services::get_recipe(&app_state.db_pool, authenticated_user.id, recipe_id)
        .await?
        .ok_or_else(recipe_not_found)?;
    Ok(Json(RecipeDetailResponse::from(recipe)))
}

async fn update_recipe(
    app_state: &AppState,
    user_id: i32,
    recipe_id: i32,
    payload: RecipePayload,
    partial: bool,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let changes = payload.into_changes(partial)?;
    let updated = services::update_recipe(&app_state.db_pool, user_id, recipe_id, changes)
        .await?
        .ok_or_else(recipe_not_found)?;
    Ok(Json(RecipeDetailResponse::from(updated)))
}

async fn put_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
    AppJson(payload): AppJson<RecipePayload>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    update_recipe(&app_state, authenticated_user.id, recipe_id, payload, false).await
}

async fn patch_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
    AppJson(payload): AppJson<RecipePayload>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    update_recipe(&app_state, authenticated_user.id, recipe_id, payload, true).await
}

async fn delete_recipe_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    let rows_affected = services::delete_recipe(&app_state.db_pool, authenticated_user.id, recipe_id).await?;
    if rows_affected > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(recipe_not_found())
    }
}

async fn upload_image_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(recipe_id): AppPath<i32>,
    mut multipart: Multipart,
) -> Result<Json<RecipeImageResponse>, AppError> {
    let user_id = authenticated_user.id;
    // Ownership first so nothing is written for someone else's recipe
    let existing = services::find_owned_recipe(&app_state.db_pool, user_id, recipe_id)
        .await?
        .ok_or_else(recipe_not_found)?;

    let mut image_bytes = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            image_bytes = Some(field.bytes().await?);
            break;
        }
    }
    let image_bytes = image_bytes
        .ok_or_else(|| AppError::Validation(FieldErrors::single(IMAGE_FIELD, "No file was submitted.")))?;

    let media_dir = &app_state.config.media_dir;
    let image_path = image_service::store_recipe_image(media_dir, &image_bytes).await?;
    let updated = services::set_recipe_image(&app_state.db_pool, user_id, recipe_id, image_path)
        .await?
        .ok_or_else(recipe_not_found)?;

    if let Some(previous) = existing.image.as_deref() {
        image_service::remove_media_file(media_dir, previous).await;
    }
    info!(user_id, recipe_id, "Recipe image uploaded.");
    Ok(Json(RecipeImageResponse::from(updated)))
}

// --- Router ---

pub fn create_recipe_router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/recipes/", get(list_recipes_handler).post(create_recipe_handler))
        .route(
            "/api/recipes/{recipe_id}/",
            get(get_recipe_handler)
                .put(put_recipe_handler)
                .patch(patch_recipe_handler)
                .delete(delete_recipe_handler),
        )
        .route(
            "/api/recipes/{recipe_id}/upload-image/",
            post(upload_image_handler).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}
