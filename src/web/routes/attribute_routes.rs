//! Tag and ingredient endpoints. Both kinds are created through recipes only,
//! so their collections have no POST.

use axum::{
    Json, Router,
    extract::{Extension, Query, State},
    http::StatusCode,
    routing::get,
};
use std::sync::Arc;

use crate::db::entities::{ingredient, tag};
use crate::db::services::{self, RecipeAttribute, is_unique_violation};
use crate::web::error::FieldErrors;
use crate::web::extract::{AppJson, AppPath};
use crate::web::models::{AssignedOnlyQuery, AuthenticatedUser, NamedItem, RenamePayload};
use crate::web::{AppError, AppState};

fn not_found<E: RecipeAttribute>() -> AppError {
    AppError::NotFound(format!("{} not found.", capitalized(E::LABEL)))
}

fn capitalized(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn name_taken<E: RecipeAttribute>() -> AppError {
    let article = if E::LABEL.starts_with(['a', 'e', 'i', 'o', 'u']) { "An" } else { "A" };
    AppError::Validation(FieldErrors::single(
        "name",
        format!("{article} {} with this name already exists.", E::LABEL),
    ))
}

fn to_item<E: RecipeAttribute>(model: &E::Model) -> NamedItem {
    NamedItem {
        id: E::id_of(model),
        name: E::name_of(model).to_owned(),
    }
}

// --- Route Handlers ---

async fn list_handler<E: RecipeAttribute>(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<AssignedOnlyQuery>,
) -> Result<Json<Vec<NamedItem>>, AppError> {
    let models =
        services::list_attributes::<E>(&app_state.db_pool, authenticated_user.id, query.assigned_only()).await?;
    Ok(Json(models.iter().map(to_item::<E>).collect()))
}

async fn get_handler<E: RecipeAttribute>(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> Result<Json<NamedItem>, AppError> {
    let model = services::get_attribute::<E, _>(&app_state.db_pool, authenticated_user.id, id)
        .await?
        .ok_or_else(not_found::<E>)?;
    Ok(Json(to_item::<E>(&model)))
}

async fn update<E: RecipeAttribute>(
    app_state: &AppState,
    user_id: i32,
    id: i32,
    payload: RenamePayload,
    partial: bool,
) -> Result<Json<NamedItem>, AppError> {
    let model = match payload.into_name(partial)? {
        Some(name) => services::rename_attribute::<E>(&app_state.db_pool, user_id, id, &name)
            .await
            .map_err(|db_err| {
                if is_unique_violation(&db_err) {
                    name_taken::<E>()
                } else {
                    db_err.into()
                }
            })?,
        None => services::get_attribute::<E, _>(&app_state.db_pool, user_id, id).await?,
    };
    model.map(|m| Json(to_item::<E>(&m))).ok_or_else(not_found::<E>)
}

async fn put_handler<E: RecipeAttribute>(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<RenamePayload>,
) -> Result<Json<NamedItem>, AppError> {
    update::<E>(&app_state, authenticated_user.id, id, payload, false).await
}

async fn patch_handler<E: RecipeAttribute>(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<RenamePayload>,
) -> Result<Json<NamedItem>, AppError> {
    update::<E>(&app_state, authenticated_user.id, id, payload, true).await
}

async fn delete_handler<E: RecipeAttribute>(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    let rows_affected = services::delete_attribute::<E>(&app_state.db_pool, authenticated_user.id, id).await?;
    if rows_affected > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found::<E>())
    }
}

// --- Router ---

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tags/", get(list_handler::<tag::Entity>))
        .route(
            "/api/tags/{tag_id}/",
            get(get_handler::<tag::Entity>)
                .put(put_handler::<tag::Entity>)
                .patch(patch_handler::<tag::Entity>)
                .delete(delete_handler::<tag::Entity>),
        )
}

pub fn create_ingredients_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ingredients/", get(list_handler::<ingredient::Entity>))
        .route(
            "/api/ingredients/{ingredient_id}/",
            get(get_handler::<ingredient::Entity>)
                .put(put_handler::<ingredient::Entity>)
                .patch(patch_handler::<ingredient::Entity>)
                .delete(delete_handler::<ingredient::Entity>),
        )
}
