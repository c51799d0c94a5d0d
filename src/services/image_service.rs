//! Validation and storage of uploaded recipe images.
//!
//! Files live under `<media_dir>/uploads/recipe/` with a random name, and the
//! recipe row stores the path relative to `media_dir`.

use std::path::Path;

use image::ImageFormat;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::web::error::{AppError, FieldErrors};

/// URL prefix under which `media_dir` is served.
pub const MEDIA_URL_PREFIX: &str = "/media/";
pub const RECIPE_UPLOAD_DIR: &str = "uploads/recipe";

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

pub fn media_url(relative_path: &str) -> String {
    format!("{MEDIA_URL_PREFIX}{relative_path}")
}

/// Decodes the payload to make sure it is a complete image, returning its format.
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat, AppError> {
    let invalid = || AppError::Validation(FieldErrors::single("image", INVALID_IMAGE));
    if bytes.is_empty() {
        return Err(AppError::Validation(FieldErrors::single(
            "image",
            "The submitted file is empty.",
        )));
    }
    let format = image::guess_format(bytes).map_err(|_| invalid())?;
    image::load_from_memory_with_format(bytes, format).map_err(|_| invalid())?;
    Ok(format)
}

/// Validates and writes a recipe image, returning its path relative to `media_dir`.
pub async fn store_recipe_image(media_dir: &str, bytes: &[u8]) -> Result<String, AppError> {
    let format = validate_image(bytes)?;
    let extension = format.extensions_str().first().copied().unwrap_or("img");
    let relative_path = format!("{RECIPE_UPLOAD_DIR}/{}.{extension}", Uuid::new_v4());

    let full_path = Path::new(media_dir).join(&relative_path);
    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to create {parent:?}: {e}")))?;
    }
    tokio::fs::write(&full_path, bytes)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to write {full_path:?}: {e}")))?;

    debug!(path = %relative_path, size = bytes.len(), "Stored recipe image.");
    Ok(relative_path)
}

/// Removes a previously stored file. Failures are logged, not returned.
pub async fn remove_media_file(media_dir: &str, relative_path: &str) {
    let full_path = Path::new(media_dir).join(relative_path);
    if let Err(e) = tokio::fs::remove_file(&full_path).await {
        warn!(path = ?full_path, error = %e, "Failed to remove media file.");
    }
}
