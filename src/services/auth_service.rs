use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::db::entities::user;
use crate::db::services::{self, is_unique_violation};
use crate::server::config::ServerConfig;
use crate::web::error::{AppError, FieldErrors, NON_FIELD_ERRORS};
use crate::web::models::{
    Claims, CreateUserRequest, TokenRequest, TokenResponse, UpdateProfileRequest, UserResponse,
};

const EMAIL_TAKEN: &str = "user with this email already exists.";
const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";

fn email_taken() -> AppError {
    AppError::Validation(FieldErrors::single("email", EMAIL_TAKEN))
}

fn bad_credentials() -> AppError {
    AppError::Validation(FieldErrors::single(NON_FIELD_ERRORS, BAD_CREDENTIALS))
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::PasswordHashingError(e.to_string()))
}

/// Registers a regular (non-staff) account.
pub async fn register_user(
    db: &DatabaseConnection,
    config: &ServerConfig,
    req: CreateUserRequest,
) -> Result<UserResponse, AppError> {
    let user_model = create_account(db, config, req, false).await?;
    info!(user_id = user_model.id, "User registered.");
    Ok(UserResponse::from(user_model))
}

/// Creates a staff account. Used by the `create-superuser` command.
pub async fn create_superuser(
    db: &DatabaseConnection,
    config: &ServerConfig,
    email: String,
    password: String,
    name: String,
) -> Result<user::Model, AppError> {
    let req = CreateUserRequest {
        email: Some(email.into()),
        password: Some(password.into()),
        name: Some(name.into()),
    };
    let user_model = create_account(db, config, req, true).await?;
    info!(user_id = user_model.id, "Superuser created.");
    Ok(user_model)
}

async fn create_account(
    db: &DatabaseConnection,
    config: &ServerConfig,
    req: CreateUserRequest,
    is_staff: bool,
) -> Result<user::Model, AppError> {
    let account = req.validate()?;

    if services::get_user_by_email(db, &account.email).await?.is_some() {
        return Err(email_taken());
    }

    let password_hash = hash_password(&account.password, config.bcrypt_cost)?;
    services::create_user(db, &account.email, &account.name, &password_hash, is_staff)
        .await
        .map_err(|e| if is_unique_violation(&e) { email_taken() } else { e.into() })
}

/// Exchanges an email/password pair for a signed token.
///
/// Unknown emails, wrong passwords and inactive accounts all produce the same
/// error so the response does not reveal which one it was.
pub async fn issue_token(
    db: &DatabaseConnection,
    config: &ServerConfig,
    req: TokenRequest,
) -> Result<TokenResponse, AppError> {
    let (email, password) = req.validate()?;

    let Some(user_model) = services::get_user_by_email(db, &email).await? else {
        return Err(bad_credentials());
    };
    if !user_model.is_active {
        warn!(user_id = user_model.id, "Token requested for inactive user.");
        return Err(bad_credentials());
    }

    let valid_password = verify(&password, &user_model.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;
    if !valid_password {
        return Err(bad_credentials());
    }

    let token = create_token_for_user(&user_model, &config.jwt_secret, config.token_ttl_hours)?;
    info!(user_id = user_model.id, "Token issued.");
    Ok(TokenResponse { token })
}

pub fn create_token_for_user(user: &user::Model, jwt_secret: &str, ttl_hours: i64) -> Result<String, AppError> {
    let expiration = (Utc::now() + Duration::hours(ttl_hours)).timestamp() as usize;

    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        exp: expiration,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(jwt_secret.as_ref()))
        .map_err(|e| AppError::TokenCreationError(e.to_string()))
}

/// Verifies the signature and expiry of a token and returns its claims.
pub fn decode_token(token: &str, jwt_secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        warn!(error = ?e, "Token rejected.");
        AppError::Unauthorized("Invalid token.".to_string())
    })
}

pub async fn get_profile(db: &DatabaseConnection, user_id: i32) -> Result<UserResponse, AppError> {
    services::get_user_by_id(db, user_id)
        .await?
        .map(UserResponse::from)
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}

/// Applies a partial profile update. A new password is rehashed.
pub async fn update_profile(
    db: &DatabaseConnection,
    config: &ServerConfig,
    user_id: i32,
    req: UpdateProfileRequest,
) -> Result<UserResponse, AppError> {
    let changes = req.validate()?;

    if let Some(email) = changes.email.as_deref() {
        if let Some(other) = services::get_user_by_email(db, email).await? {
            if other.id != user_id {
                return Err(email_taken());
            }
        }
    }

    let password_hash = changes
        .password
        .as_deref()
        .map(|p| hash_password(p, config.bcrypt_cost))
        .transpose()?;
    let password_changed = password_hash.is_some();

    let updated = services::update_user(db, user_id, changes.into_user_changes(password_hash))
        .await
        .map_err(|e| if is_unique_violation(&e) { email_taken() } else { e.into() })?;

    if password_changed {
        info!(user_id, "Password changed.");
    }
    Ok(UserResponse::from(updated))
}
