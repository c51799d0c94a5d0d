use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::entities::user;
use crate::db::services::UserChanges;
use crate::web::error::{AppError, FieldErrors};
use crate::web::models::{BLANK, MAX_CHAR_FIELD_LEN, REQUIRED, present, required_text, string_value};

pub const PASSWORD_MIN_LENGTH: usize = 5;

const INVALID_EMAIL: &str = "Enter a valid email address.";

// --- Requests ---

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub password: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
}

/// A validated registration. The password is still in plain text here.
#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl CreateUserRequest {
    pub fn validate(self) -> Result<NewAccount, AppError> {
        let mut errors = FieldErrors::new();
        let email = clean_email(&mut errors, self.email, false);
        let password = clean_password(&mut errors, self.password, false);
        let name = required_text(&mut errors, "name", self.name, Some(MAX_CHAR_FIELD_LEN), false);
        errors.into_result()?;

        match (email, password, name) {
            (Some(email), Some(password), Some(name)) => Ok(NewAccount { email, password, name }),
            _ => Err(AppError::Validation(FieldErrors::single(
                crate::web::error::NON_FIELD_ERRORS,
                "Missing required account fields.",
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub password: Option<Value>,
}

impl TokenRequest {
    /// Returns the normalized email and the password as typed.
    /// Only presence is checked; credentials are verified by the auth service.
    pub fn validate(self) -> Result<(String, String), AppError> {
        let mut errors = FieldErrors::new();
        let email = required_text(&mut errors, "email", self.email, None, false).map(|e| normalize_email(&e));
        let password = match self.password.map(|p| string_value(&mut errors, "password", p)) {
            Some(Some(p)) if p.is_empty() => {
                errors.add("password", BLANK);
                None
            }
            Some(p) => p,
            None => {
                errors.add("password", REQUIRED);
                None
            }
        };
        errors.into_result()?;
        match (email, password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(AppError::Validation(FieldErrors::single(
                crate::web::error::NON_FIELD_ERRORS,
                "Missing credentials.",
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub password: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
}

/// A validated profile update. A new password is still in plain text here.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(self) -> Result<ProfileChanges, AppError> {
        let mut errors = FieldErrors::new();
        let email = clean_email(&mut errors, self.email, true);
        let password = clean_password(&mut errors, self.password, true);
        let name = required_text(&mut errors, "name", self.name, Some(MAX_CHAR_FIELD_LEN), true);
        errors.into_result()?;
        Ok(ProfileChanges { email, password, name })
    }
}

impl ProfileChanges {
    pub fn into_user_changes(self, password_hash: Option<String>) -> UserChanges {
        UserChanges {
            email: self.email,
            name: self.name,
            password_hash,
        }
    }
}

/// Lower-cases the domain part, leaving the local part as given.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !local.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn clean_email(errors: &mut FieldErrors, value: Option<Value>, partial: bool) -> Option<String> {
    let email = required_text(errors, "email", value, Some(MAX_CHAR_FIELD_LEN), partial)?;
    if !is_valid_email(&email) {
        errors.add("email", INVALID_EMAIL);
        return None;
    }
    Some(normalize_email(&email))
}

fn clean_password(errors: &mut FieldErrors, value: Option<Value>, partial: bool) -> Option<String> {
    match value.map(|p| string_value(errors, "password", p)) {
        Some(Some(p)) if p.trim().is_empty() => {
            errors.add("password", BLANK);
            None
        }
        Some(Some(p)) if p.chars().count() < PASSWORD_MIN_LENGTH => {
            errors.add(
                "password",
                format!("Ensure this field has at least {PASSWORD_MIN_LENGTH} characters."),
            );
            None
        }
        Some(p) => p,
        None => {
            if !partial {
                errors.add("password", REQUIRED);
            }
            None
        }
    }
}

// --- Responses ---

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        UserResponse {
            email: model.email,
            name: model.name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

// --- Auth ---

// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // the user's email
    pub user_id: i32,
    pub exp: usize,
}

/// Struct to hold authenticated user details, to be passed as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_lowercases_domain_only() {
        assert_eq!(normalize_email("Test@EXAMPLE.com"), "Test@example.com");
        assert_eq!(normalize_email("  user@Example.COM "), "user@example.com");
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(!is_valid_email("test.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("test@localhost"));
        assert!(!is_valid_email("te st@example.com"));
    }

    #[test]
    fn test_create_user_password_too_short() {
        let req = CreateUserRequest {
            email: Some("test@example.com".into()),
            password: Some("pw".into()),
            name: Some("Test Name".into()),
        };
        match req.validate() {
            Err(AppError::Validation(errors)) => assert!(errors.get("password").is_some()),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_token_request_blank_password() {
        let req = TokenRequest {
            email: Some("test@example.com".into()),
            password: Some("".into()),
        };
        match req.validate() {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("password"), Some(&[BLANK.to_string()][..]))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_null_password_is_a_field_error() {
        let req: UpdateProfileRequest = serde_json::from_value(serde_json::json!({ "password": null })).unwrap();
        match req.validate() {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("password"), Some(&[crate::web::models::NULL.to_string()][..]))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_profile_update_all_optional() {
        let changes = UpdateProfileRequest::default().validate().unwrap();
        assert!(changes.email.is_none());
        assert!(changes.password.is_none());
        assert!(changes.name.is_none());
    }
}
