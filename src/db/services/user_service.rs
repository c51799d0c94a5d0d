use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set,
};

use crate::db::entities::user;

// --- User Service Functions ---

/// Fields of a user that may change after creation. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none() && self.password_hash.is_none()
    }
}

/// Creates a new user. The caller is responsible for hashing the password.
pub async fn create_user(
    db: &DatabaseConnection,
    email: &str,
    name: &str,
    password_hash: &str,
    is_staff: bool,
) -> Result<user::Model, DbErr> {
    let new_user = user::ActiveModel {
        email: Set(email.to_owned()),
        name: Set(name.to_owned()),
        password_hash: Set(password_hash.to_owned()),
        is_active: Set(true),
        is_staff: Set(is_staff),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    new_user.insert(db).await
}

/// Retrieves a user by their ID.
pub async fn get_user_by_id(db: &DatabaseConnection, user_id: i32) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find_by_id(user_id).one(db).await
}

/// Retrieves a user by their (already normalized) email.
pub async fn get_user_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
}

/// Applies the present fields of `changes` to the user.
pub async fn update_user(
    db: &DatabaseConnection,
    user_id: i32,
    changes: UserChanges,
) -> Result<user::Model, DbErr> {
    let existing = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("user {user_id}")))?;
    if changes.is_empty() {
        return Ok(existing);
    }

    let mut active_model = existing.into_active_model();
    if let Some(email) = changes.email {
        active_model.email = Set(email);
    }
    if let Some(name) = changes.name {
        active_model.name = Set(name);
    }
    if let Some(password_hash) = changes.password_hash {
        active_model.password_hash = Set(password_hash);
    }
    active_model.update(db).await
}
