use sea_orm::*;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::users::{self, Roles};

/// Look a user up by their (unique) login name.
pub async fn find_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await
}

/// Fetch a single user by ID.
pub async fn get_user_by_id(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find_by_id(id).one(db).await
}

/// Insert a new user. A taken username surfaces as `Conflict`.
pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    password_hash: String,
    role: Roles,
) -> Result<users::Model, AppError> {
    let new_user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_owned()),
        password_hash: Set(password_hash),
        role: Set(role),
        created_at: Set(chrono::Utc::now()),
    };

    new_user.insert(db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict(format!("Username {username:?} is already taken"))
        }
        _ => AppError::from(e),
    })
}
