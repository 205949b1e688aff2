#![allow(dead_code)]

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use bidwork_backend::db::users as user_db;
use bidwork_backend::lifecycle::Actor;
use bidwork_backend::models::users::{self, Roles};

/// Fresh in-memory SQLite database with every migration applied. A single
/// pooled connection keeps the in-memory database alive and shared.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory SQLite");
    Migrator::up(&db, None)
        .await
        .expect("Failed to apply migrations");
    db
}

pub async fn create_user(db: &DatabaseConnection, username: &str, role: Roles) -> users::Model {
    user_db::create_user(db, username, "not-a-real-hash".to_string(), role)
        .await
        .expect("Failed to create user")
}

pub fn actor(user: &users::Model) -> Actor {
    Actor {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role,
    }
}
