pub mod bids;
pub mod projects;
pub mod users;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Create a SeaORM database connection pool for `database_url`.
pub async fn create_pool(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);
    Database::connect(options).await
}
