use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use bidwork_backend::cache::AppCache;
use bidwork_backend::config::AppConfig;
use bidwork_backend::create_pool;
use bidwork_backend::handlers;
use bidwork_backend::upload::UploadGuard;
use dotenv::dotenv;
use migration::{Migrator, MigratorTrait};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    let db = create_pool(&config.database_url)
        .await
        .expect("Failed to connect to the database");
    if config.run_migrations {
        Migrator::up(&db, None)
            .await
            .expect("Failed to apply database migrations");
        tracing::info!("Database migrations applied");
    }
    let db_data = web::Data::new(db);

    let cache_data = web::Data::new(AppCache::new(&config.cache));

    std::fs::create_dir_all(&config.upload.dir)?;
    let upload_data = web::Data::new(UploadGuard::new(
        config.upload.dir.clone(),
        config.upload.max_bytes,
        config.upload.chunk_bytes,
    ));
    tracing::info!(
        dir = %config.upload.dir.display(),
        max_bytes = config.upload.max_bytes,
        "Upload guard ready"
    );

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let config_data = web::Data::new(config);
    tracing::info!("Server running at http://{bind_addr}");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(db_data.clone())
            .app_data(cache_data.clone())
            .app_data(upload_data.clone())
            .app_data(config_data.clone())
            .service(web::scope("/api").configure(handlers::init_routes))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
