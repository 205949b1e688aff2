pub mod auth;
pub mod bids;
pub mod deliveries;
pub mod projects;
pub mod upload;

use actix_web::web;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::{Actor, Rejection};

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // Malformed bodies and query strings get the same JSON error shape as
    // everything else.
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    );
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    );

    // ── Auth routes ──
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(auth::register))
            .route("/login", web::post().to(auth::login))
            .route("/logout", web::post().to(auth::logout))
            .route("/me", web::get().to(auth::me)),
    );

    // ── Project routes (all protected, require a session) ──
    cfg.service(
        web::scope("/projects")
            .route("", web::get().to(projects::list_open))
            .route("", web::post().to(projects::create_project))
            .route("/mine", web::get().to(projects::list_mine))
            .route("/assigned", web::get().to(projects::list_assigned))
            .route("/history", web::get().to(projects::list_history))
            .route("/{id}", web::get().to(projects::get_project))
            .route("/{id}", web::put().to(projects::edit_project))
            .route("/{id}", web::delete().to(projects::delete_project))
            .route("/{id}/restore", web::post().to(projects::restore_project))
            .route("/{id}/reject", web::post().to(projects::reject_delivery))
            .route("/{id}/complete", web::post().to(projects::complete_project))
            .route("/{id}/bids", web::get().to(bids::list_bids))
            .route("/{id}/bids", web::post().to(bids::submit_bid))
            .route(
                "/{id}/bids/{bid_id}/accept",
                web::post().to(bids::accept_bid),
            )
            .route("/{id}/delivery", web::post().to(deliveries::deliver))
            .route("/{id}/delivery", web::get().to(deliveries::download)),
    );

    // ── Uploads ──
    cfg.service(
        web::resource("/upload/chunked").route(web::post().to(upload::chunked_upload)),
    );
}

/// Log a refused transition and turn it into the HTTP error.
pub(crate) fn rejected(actor: &Actor, project_id: Uuid, rejection: Rejection) -> AppError {
    warn!(
        %project_id,
        actor = %actor.username,
        role = %actor.role,
        "Rejected: {rejection}"
    );
    rejection.into()
}
