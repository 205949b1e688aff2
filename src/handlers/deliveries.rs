use actix_files::NamedFile;
use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::db::projects as project_db;
use crate::error::{AppError, AppResult};
use crate::handlers::projects::apply_transition;
use crate::handlers::rejected;
use crate::lifecycle::{self, Transition};
use crate::upload::{UploadGuard, sanitize_filename};

#[derive(Debug, Deserialize)]
pub struct DeliveryQuery {
    pub filename: String,
}

/// POST /api/projects/{id}/delivery?filename=…: stream the work product.
///
/// The body is the raw file. Identity and state are checked before a single
/// byte is written, and the project only moves to `delivered` once the file
/// is fully on disk.
pub async fn deliver(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    guard: web::Data<UploadGuard>,
    path: web::Path<Uuid>,
    query: web::Query<DeliveryQuery>,
    payload: web::Payload,
) -> AppResult<HttpResponse> {
    let actor = &user.0;
    let id = path.into_inner();

    let project = project_db::load(db.get_ref(), id).await?;
    lifecycle::authorize_delivery(&project, actor).map_err(|r| rejected(actor, id, r))?;

    let filename = sanitize_filename(&query.filename)?;
    let dest = guard.delivery_path(id, &filename);
    let file_path = dest.to_string_lossy().into_owned();

    let size = guard.stream_to(&dest, payload).await.inspect_err(|e| {
        warn!(project_id = %id, actor = %actor.username, "Delivery upload failed: {e}");
    })?;
    debug!(project_id = %id, bytes = size, "Delivery stored");

    let result = apply_transition(
        db.get_ref(),
        actor,
        id,
        Transition::Deliver {
            file_path: file_path.clone(),
        },
    )
    .await;

    match result {
        Ok(project) => {
            info!(project_id = %id, file = %file_path, bytes = size, "Delivery recorded");
            Ok(HttpResponse::Ok().json(project))
        }
        Err(e) => {
            // Keep a previous delivery that lives at the same path.
            if project.delivery_file_path.as_deref() != Some(file_path.as_str()) {
                if let Err(rm) = tokio::fs::remove_file(&dest).await {
                    warn!(path = %file_path, "Failed to remove orphaned delivery: {rm}");
                }
            }
            Err(e)
        }
    }
}

/// GET /api/projects/{id}/delivery: download the latest delivery.
pub async fn download(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<NamedFile> {
    let actor = &user.0;
    let id = path.into_inner();
    let project = project_db::load(db.get_ref(), id).await?;
    lifecycle::authorize_download(&project, actor).map_err(|r| rejected(actor, id, r))?;

    let file_path = project
        .delivery_file_path
        .ok_or_else(|| AppError::NotFound("Delivery not found".into()))?;
    NamedFile::open_async(&file_path).await.map_err(|e| {
        warn!(project_id = %id, path = %file_path, "Delivery file unreadable: {e}");
        AppError::NotFound("Delivery file is no longer available".into())
    })
}
