use actix_web::{HttpResponse, web};
use serde::Deserialize;
use tracing::info;

use crate::auth::middleware::AuthenticatedUser;
use crate::error::AppResult;
use crate::upload::{UploadGuard, sanitize_filename};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

/// POST /api/upload/chunked?filename=…: store an attachment under the same
/// size ceiling and filename rules as deliveries.
pub async fn chunked_upload(
    user: AuthenticatedUser,
    guard: web::Data<UploadGuard>,
    query: web::Query<UploadQuery>,
    payload: web::Payload,
) -> AppResult<HttpResponse> {
    let sanitized = sanitize_filename(&query.filename)?;
    let dest = guard.general_path(&sanitized);
    let stored_name = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let size_bytes = guard.stream_to(&dest, payload).await?;

    info!(actor = %user.0.username, file = %stored_name, bytes = size_bytes, "Upload stored");
    Ok(HttpResponse::Created().json(serde_json::json!({
        "filename": stored_name,
        "size_bytes": size_bytes,
    })))
}
