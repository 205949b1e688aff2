use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::error;

use crate::lifecycle::Rejection;
use crate::upload::UploadError;

/// Every failure a handler can report. Translated to a status code and a JSON
/// body only here, at the HTTP boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("Upload exceeds the {limit}-byte limit")]
    PayloadTooLarge { limit: u64 },
    #[error("Database error: {0}")]
    Store(DbErr),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<DbErr> for AppError {
    fn from(e: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = e.sql_err() {
            return AppError::Conflict(format!("Resource already exists: {detail}"));
        }
        match e {
            DbErr::RecordNotFound(what) => AppError::NotFound(what),
            other => AppError::Store(other),
        }
    }
}

impl From<Rejection> for AppError {
    fn from(r: Rejection) -> Self {
        let message = r.to_string();
        match r {
            Rejection::WrongRole { .. }
            | Rejection::NotOwner(_)
            | Rejection::NotAssignee
            | Rejection::NotParty(_) => AppError::Forbidden(message),
            Rejection::WrongState { .. } | Rejection::BidNotPending(_) => {
                AppError::InvalidState(message)
            }
            Rejection::DuplicateBid => AppError::Conflict(message),
            Rejection::ResourceNotFound(_) => AppError::NotFound(message),
            Rejection::Invalid(_) => AppError::Validation(message),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::TooLarge { limit } => AppError::PayloadTooLarge { limit },
            UploadError::MissingFilename
            | UploadError::DisallowedExtension(_)
            | UploadError::Stream(_) => AppError::Validation(e.to_string()),
            UploadError::Io(io) => AppError::Internal(format!("Failed to store upload: {io}")),
        }
    }
}

impl AppError {
    /// Where the client should go next after this error.
    fn recovery(&self) -> (&'static str, &'static str) {
        match self {
            AppError::Unauthorized => ("Log in", "/api/auth/login"),
            AppError::NotFound(_) => ("Browse open projects", "/api/projects"),
            AppError::Forbidden(_) | AppError::InvalidState(_) | AppError::Conflict(_) => {
                ("Back to my projects", "/api/projects/history")
            }
            AppError::Validation(_) | AppError::PayloadTooLarge { .. } => {
                ("Fix the input and resubmit", "/api/projects")
            }
            AppError::Store(_) | AppError::Internal(_) => ("Try again later", "/api/projects"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidState(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Store(e) => {
                error!("Database error: {e}");
                "A storage error occurred; nothing was changed".to_string()
            }
            AppError::Internal(msg) => {
                error!("Internal error: {msg}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let (label, href) = self.recovery();

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": message,
            "recovery": { "label": label, "href": href },
        }))
    }
}
