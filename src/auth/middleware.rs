use actix_web::FromRequest;
use actix_web::http::header::Header;
use actix_web::{HttpRequest, dev::Payload, web};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use sea_orm::DatabaseConnection;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, error};

use crate::auth::SESSION_COOKIE;
use crate::auth::session;
use crate::cache::AppCache;
use crate::config::AppConfig;
use crate::db::users as user_db;
use crate::error::AppError;
use crate::lifecycle::Actor;

/// The caller, resolved from their session token. Handlers that take this
/// argument reject anonymous requests with 401.
pub struct AuthenticatedUser(pub Actor);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            // 1. Cookie first, then the Authorization header.
            let token = session_token(&req).ok_or(AppError::Unauthorized)?;

            let config = req.app_data::<web::Data<AppConfig>>().ok_or_else(|| {
                error!("AppConfig missing from app data");
                AppError::Internal("Session config not configured".into())
            })?;

            // 2. Signature and expiry.
            let claims = session::validate_token(&token, &config.session.secret).map_err(|e| {
                debug!("Rejected session token: {e}");
                AppError::Unauthorized
            })?;

            // 3. The account must still exist; its stored role wins over the claim.
            let cache = req.app_data::<web::Data<AppCache>>();
            let cached = match cache {
                Some(cache) => cache.user(claims.sub).await,
                None => None,
            };
            let user = match cached {
                Some(user) => user,
                None => {
                    let db = req
                        .app_data::<web::Data<DatabaseConnection>>()
                        .ok_or_else(|| AppError::Internal("Database not configured".into()))?;
                    let user = user_db::get_user_by_id(db.get_ref(), claims.sub)
                        .await?
                        .ok_or(AppError::Unauthorized)?;
                    if let Some(cache) = cache {
                        cache.set_user(user.clone()).await;
                    }
                    user
                }
            };

            Ok(AuthenticatedUser(Actor {
                user_id: user.id,
                username: user.username,
                role: user.role,
            }))
        })
    }
}

fn session_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    Authorization::<Bearer>::parse(req)
        .ok()
        .map(|auth| auth.into_scheme().token().to_string())
}
