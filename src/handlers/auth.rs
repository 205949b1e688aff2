use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::auth::middleware::AuthenticatedUser;
use crate::auth::{SESSION_COOKIE, password, session};
use crate::config::AppConfig;
use crate::db::users as user_db;
use crate::error::{AppError, AppResult};
use crate::models::users::{LoginRequest, RegisterUser, Roles, UserResponse};

const MAX_USERNAME_CHARS: usize = 50;

fn session_cookie(token: String, ttl_secs: i64) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(ttl_secs))
        .finish()
}

/// POST /api/auth/register: create an account with a role.
pub async fn register(
    db: web::Data<DatabaseConnection>,
    body: web::Json<RegisterUser>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    let username = input.username.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_CHARS {
        return Err(AppError::Validation(format!(
            "Username must be between 1 and {MAX_USERNAME_CHARS} characters"
        )));
    }
    if input.role == Roles::Admin {
        return Err(AppError::Forbidden(
            "Admin accounts cannot be self-registered".into(),
        ));
    }
    password::validate_password_strength(&input.password).map_err(AppError::Validation)?;

    let hash = password::hash_password(&input.password)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))?;
    let user = user_db::create_user(db.get_ref(), username, hash, input.role).await?;

    info!(user_id = %user.id, username = %user.username, role = %user.role, "Registered user");
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// POST /api/auth/login: verify credentials and start a session.
pub async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();

    let user = user_db::find_by_username(db.get_ref(), input.username.trim()).await?;
    let verified = match &user {
        Some(user) => password::verify_password(&input.password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Stored hash unreadable: {e}")))?,
        None => false,
    };
    let Some(user) = user.filter(|_| verified) else {
        warn!(username = %input.username, "Failed login attempt");
        return Err(AppError::Unauthorized);
    };

    let token = session::issue_token(&user, &config.session)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(user_id = %user.id, "User logged in");
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token.clone(), config.session.ttl_secs))
        .json(serde_json::json!({
            "token": token,
            "user": UserResponse::from(user),
        })))
}

/// POST /api/auth/logout: clear the session cookie.
pub async fn logout() -> HttpResponse {
    let mut cookie = session_cookie(String::new(), 0);
    cookie.make_removal();
    HttpResponse::Ok()
        .cookie(cookie)
        .json(serde_json::json!({ "message": "Logged out" }))
}

/// GET /api/auth/me: the identity behind the current session.
pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(user.0)
}
