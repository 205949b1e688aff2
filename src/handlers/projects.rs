use actix_web::{HttpResponse, web};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use tracing::info;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::cache::AppCache;
use crate::db::projects as project_db;
use crate::db::users as user_db;
use crate::error::{AppError, AppResult};
use crate::handlers::rejected;
use crate::lifecycle::{self, Actor, Transition};
use crate::models::projects::{CreateProject, EditProject, ProjectResponse, ProjectSummary};
use crate::models::users::Roles;

/// Decide `transition` on project `id` and persist the result with a
/// compare-and-set save. Shared by every single-row transition.
pub(crate) async fn apply_transition(
    db: &DatabaseConnection,
    actor: &Actor,
    id: Uuid,
    transition: Transition<'_>,
) -> AppResult<ProjectResponse> {
    let project = project_db::load(db, id).await?;
    let decision =
        lifecycle::decide(&project, actor, transition).map_err(|r| rejected(actor, id, r))?;

    let saved = project_db::save(db, &decision.before, decision.after).await?;
    info!(
        project_id = %id,
        actor = %actor.username,
        action = %decision.action,
        status = %saved.status,
        "Project transition applied"
    );

    detail(db, saved).await
}

async fn username(db: &DatabaseConnection, id: Option<Uuid>) -> AppResult<Option<String>> {
    match id {
        Some(id) => Ok(user_db::get_user_by_id(db, id).await?.map(|u| u.username)),
        None => Ok(None),
    }
}

async fn detail(
    db: &DatabaseConnection,
    project: crate::models::projects::Model,
) -> AppResult<ProjectResponse> {
    let owner = username(db, Some(project.owner_id)).await?;
    let assignee = username(db, project.accepted_freelancer_id).await?;
    Ok(ProjectResponse::new(project, owner, assignee))
}

/// GET /api/projects: open projects, newest first.
pub async fn list_open(
    _user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
) -> AppResult<HttpResponse> {
    if let Some(cached) = cache.open_projects().await {
        return Ok(HttpResponse::Ok().json(cached.as_ref()));
    }

    let projects = project_db::list_open(db.get_ref()).await?;
    let projects = cache.set_open_projects(projects).await;
    Ok(HttpResponse::Ok().json(projects.as_ref()))
}

/// POST /api/projects: post a new project (clients only).
pub async fn create_project(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    body: web::Json<CreateProject>,
) -> AppResult<HttpResponse> {
    let actor = &user.0;
    let project = lifecycle::new_project(actor, body.into_inner(), Utc::now().date_naive())
        .map_err(|r| rejected(actor, Uuid::nil(), r))?;

    let project = project_db::insert_project(db.get_ref(), project).await?;
    cache.invalidate_open_projects().await;
    info!(project_id = %project.id, actor = %actor.username, "Project created");

    let owner = Some(actor.username.clone());
    Ok(HttpResponse::Created().json(ProjectResponse::new(project, owner, None)))
}

/// GET /api/projects/mine: the caller's active (non-deleted) projects.
pub async fn list_mine(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    let projects = project_db::list_by_owner(db.get_ref(), user.0.user_id).await?;
    Ok(HttpResponse::Ok().json(projects))
}

/// GET /api/projects/assigned: projects the calling freelancer was hired for.
pub async fn list_assigned(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    if user.0.role != Roles::Freelancer {
        return Err(AppError::Forbidden(
            "Only freelancers have assigned projects".into(),
        ));
    }
    let projects = project_db::list_by_assignee(db.get_ref(), user.0.user_id).await?;
    Ok(HttpResponse::Ok().json(projects))
}

/// GET /api/projects/history: everything the caller has been part of,
/// deleted projects included.
pub async fn list_history(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    let projects: Vec<ProjectSummary> =
        project_db::list_history(db.get_ref(), user.0.user_id, user.0.role).await?;
    Ok(HttpResponse::Ok().json(projects))
}

/// GET /api/projects/{id}
pub async fn get_project(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let project = project_db::load(db.get_ref(), id).await?;
    lifecycle::authorize_view(&project, &user.0).map_err(|r| rejected(&user.0, id, r))?;

    Ok(HttpResponse::Ok().json(detail(db.get_ref(), project).await?))
}

/// PUT /api/projects/{id}: edit title, description, budget or deadline.
pub async fn edit_project(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    path: web::Path<Uuid>,
    body: web::Json<EditProject>,
) -> AppResult<HttpResponse> {
    let edit = body.into_inner();
    let project =
        apply_transition(db.get_ref(), &user.0, path.into_inner(), Transition::Edit(&edit))
            .await?;
    cache.invalidate_open_projects().await;
    Ok(HttpResponse::Ok().json(project))
}

/// DELETE /api/projects/{id}: soft delete; the row is kept for restore.
pub async fn delete_project(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let project =
        apply_transition(db.get_ref(), &user.0, path.into_inner(), Transition::SoftDelete).await?;
    cache.invalidate_open_projects().await;
    Ok(HttpResponse::Ok().json(project))
}

/// POST /api/projects/{id}/restore: reopen a deleted project, dated today.
pub async fn restore_project(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let today = Utc::now().date_naive();
    let project = apply_transition(
        db.get_ref(),
        &user.0,
        path.into_inner(),
        Transition::Restore { today },
    )
    .await?;
    cache.invalidate_open_projects().await;
    Ok(HttpResponse::Ok().json(project))
}

/// POST /api/projects/{id}/reject: send the delivery back for rework.
pub async fn reject_delivery(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let project = apply_transition(
        db.get_ref(),
        &user.0,
        path.into_inner(),
        Transition::RejectDelivery,
    )
    .await?;
    Ok(HttpResponse::Ok().json(project))
}

/// POST /api/projects/{id}/complete: accept the delivery and close out.
pub async fn complete_project(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let project =
        apply_transition(db.get_ref(), &user.0, path.into_inner(), Transition::Complete).await?;
    Ok(HttpResponse::Ok().json(project))
}
