use sea_orm::*;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::projects::{self, ProjectStatus, ProjectSummary};
use crate::models::users::{self, Roles};

fn active_model(p: projects::Model) -> projects::ActiveModel {
    projects::ActiveModel {
        id: Set(p.id),
        title: Set(p.title),
        content: Set(p.content),
        budget: Set(p.budget),
        owner_id: Set(p.owner_id),
        created_at: Set(p.created_at),
        deadline: Set(p.deadline),
        status: Set(p.status),
        accepted_freelancer_id: Set(p.accepted_freelancer_id),
        delivery_file_path: Set(p.delivery_file_path),
        is_deleted: Set(p.is_deleted),
        version: Set(p.version),
    }
}

fn summaries(rows: Vec<(projects::Model, Option<users::Model>)>) -> Vec<ProjectSummary> {
    rows.into_iter()
        .map(|(project, owner)| ProjectSummary::new(project, owner.map(|u| u.username)))
        .collect()
}

/// Insert a freshly created project.
pub async fn insert_project(
    db: &DatabaseConnection,
    project: projects::Model,
) -> Result<projects::Model, DbErr> {
    active_model(project).insert(db).await
}

/// Fetch a project by ID regardless of its deleted flag.
pub async fn get_project_by_id(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<projects::Model>, DbErr> {
    projects::Entity::find_by_id(id).one(db).await
}

/// Like [`get_project_by_id`] but absence is an error.
pub async fn load(db: &DatabaseConnection, id: Uuid) -> Result<projects::Model, AppError> {
    get_project_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))
}

/// Persist `after` only if the stored row is still at `before`'s version,
/// bumping the version on success. Any write that landed since `before` was
/// loaded (a transition or a plain edit) makes this fail with `Conflict`
/// instead of being overwritten.
pub async fn save<C: ConnectionTrait>(
    db: &C,
    before: &projects::Model,
    mut after: projects::Model,
) -> Result<projects::Model, AppError> {
    after.version = before.version + 1;
    let mut changes = active_model(after.clone());
    changes.id = NotSet;

    let result = projects::Entity::update_many()
        .set(changes)
        .filter(projects::Column::Id.eq(before.id))
        .filter(projects::Column::Version.eq(before.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict(format!(
            "Project {} was modified by someone else; reload and try again",
            before.id
        )));
    }

    Ok(after)
}

/// Open, non-deleted projects, newest first.
pub async fn list_open(db: &DatabaseConnection) -> Result<Vec<ProjectSummary>, DbErr> {
    let rows = projects::Entity::find()
        .filter(projects::Column::Status.eq(ProjectStatus::Open))
        .filter(projects::Column::IsDeleted.eq(false))
        .find_also_related(users::Entity)
        .order_by_desc(projects::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(summaries(rows))
}

/// A client's active (non-deleted) projects.
pub async fn list_by_owner(
    db: &DatabaseConnection,
    owner_id: Uuid,
) -> Result<Vec<ProjectSummary>, DbErr> {
    let rows = projects::Entity::find()
        .filter(projects::Column::OwnerId.eq(owner_id))
        .filter(projects::Column::IsDeleted.eq(false))
        .find_also_related(users::Entity)
        .order_by_desc(projects::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(summaries(rows))
}

/// Projects a freelancer has been hired for.
pub async fn list_by_assignee(
    db: &DatabaseConnection,
    freelancer_id: Uuid,
) -> Result<Vec<ProjectSummary>, DbErr> {
    let rows = projects::Entity::find()
        .filter(projects::Column::AcceptedFreelancerId.eq(freelancer_id))
        .filter(projects::Column::IsDeleted.eq(false))
        .find_also_related(users::Entity)
        .order_by_desc(projects::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(summaries(rows))
}

/// Everything a user has been involved in: a client sees all of their
/// projects including deleted ones (so they can restore them), a freelancer
/// sees every project they were hired for, an admin sees all projects.
pub async fn list_history(
    db: &DatabaseConnection,
    user_id: Uuid,
    role: Roles,
) -> Result<Vec<ProjectSummary>, DbErr> {
    let query = match role {
        Roles::Client => {
            projects::Entity::find().filter(projects::Column::OwnerId.eq(user_id))
        }
        Roles::Freelancer => projects::Entity::find()
            .filter(projects::Column::AcceptedFreelancerId.eq(user_id)),
        Roles::Admin => projects::Entity::find(),
    };

    let rows = query
        .find_also_related(users::Entity)
        .order_by_desc(projects::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(summaries(rows))
}
