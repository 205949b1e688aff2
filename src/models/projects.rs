use chrono::{Days, NaiveDate};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Project status, persisted as the literal strings below.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Open => "open",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Delivered => "delivered",
            ProjectStatus::Rejected => "rejected",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Deleted => "deleted",
        }
    }

    /// Statuses in which a freelancer is assigned to the project.
    pub fn has_assignee(self) -> bool {
        matches!(
            self,
            ProjectStatus::InProgress
                | ProjectStatus::Delivered
                | ProjectStatus::Rejected
                | ProjectStatus::Completed
        )
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SeaORM entity for the `projects` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub budget: i64,
    pub owner_id: Uuid,
    pub created_at: NaiveDate,
    /// Days after `created_at`.
    pub deadline: i32,
    pub status: ProjectStatus,
    pub accepted_freelancer_id: Option<Uuid>,
    pub delivery_file_path: Option<String>,
    pub is_deleted: bool,
    /// Bumped by every save. Saves only apply to the version they were
    /// decided from.
    pub version: i32,
}

impl Model {
    /// Absolute due date. Never stored; always derived from `created_at`.
    pub fn deadline_date(&self) -> Option<NaiveDate> {
        let days = u64::try_from(self.deadline).ok()?;
        self.created_at.checked_add_days(Days::new(days))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bids::Entity")]
    Bids,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id"
    )]
    Owner,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AcceptedFreelancerId",
        to = "super::users::Column::Id"
    )]
    AcceptedFreelancer,
}

impl Related<super::bids::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bids.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub title: String,
    pub content: String,
    pub budget: i64,
    pub deadline: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditProject {
    pub title: Option<String>,
    pub content: Option<String>,
    pub budget: Option<i64>,
    pub deadline: Option<i32>,
}

/// Row shape for the listing endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub title: String,
    pub budget: i64,
    pub status: ProjectStatus,
    pub created_at: NaiveDate,
    pub deadline: i32,
    pub deadline_date: Option<NaiveDate>,
    pub client_username: Option<String>,
}

impl ProjectSummary {
    pub fn new(project: Model, client_username: Option<String>) -> Self {
        Self {
            deadline_date: project.deadline_date(),
            id: project.id,
            title: project.title,
            budget: project.budget,
            status: project.status,
            created_at: project.created_at,
            deadline: project.deadline,
            client_username,
        }
    }
}

/// Full detail view of a single project.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub budget: i64,
    pub status: ProjectStatus,
    pub created_at: NaiveDate,
    pub deadline: i32,
    pub deadline_date: Option<NaiveDate>,
    pub owner_id: Uuid,
    pub client_username: Option<String>,
    pub accepted_freelancer_id: Option<Uuid>,
    pub accepted_freelancer_username: Option<String>,
    pub delivery_file_path: Option<String>,
    pub is_deleted: bool,
}

impl ProjectResponse {
    pub fn new(
        project: Model,
        client_username: Option<String>,
        accepted_freelancer_username: Option<String>,
    ) -> Self {
        Self {
            deadline_date: project.deadline_date(),
            id: project.id,
            title: project.title,
            content: project.content,
            budget: project.budget,
            status: project.status,
            created_at: project.created_at,
            deadline: project.deadline,
            owner_id: project.owner_id,
            client_username,
            accepted_freelancer_id: project.accepted_freelancer_id,
            accepted_freelancer_username,
            delivery_file_path: project.delivery_file_path,
            is_deleted: project.is_deleted,
        }
    }
}
