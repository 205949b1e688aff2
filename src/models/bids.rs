use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bid status stored as a lowercase string in the database.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// SeaORM entity for the `bids` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bids")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub freelancer_id: Uuid,
    pub bid_amount: i64,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub status: BidStatus,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id"
    )]
    Project,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::FreelancerId",
        to = "super::users::Column::Id"
    )]
    Freelancer,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Freelancer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBid {
    pub bid_amount: i64,
    #[serde(default)]
    pub message: String,
}

/// A bid together with the bidding freelancer's username.
#[derive(Debug, Clone, Serialize)]
pub struct BidResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub freelancer_id: Uuid,
    pub freelancer_username: Option<String>,
    pub bid_amount: i64,
    pub message: String,
    pub status: BidStatus,
    pub created_at: DateTimeUtc,
}

impl BidResponse {
    pub fn new(bid: Model, freelancer_username: Option<String>) -> Self {
        Self {
            id: bid.id,
            project_id: bid.project_id,
            freelancer_id: bid.freelancer_id,
            freelancer_username,
            bid_amount: bid.bid_amount,
            message: bid.message,
            status: bid.status,
            created_at: bid.created_at,
        }
    }
}

/// Returned by `POST /api/projects/{id}/bids/{bid_id}/accept`.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptBidResponse {
    pub project: super::projects::Model,
    pub accepted_bid_id: Uuid,
    pub rejected_freelancer_ids: Vec<Uuid>,
}
