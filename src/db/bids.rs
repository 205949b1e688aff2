use sea_orm::sea_query::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::db::projects as project_db;
use crate::error::AppError;
use crate::models::bids::{self, BidResponse, BidStatus};
use crate::models::projects::{self, ProjectStatus};
use crate::models::users;

/// Whether this freelancer already bid on this project.
pub async fn bid_exists(
    db: &DatabaseConnection,
    project_id: Uuid,
    freelancer_id: Uuid,
) -> Result<bool, DbErr> {
    let count = bids::Entity::find()
        .filter(bids::Column::ProjectId.eq(project_id))
        .filter(bids::Column::FreelancerId.eq(freelancer_id))
        .count(db)
        .await?;

    Ok(count > 0)
}

/// Insert a pending bid, but only while the project is still open.
///
/// The open check and the insert share one transaction. The check is an
/// update of the project row, so the row stays locked until commit, and a
/// concurrent accept either rejects this bid with its siblings or has
/// already moved the project out of `open`. The unique
/// (project_id, freelancer_id) index decides races between two submissions
/// from the same freelancer.
pub async fn insert_bid(db: &DatabaseConnection, bid: bids::Model) -> Result<bids::Model, AppError> {
    let txn = db.begin().await?;

    let still_open = projects::Entity::update_many()
        .col_expr(
            projects::Column::Version,
            Expr::col(projects::Column::Version).into(),
        )
        .filter(projects::Column::Id.eq(bid.project_id))
        .filter(projects::Column::Status.eq(ProjectStatus::Open))
        .filter(projects::Column::IsDeleted.eq(false))
        .exec(&txn)
        .await?;
    if still_open.rows_affected == 0 {
        return Err(AppError::InvalidState(
            "Project is no longer open for bids".to_string(),
        ));
    }

    let new_bid = bids::ActiveModel {
        id: Set(bid.id),
        project_id: Set(bid.project_id),
        freelancer_id: Set(bid.freelancer_id),
        bid_amount: Set(bid.bid_amount),
        message: Set(bid.message),
        status: Set(bid.status),
        created_at: Set(bid.created_at),
    };

    let inserted = new_bid.insert(&txn).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("You have already placed a bid on this project".to_string())
        }
        _ => AppError::from(e),
    })?;

    txn.commit().await?;
    Ok(inserted)
}

/// Fetch a single bid by ID.
pub async fn get_bid_by_id(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<bids::Model>, DbErr> {
    bids::Entity::find_by_id(id).one(db).await
}

/// The bid a freelancer placed on a project, if any.
pub async fn find_for_freelancer(
    db: &DatabaseConnection,
    project_id: Uuid,
    freelancer_id: Uuid,
) -> Result<Option<bids::Model>, DbErr> {
    bids::Entity::find()
        .filter(bids::Column::ProjectId.eq(project_id))
        .filter(bids::Column::FreelancerId.eq(freelancer_id))
        .one(db)
        .await
}

/// All bids on a project, cheapest first, with the bidder's username.
pub async fn list_for_project(
    db: &DatabaseConnection,
    project_id: Uuid,
) -> Result<Vec<BidResponse>, DbErr> {
    let rows = bids::Entity::find()
        .filter(bids::Column::ProjectId.eq(project_id))
        .find_also_related(users::Entity)
        .order_by_asc(bids::Column::BidAmount)
        .order_by_asc(bids::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(bid, freelancer)| BidResponse::new(bid, freelancer.map(|u| u.username)))
        .collect())
}

/// Accept `bid_id`, reject every other bid on the project and move the
/// project to `after`, all in one transaction.
///
/// Returns the saved project and the freelancers whose bids were rejected.
/// Nothing is written unless the project is still in `before`'s state and the
/// bid is still pending.
pub async fn accept_and_reject_siblings(
    db: &DatabaseConnection,
    bid_id: Uuid,
    before: &projects::Model,
    after: projects::Model,
) -> Result<(projects::Model, Vec<Uuid>), AppError> {
    let txn = db.begin().await?;

    let project = project_db::save(&txn, before, after).await?;

    let accepted = bids::Entity::update_many()
        .set(bids::ActiveModel {
            status: Set(BidStatus::Accepted),
            ..Default::default()
        })
        .filter(bids::Column::Id.eq(bid_id))
        .filter(bids::Column::ProjectId.eq(project.id))
        .filter(bids::Column::Status.eq(BidStatus::Pending))
        .exec(&txn)
        .await?;

    if accepted.rows_affected != 1 {
        txn.rollback().await?;
        return Err(AppError::Conflict(format!(
            "Bid {bid_id} is no longer pending"
        )));
    }

    let siblings = bids::Entity::find()
        .filter(bids::Column::ProjectId.eq(project.id))
        .filter(bids::Column::Id.ne(bid_id))
        .all(&txn)
        .await?;
    let rejected_freelancer_ids: Vec<Uuid> = siblings.iter().map(|b| b.freelancer_id).collect();

    bids::Entity::update_many()
        .set(bids::ActiveModel {
            status: Set(BidStatus::Rejected),
            ..Default::default()
        })
        .filter(bids::Column::ProjectId.eq(project.id))
        .filter(bids::Column::Id.ne(bid_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok((project, rejected_freelancer_ids))
}
