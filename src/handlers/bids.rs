use actix_web::{HttpResponse, web};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use tracing::info;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::cache::AppCache;
use crate::db::bids as bid_db;
use crate::db::projects as project_db;
use crate::error::{AppError, AppResult};
use crate::handlers::rejected;
use crate::lifecycle::{self, Effect, Transition};
use crate::models::bids::{AcceptBidResponse, BidResponse, CreateBid};
use crate::models::users::Roles;

/// GET /api/projects/{id}/bids: the owner and admins see every bid
/// (cheapest first); a freelancer sees only their own.
pub async fn list_bids(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let actor = &user.0;
    let id = path.into_inner();
    let project = project_db::load(db.get_ref(), id).await?;
    lifecycle::authorize_view(&project, actor).map_err(|r| rejected(actor, id, r))?;

    if lifecycle::sees_all_bids(&project, actor) {
        let bids = bid_db::list_for_project(db.get_ref(), id).await?;
        return Ok(HttpResponse::Ok().json(bids));
    }

    if actor.role != Roles::Freelancer {
        return Err(AppError::Forbidden(
            "Only the project owner can view its bids".into(),
        ));
    }

    let own: Vec<BidResponse> = bid_db::find_for_freelancer(db.get_ref(), id, actor.user_id)
        .await?
        .into_iter()
        .map(|bid| BidResponse::new(bid, Some(actor.username.clone())))
        .collect();
    Ok(HttpResponse::Ok().json(own))
}

/// POST /api/projects/{id}/bids: place a bid (freelancers, open projects, once).
pub async fn submit_bid(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: web::Json<CreateBid>,
) -> AppResult<HttpResponse> {
    let actor = &user.0;
    let id = path.into_inner();
    let project = project_db::load(db.get_ref(), id).await?;
    let already_bid = bid_db::bid_exists(db.get_ref(), id, actor.user_id).await?;

    let bid = lifecycle::new_bid(actor, &project, body.into_inner(), already_bid, Utc::now())
        .map_err(|r| rejected(actor, id, r))?;
    let bid = bid_db::insert_bid(db.get_ref(), bid).await?;

    info!(
        project_id = %id,
        bid_id = %bid.id,
        actor = %actor.username,
        amount = bid.bid_amount,
        "Bid placed"
    );
    Ok(HttpResponse::Created().json(BidResponse::new(bid, Some(actor.username.clone()))))
}

/// POST /api/projects/{id}/bids/{bid_id}/accept: hire the bidder. Every other
/// bid on the project is rejected in the same transaction.
pub async fn accept_bid(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<AppCache>,
    path: web::Path<(Uuid, Uuid)>,
) -> AppResult<HttpResponse> {
    let actor = &user.0;
    let (id, bid_id) = path.into_inner();
    let project = project_db::load(db.get_ref(), id).await?;
    let bid = bid_db::get_bid_by_id(db.get_ref(), bid_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Bid {bid_id} not found")))?;

    let decision = lifecycle::decide(&project, actor, Transition::AcceptBid(&bid))
        .map_err(|r| rejected(actor, id, r))?;
    let Effect::AcceptBid { bid_id, freelancer_id } = decision.effect else {
        return Err(AppError::Internal(
            "Accepting a bid produced an unexpected effect".into(),
        ));
    };

    let (project, rejected_freelancer_ids) =
        bid_db::accept_and_reject_siblings(db.get_ref(), bid_id, &decision.before, decision.after)
            .await?;
    cache.invalidate_open_projects().await;

    info!(
        project_id = %id,
        %bid_id,
        %freelancer_id,
        actor = %actor.username,
        rejected = rejected_freelancer_ids.len(),
        "Bid accepted"
    );
    Ok(HttpResponse::Ok().json(AcceptBidResponse {
        project,
        accepted_bid_id: bid_id,
        rejected_freelancer_ids,
    }))
}
