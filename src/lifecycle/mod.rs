//! Project lifecycle engine.
//!
//! Every project mutation goes through [`decide`] (or [`new_project`] /
//! [`new_bid`] for rows that do not exist yet). These functions are pure: they
//! take a snapshot of the project, the acting user and the requested
//! transition, and return either the next snapshot plus the side effect the
//! caller must persist, or a typed [`Rejection`]. Nothing here touches the
//! database; persistence compares against `Decision::before` so a concurrent
//! writer makes the save fail instead of being overwritten.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::models::bids::{self, BidStatus, CreateBid};
use crate::models::projects::{self, CreateProject, EditProject, ProjectStatus};
use crate::models::users::Roles;

const MAX_TITLE_CHARS: usize = 200;
const MAX_DEADLINE_DAYS: i32 = 3650;

/// The authenticated user performing an action, resolved from the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub username: String,
    pub role: Roles,
}

impl Actor {
    fn require_role(&self, required: Roles) -> Result<(), Rejection> {
        if self.role == required {
            Ok(())
        } else {
            Err(Rejection::WrongRole { required })
        }
    }

    fn require_owner(&self, project: &projects::Model, action: Action) -> Result<(), Rejection> {
        if project.owner_id == self.user_id {
            Ok(())
        } else {
            Err(Rejection::NotOwner(action))
        }
    }

    pub fn owns(&self, project: &projects::Model) -> bool {
        project.owner_id == self.user_id
    }

    pub fn is_assignee(&self, project: &projects::Model) -> bool {
        project.accepted_freelancer_id == Some(self.user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    SubmitBid,
    AcceptBid,
    Deliver,
    RejectDelivery,
    Complete,
    SoftDelete,
    Restore,
    Edit,
    Download,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::SubmitBid => "bid on",
            Action::AcceptBid => "accept a bid on",
            Action::Deliver => "deliver",
            Action::RejectDelivery => "reject the delivery of",
            Action::Complete => "complete",
            Action::SoftDelete => "delete",
            Action::Restore => "restore",
            Action::Edit => "edit",
            Action::Download => "download the delivery of",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("This action requires the {required} role")]
    WrongRole { required: Roles },
    #[error("Cannot {action} a project that is {from}")]
    WrongState { action: Action, from: ProjectStatus },
    #[error("Only the project owner can {0} this project")]
    NotOwner(Action),
    #[error("Only the assigned freelancer can deliver this project")]
    NotAssignee,
    #[error("Only the client and the hired freelancer can {0} this project")]
    NotParty(Action),
    #[error("Bid is already {0:?}; only pending bids can be accepted")]
    BidNotPending(BidStatus),
    #[error("You have already placed a bid on this project")]
    DuplicateBid,
    #[error("{0} not found")]
    ResourceNotFound(&'static str),
    #[error("{0}")]
    Invalid(String),
}

/// The single source of truth for which status an action moves a project to.
///
/// `None` means the action is illegal from `from`.
pub fn next_status(from: ProjectStatus, action: Action) -> Option<ProjectStatus> {
    use ProjectStatus::*;

    match (from, action) {
        (Open, Action::SubmitBid) => Some(Open),
        (Open, Action::AcceptBid) => Some(InProgress),
        (InProgress | Rejected, Action::Deliver) => Some(Delivered),
        (Delivered, Action::RejectDelivery) => Some(Rejected),
        (Delivered, Action::Complete) => Some(Completed),
        (Deleted, Action::SoftDelete) => None,
        (_, Action::SoftDelete) => Some(Deleted),
        (Deleted, Action::Restore) => Some(Open),
        (status, Action::Edit) => Some(status),
        _ => None,
    }
}

fn advance(project: &projects::Model, action: Action) -> Result<ProjectStatus, Rejection> {
    next_status(project.status, action).ok_or(Rejection::WrongState {
        action,
        from: project.status,
    })
}

/// True when the assignee column agrees with the status.
pub fn assignment_consistent(project: &projects::Model) -> bool {
    project.accepted_freelancer_id.is_some() == project.status.has_assignee()
        && project.is_deleted == (project.status == ProjectStatus::Deleted)
}

/// A requested change to an existing project.
#[derive(Debug, Clone)]
pub enum Transition<'a> {
    AcceptBid(&'a bids::Model),
    Deliver { file_path: String },
    RejectDelivery,
    Complete,
    SoftDelete,
    Restore { today: NaiveDate },
    Edit(&'a EditProject),
}

impl Transition<'_> {
    pub fn action(&self) -> Action {
        match self {
            Transition::AcceptBid(_) => Action::AcceptBid,
            Transition::Deliver { .. } => Action::Deliver,
            Transition::RejectDelivery => Action::RejectDelivery,
            Transition::Complete => Action::Complete,
            Transition::SoftDelete => Action::SoftDelete,
            Transition::Restore { .. } => Action::Restore,
            Transition::Edit(_) => Action::Edit,
        }
    }
}

/// What the repository must write besides the project row itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ProjectOnly,
    /// Mark `bid_id` accepted and every sibling rejected, in the same unit as
    /// the project update.
    AcceptBid { bid_id: Uuid, freelancer_id: Uuid },
    RecordDelivery { file_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub before: projects::Model,
    pub after: projects::Model,
    pub effect: Effect,
}

/// Decide whether `actor` may apply `transition` to `project`, and compute the
/// resulting snapshot. Identity is always checked before state.
pub fn decide(
    project: &projects::Model,
    actor: &Actor,
    transition: Transition<'_>,
) -> Result<Decision, Rejection> {
    let action = transition.action();
    let mut after = project.clone();

    let effect = match transition {
        Transition::AcceptBid(bid) => {
            actor.require_owner(project, action)?;
            if bid.project_id != project.id {
                return Err(Rejection::ResourceNotFound("Bid"));
            }
            if bid.status != BidStatus::Pending {
                return Err(Rejection::BidNotPending(bid.status));
            }
            after.status = advance(project, action)?;
            after.accepted_freelancer_id = Some(bid.freelancer_id);
            Effect::AcceptBid {
                bid_id: bid.id,
                freelancer_id: bid.freelancer_id,
            }
        }
        Transition::Deliver { file_path } => {
            authorize_delivery(project, actor)?;
            after.status = advance(project, action)?;
            after.delivery_file_path = Some(file_path.clone());
            Effect::RecordDelivery { file_path }
        }
        Transition::RejectDelivery | Transition::Complete => {
            actor.require_owner(project, action)?;
            after.status = advance(project, action)?;
            Effect::ProjectOnly
        }
        Transition::SoftDelete => {
            actor.require_owner(project, action)?;
            after.status = advance(project, action)?;
            after.is_deleted = true;
            after.accepted_freelancer_id = None;
            Effect::ProjectOnly
        }
        Transition::Restore { today } => {
            actor.require_owner(project, action)?;
            if !project.is_deleted {
                return Err(Rejection::WrongState {
                    action,
                    from: project.status,
                });
            }
            after.status = advance(project, action)?;
            after.is_deleted = false;
            after.accepted_freelancer_id = None;
            after.created_at = today;
            Effect::ProjectOnly
        }
        Transition::Edit(edit) => {
            actor.require_owner(project, action)?;
            after.status = advance(project, action)?;
            if let Some(title) = &edit.title {
                after.title = title.trim().to_string();
            }
            if let Some(content) = &edit.content {
                after.content = content.clone();
            }
            if let Some(budget) = edit.budget {
                after.budget = budget;
            }
            if let Some(deadline) = edit.deadline {
                after.deadline = deadline;
            }
            validate_project_fields(&after.title, after.budget, after.deadline)?;
            Effect::ProjectOnly
        }
    };

    debug_assert!(assignment_consistent(&after));

    Ok(Decision {
        action,
        before: project.clone(),
        after,
        effect,
    })
}

/// Identity and state checks for a delivery, without the file path.
///
/// Handlers call this before accepting the upload stream so an illegal
/// delivery never reaches the disk.
pub fn authorize_delivery(project: &projects::Model, actor: &Actor) -> Result<(), Rejection> {
    actor.require_role(Roles::Freelancer)?;
    if !actor.is_assignee(project) {
        return Err(Rejection::NotAssignee);
    }
    advance(project, Action::Deliver).map(|_| ())
}

/// Build the snapshot of a freshly posted project.
pub fn new_project(
    actor: &Actor,
    input: CreateProject,
    today: NaiveDate,
) -> Result<projects::Model, Rejection> {
    actor.require_role(Roles::Client)?;
    let title = input.title.trim().to_string();
    validate_project_fields(&title, input.budget, input.deadline)?;

    Ok(projects::Model {
        id: Uuid::new_v4(),
        title,
        content: input.content,
        budget: input.budget,
        owner_id: actor.user_id,
        created_at: today,
        deadline: input.deadline,
        status: ProjectStatus::Open,
        accepted_freelancer_id: None,
        delivery_file_path: None,
        is_deleted: false,
        version: 0,
    })
}

/// Build a pending bid. `already_bid` is the ledger's answer for this
/// (project, freelancer) pair; the store's unique index still backs it up.
pub fn new_bid(
    actor: &Actor,
    project: &projects::Model,
    input: CreateBid,
    already_bid: bool,
    now: DateTime<Utc>,
) -> Result<bids::Model, Rejection> {
    actor.require_role(Roles::Freelancer)?;
    advance(project, Action::SubmitBid)?;
    if already_bid {
        return Err(Rejection::DuplicateBid);
    }
    if input.bid_amount <= 0 {
        return Err(Rejection::Invalid("Bid amount must be positive".into()));
    }

    Ok(bids::Model {
        id: Uuid::new_v4(),
        project_id: project.id,
        freelancer_id: actor.user_id,
        bid_amount: input.bid_amount,
        message: input.message,
        status: BidStatus::Pending,
        created_at: now,
    })
}

/// Deleted projects are only visible to their owner and admins.
pub fn authorize_view(project: &projects::Model, actor: &Actor) -> Result<(), Rejection> {
    if project.is_deleted && !actor.owns(project) && actor.role != Roles::Admin {
        return Err(Rejection::ResourceNotFound("Project"));
    }
    Ok(())
}

/// The owner and admins see every bid; freelancers see only their own.
pub fn sees_all_bids(project: &projects::Model, actor: &Actor) -> bool {
    actor.owns(project) || actor.role == Roles::Admin
}

/// Only the two parties may fetch the delivered file.
pub fn authorize_download(project: &projects::Model, actor: &Actor) -> Result<(), Rejection> {
    if !actor.owns(project) && !actor.is_assignee(project) {
        return Err(Rejection::NotParty(Action::Download));
    }
    if project.delivery_file_path.is_none() {
        return Err(Rejection::ResourceNotFound("Delivery"));
    }
    Ok(())
}

fn validate_project_fields(title: &str, budget: i64, deadline: i32) -> Result<(), Rejection> {
    if title.is_empty() {
        return Err(Rejection::Invalid("Title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(Rejection::Invalid(format!(
            "Title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    if budget <= 0 {
        return Err(Rejection::Invalid("Budget must be positive".into()));
    }
    if !(1..=MAX_DEADLINE_DAYS).contains(&deadline) {
        return Err(Rejection::Invalid(format!(
            "Deadline must be between 1 and {MAX_DEADLINE_DAYS} days"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Roles) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            username: format!("{role}-{}", Uuid::new_v4().simple()),
            role,
        }
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, n).unwrap()
    }

    fn open_project(owner: &Actor) -> projects::Model {
        new_project(
            owner,
            CreateProject {
                title: "Logo design".into(),
                content: "Need a logo".into(),
                budget: 500,
                deadline: 7,
            },
            day(1),
        )
        .unwrap()
    }

    fn bid_from(freelancer: &Actor, project: &projects::Model, amount: i64) -> bids::Model {
        new_bid(
            freelancer,
            project,
            CreateBid {
                bid_amount: amount,
                message: String::new(),
            },
            false,
            Utc::now(),
        )
        .unwrap()
    }

    fn in_progress(owner: &Actor, freelancer: &Actor) -> projects::Model {
        let project = open_project(owner);
        let bid = bid_from(freelancer, &project, 300);
        decide(&project, owner, Transition::AcceptBid(&bid))
            .unwrap()
            .after
    }

    fn with_status(mut project: projects::Model, status: ProjectStatus) -> projects::Model {
        project.status = status;
        project
    }

    #[test]
    fn only_clients_create_projects() {
        let freelancer = actor(Roles::Freelancer);
        let err = new_project(
            &freelancer,
            CreateProject {
                title: "x".into(),
                content: String::new(),
                budget: 10,
                deadline: 1,
            },
            day(1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            Rejection::WrongRole {
                required: Roles::Client
            }
        );
    }

    #[test]
    fn new_project_starts_open_and_unassigned() {
        let client = actor(Roles::Client);
        let project = open_project(&client);
        assert_eq!(project.status, ProjectStatus::Open);
        assert_eq!(project.owner_id, client.user_id);
        assert!(project.accepted_freelancer_id.is_none());
        assert!(project.delivery_file_path.is_none());
        assert_eq!(project.deadline_date(), Some(day(8)));
        assert!(assignment_consistent(&project));
    }

    #[test]
    fn project_fields_are_validated() {
        let client = actor(Roles::Client);
        let bad = [
            ("   ", 10, 1),
            ("ok", 0, 1),
            ("ok", 10, 0),
            ("ok", 10, MAX_DEADLINE_DAYS + 1),
        ];
        for (title, budget, deadline) in bad {
            let result = new_project(
                &client,
                CreateProject {
                    title: title.into(),
                    content: String::new(),
                    budget,
                    deadline,
                },
                day(1),
            );
            assert!(matches!(result, Err(Rejection::Invalid(_))), "{title:?}");
        }
    }

    #[test]
    fn only_freelancers_bid_and_only_on_open_projects() {
        let client = actor(Roles::Client);
        let freelancer = actor(Roles::Freelancer);
        let project = open_project(&client);

        let input = || CreateBid {
            bid_amount: 100,
            message: "hi".into(),
        };

        assert!(matches!(
            new_bid(&client, &project, input(), false, Utc::now()),
            Err(Rejection::WrongRole { .. })
        ));

        let assigned = with_status(project.clone(), ProjectStatus::InProgress);
        assert!(matches!(
            new_bid(&freelancer, &assigned, input(), false, Utc::now()),
            Err(Rejection::WrongState { .. })
        ));

        assert_eq!(
            new_bid(&freelancer, &project, input(), true, Utc::now()),
            Err(Rejection::DuplicateBid)
        );

        let bid = new_bid(&freelancer, &project, input(), false, Utc::now()).unwrap();
        assert_eq!(bid.status, BidStatus::Pending);
        assert_eq!(bid.freelancer_id, freelancer.user_id);
    }

    #[test]
    fn non_positive_bid_is_invalid() {
        let client = actor(Roles::Client);
        let freelancer = actor(Roles::Freelancer);
        let project = open_project(&client);
        let result = new_bid(
            &freelancer,
            &project,
            CreateBid {
                bid_amount: 0,
                message: String::new(),
            },
            false,
            Utc::now(),
        );
        assert!(matches!(result, Err(Rejection::Invalid(_))));
    }

    #[test]
    fn accept_bid_assigns_freelancer() {
        let client = actor(Roles::Client);
        let freelancer = actor(Roles::Freelancer);
        let project = open_project(&client);
        let bid = bid_from(&freelancer, &project, 350);

        let decision = decide(&project, &client, Transition::AcceptBid(&bid)).unwrap();
        assert_eq!(decision.after.status, ProjectStatus::InProgress);
        assert_eq!(
            decision.after.accepted_freelancer_id,
            Some(freelancer.user_id)
        );
        assert_eq!(
            decision.effect,
            Effect::AcceptBid {
                bid_id: bid.id,
                freelancer_id: freelancer.user_id
            }
        );
        assert_eq!(decision.before, project);
    }

    #[test]
    fn accept_bid_requires_owner_and_pending_bid_on_this_project() {
        let client = actor(Roles::Client);
        let other_client = actor(Roles::Client);
        let freelancer = actor(Roles::Freelancer);
        let project = open_project(&client);
        let bid = bid_from(&freelancer, &project, 350);

        assert_eq!(
            decide(&project, &other_client, Transition::AcceptBid(&bid)),
            Err(Rejection::NotOwner(Action::AcceptBid))
        );

        let mut foreign = bid.clone();
        foreign.project_id = Uuid::new_v4();
        assert_eq!(
            decide(&project, &client, Transition::AcceptBid(&foreign)),
            Err(Rejection::ResourceNotFound("Bid"))
        );

        let mut rejected = bid.clone();
        rejected.status = BidStatus::Rejected;
        assert_eq!(
            decide(&project, &client, Transition::AcceptBid(&rejected)),
            Err(Rejection::BidNotPending(BidStatus::Rejected))
        );

        let assigned = with_status(project.clone(), ProjectStatus::InProgress);
        assert!(matches!(
            decide(&assigned, &client, Transition::AcceptBid(&bid)),
            Err(Rejection::WrongState { .. })
        ));
    }

    #[test]
    fn only_the_assignee_delivers() {
        let client = actor(Roles::Client);
        let freelancer = actor(Roles::Freelancer);
        let stranger = actor(Roles::Freelancer);
        let project = in_progress(&client, &freelancer);

        let deliver = || Transition::Deliver {
            file_path: "uploads/deliveries/x_logo.png".into(),
        };

        assert_eq!(
            decide(&project, &stranger, deliver()),
            Err(Rejection::NotAssignee)
        );
        assert!(matches!(
            decide(&project, &client, deliver()),
            Err(Rejection::WrongRole { .. })
        ));

        let decision = decide(&project, &freelancer, deliver()).unwrap();
        assert_eq!(decision.after.status, ProjectStatus::Delivered);
        assert_eq!(
            decision.after.delivery_file_path.as_deref(),
            Some("uploads/deliveries/x_logo.png")
        );
    }

    #[test]
    fn delivery_requires_in_progress_or_rejected() {
        let client = actor(Roles::Client);
        let freelancer = actor(Roles::Freelancer);
        let project = in_progress(&client, &freelancer);

        for status in [ProjectStatus::Delivered, ProjectStatus::Completed] {
            let p = with_status(project.clone(), status);
            assert!(matches!(
                authorize_delivery(&p, &freelancer),
                Err(Rejection::WrongState { .. })
            ));
        }
        let rejected = with_status(project, ProjectStatus::Rejected);
        assert!(authorize_delivery(&rejected, &freelancer).is_ok());
    }

    #[test]
    fn illegal_transitions_leave_snapshot_untouched() {
        let client = actor(Roles::Client);
        let project = open_project(&client);
        let snapshot = project.clone();

        let err = decide(&project, &client, Transition::Complete).unwrap_err();
        assert_eq!(
            err,
            Rejection::WrongState {
                action: Action::Complete,
                from: ProjectStatus::Open
            }
        );
        assert_eq!(project, snapshot);

        assert!(decide(&project, &client, Transition::RejectDelivery).is_err());
        assert_eq!(project, snapshot);
    }

    #[test]
    fn soft_delete_and_restore() {
        let client = actor(Roles::Client);
        let freelancer = actor(Roles::Freelancer);
        let project = in_progress(&client, &freelancer);

        let deleted = decide(&project, &client, Transition::SoftDelete)
            .unwrap()
            .after;
        assert_eq!(deleted.status, ProjectStatus::Deleted);
        assert!(deleted.is_deleted);
        assert!(assignment_consistent(&deleted));

        assert!(matches!(
            decide(&deleted, &client, Transition::SoftDelete),
            Err(Rejection::WrongState { .. })
        ));

        let restored = decide(&deleted, &client, Transition::Restore { today: day(20) })
            .unwrap()
            .after;
        assert_eq!(restored.status, ProjectStatus::Open);
        assert!(!restored.is_deleted);
        assert_eq!(restored.created_at, day(20));

        // A second restore finds the project already open.
        assert_eq!(
            decide(&restored, &client, Transition::Restore { today: day(21) }),
            Err(Rejection::WrongState {
                action: Action::Restore,
                from: ProjectStatus::Open
            })
        );
    }

    #[test]
    fn only_owner_deletes_or_restores() {
        let client = actor(Roles::Client);
        let admin = actor(Roles::Admin);
        let project = open_project(&client);

        assert_eq!(
            decide(&project, &admin, Transition::SoftDelete),
            Err(Rejection::NotOwner(Action::SoftDelete))
        );
    }

    #[test]
    fn edit_updates_fields_in_place_without_status_change() {
        let client = actor(Roles::Client);
        let freelancer = actor(Roles::Freelancer);
        let project = in_progress(&client, &freelancer);

        let edit = EditProject {
            title: Some("  New title ".into()),
            budget: Some(800),
            ..Default::default()
        };
        let after = decide(&project, &client, Transition::Edit(&edit))
            .unwrap()
            .after;
        assert_eq!(after.title, "New title");
        assert_eq!(after.budget, 800);
        assert_eq!(after.deadline, project.deadline);
        assert_eq!(after.status, ProjectStatus::InProgress);

        let bad = EditProject {
            budget: Some(-1),
            ..Default::default()
        };
        assert!(matches!(
            decide(&project, &client, Transition::Edit(&bad)),
            Err(Rejection::Invalid(_))
        ));
    }

    #[test]
    fn deleted_projects_are_hidden_from_others() {
        let client = actor(Roles::Client);
        let freelancer = actor(Roles::Freelancer);
        let admin = actor(Roles::Admin);
        let deleted = decide(&open_project(&client), &client, Transition::SoftDelete)
            .unwrap()
            .after;

        assert!(authorize_view(&deleted, &client).is_ok());
        assert!(authorize_view(&deleted, &admin).is_ok());
        assert_eq!(
            authorize_view(&deleted, &freelancer),
            Err(Rejection::ResourceNotFound("Project"))
        );
    }

    #[test]
    fn download_requires_party_and_file() {
        let client = actor(Roles::Client);
        let freelancer = actor(Roles::Freelancer);
        let stranger = actor(Roles::Freelancer);
        let project = in_progress(&client, &freelancer);

        assert_eq!(
            authorize_download(&project, &client),
            Err(Rejection::ResourceNotFound("Delivery"))
        );

        let delivered = decide(
            &project,
            &freelancer,
            Transition::Deliver {
                file_path: "uploads/deliveries/a.pdf".into(),
            },
        )
        .unwrap()
        .after;
        assert!(authorize_download(&delivered, &client).is_ok());
        assert!(authorize_download(&delivered, &freelancer).is_ok());
        let refused = authorize_download(&delivered, &stranger).unwrap_err();
        assert_eq!(refused, Rejection::NotParty(Action::Download));
        assert_eq!(
            refused.to_string(),
            "Only the client and the hired freelancer can download the delivery of this project"
        );
    }

    #[test]
    fn transition_table_terminal_states() {
        use ProjectStatus::*;
        let actions = [
            Action::SubmitBid,
            Action::AcceptBid,
            Action::Deliver,
            Action::RejectDelivery,
            Action::Complete,
            Action::Restore,
        ];
        for action in actions {
            assert_eq!(next_status(Completed, action), None, "{action:?}");
        }
        assert_eq!(next_status(Completed, Action::SoftDelete), Some(Deleted));
        assert_eq!(next_status(Deleted, Action::Restore), Some(Open));
        assert_eq!(next_status(Deleted, Action::Edit), Some(Deleted));
    }
}
