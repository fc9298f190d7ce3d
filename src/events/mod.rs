//! Domain event types consumed by the event processor.
//!
//! The gateway decodes webhook payloads into exactly three kinds of update:
//!
//! - [`PullUpdate`] - a pull request changed state (opened, closed, ...)
//! - [`BranchUpdate`] - a branch was created, deleted or moved by a push
//! - [`CommitUpdate`] - a CI status check reported on a commit
//!
//! All three carry the repository, the commit they concern and the time the
//! provider recorded the change. They travel through the processor queue as
//! the single sum type [`UpdateEvent`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{RepoId, Sha};

/// Action performed on a pull request.
///
/// The full set GitHub delivers is modelled so that the gateway never has to
/// guess; the processor only acts on `opened`, `reopened`,
/// `ready_for_review` and `closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrAction {
    Assigned,
    Unassigned,
    ReviewRequested,
    ReviewRequestRemoved,
    Labeled,
    Unlabeled,
    Opened,
    Edited,
    Closed,
    ReadyForReview,
    Locked,
    Unlocked,
    Reopened,
}

impl PrAction {
    /// Every action, in declaration order.
    pub const ALL: [PrAction; 13] = [
        PrAction::Assigned,
        PrAction::Unassigned,
        PrAction::ReviewRequested,
        PrAction::ReviewRequestRemoved,
        PrAction::Labeled,
        PrAction::Unlabeled,
        PrAction::Opened,
        PrAction::Edited,
        PrAction::Closed,
        PrAction::ReadyForReview,
        PrAction::Locked,
        PrAction::Unlocked,
        PrAction::Reopened,
    ];

    /// The action name as GitHub spells it; also the `event` metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrAction::Assigned => "assigned",
            PrAction::Unassigned => "unassigned",
            PrAction::ReviewRequested => "review_requested",
            PrAction::ReviewRequestRemoved => "review_request_removed",
            PrAction::Labeled => "labeled",
            PrAction::Unlabeled => "unlabeled",
            PrAction::Opened => "opened",
            PrAction::Edited => "edited",
            PrAction::Closed => "closed",
            PrAction::ReadyForReview => "ready_for_review",
            PrAction::Locked => "locked",
            PrAction::Unlocked => "unlocked",
            PrAction::Reopened => "reopened",
        }
    }

    /// Parses a GitHub action name. Returns `None` for actions this system
    /// does not know about.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }

    /// Returns true for actions that make the head SHA live.
    pub fn starts_tracking(&self) -> bool {
        matches!(
            self,
            PrAction::Opened | PrAction::Reopened | PrAction::ReadyForReview
        )
    }
}

impl fmt::Display for PrAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a push did to a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchAction {
    /// A new branch was pushed.
    Created,
    /// The branch was deleted.
    Deleted,
    /// The branch head moved (push or force-push).
    Rebased,
}

impl BranchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchAction::Created => "created",
            BranchAction::Deleted => "deleted",
            BranchAction::Rebased => "rebased",
        }
    }

    /// Derives the action from the `created`/`deleted` flags of a push.
    ///
    /// Returns `None` when both flags are set, which GitHub should never send.
    pub fn from_push_flags(created: bool, deleted: bool) -> Option<Self> {
        match (created, deleted) {
            (false, false) => Some(BranchAction::Rebased),
            (true, false) => Some(BranchAction::Created),
            (false, true) => Some(BranchAction::Deleted),
            (true, true) => None,
        }
    }
}

impl fmt::Display for BranchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a commit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    /// Check is pending.
    Pending,
    /// Check succeeded.
    Success,
    /// Check failed.
    Failure,
    /// Check errored.
    Error,
}

impl StatusState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusState::Pending => "pending",
            StatusState::Success => "success",
            StatusState::Failure => "failure",
            StatusState::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(StatusState::Pending),
            "success" => Some(StatusState::Success),
            "failure" => Some(StatusState::Failure),
            "error" => Some(StatusState::Error),
            _ => None,
        }
    }

    /// Returns true if this is a terminal state (not pending).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusState::Success | StatusState::Failure | StatusState::Error
        )
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pull request changed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullUpdate {
    pub repo: RepoId,
    pub action: PrAction,
    /// Head commit of the pull request.
    pub sha: Sha,
    pub number: u64,
    /// Only meaningful for `closed`.
    pub merged: bool,
    pub timestamp: DateTime<Utc>,
}

/// A push moved, created or deleted a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchUpdate {
    pub repo: RepoId,
    pub action: BranchAction,
    /// The branch head after the push (`after`); all zeros on deletion.
    pub sha: Sha,
    /// The branch head before the push (`before`); all zeros on creation.
    pub old_sha: Sha,
    pub timestamp: DateTime<Utc>,
}

/// A CI status check reported on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitUpdate {
    pub repo: RepoId,
    pub status: StatusState,
    /// Name of the check, e.g. `ci/circleci: build`.
    pub context: String,
    pub sha: Sha,
    pub timestamp: DateTime<Utc>,
}

/// Any update the processor can consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateEvent {
    Pull(PullUpdate),
    Branch(BranchUpdate),
    Commit(CommitUpdate),
}

impl UpdateEvent {
    /// Returns the repository this update belongs to.
    pub fn repo(&self) -> &RepoId {
        match self {
            UpdateEvent::Pull(e) => &e.repo,
            UpdateEvent::Branch(e) => &e.repo,
            UpdateEvent::Commit(e) => &e.repo,
        }
    }

    /// Short name of the update kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateEvent::Pull(_) => "pull",
            UpdateEvent::Branch(_) => "branch",
            UpdateEvent::Commit(_) => "commit",
        }
    }
}

impl From<PullUpdate> for UpdateEvent {
    fn from(e: PullUpdate) -> Self {
        UpdateEvent::Pull(e)
    }
}

impl From<BranchUpdate> for UpdateEvent {
    fn from(e: BranchUpdate) -> Self {
        UpdateEvent::Branch(e)
    }
}

impl From<CommitUpdate> for UpdateEvent {
    fn from(e: CommitUpdate) -> Self {
        UpdateEvent::Commit(e)
    }
}
