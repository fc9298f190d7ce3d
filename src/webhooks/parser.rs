//! GitHub webhook payload parser.
//!
//! Turns the raw JSON of a delivery into the [`UpdateEvent`] the processor
//! consumes. Only three event types carry anything to track:
//!
//! | `X-GitHub-Event` | Update | Timestamp source |
//! |------------------|--------|------------------|
//! | `pull_request` | [`PullUpdate`] | `pull_request.updated_at` |
//! | `push` | [`BranchUpdate`] | `repository.pushed_at` |
//! | `status` | [`CommitUpdate`] | `updated_at` |
//!
//! Every other event type, unknown pull request actions, unknown status
//! states and pushes flagged as both created and deleted yield `Ok(None)`.
//! Malformed payloads are errors.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::events::{
    BranchAction, BranchUpdate, CommitUpdate, PrAction, PullUpdate, StatusState, UpdateEvent,
};
use crate::types::{RepoId, Sha};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Field has invalid value (e.g., malformed SHA).
    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a webhook payload into an update.
///
/// * `Ok(Some(update))` - the delivery carries something to track
/// * `Ok(None)` - nothing to track (ignored, not an error)
/// * `Err(e)` - malformed payload or missing required fields
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<UpdateEvent>, ParseError> {
    match event_type {
        "pull_request" => parse_pull_request(payload).map(|opt| opt.map(UpdateEvent::Pull)),
        "push" => parse_push(payload).map(|opt| opt.map(UpdateEvent::Branch)),
        "status" => parse_status(payload).map(|opt| opt.map(UpdateEvent::Commit)),
        other => {
            debug!(event_type = other, "Ignoring webhook event type");
            Ok(None)
        }
    }
}

// ============================================================================
// Shared raw structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawRepository {
    full_name: String,
}

impl RawRepository {
    fn repo_id(&self) -> Result<RepoId, ParseError> {
        match self.full_name.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                Ok(RepoId::new(owner, name))
            }
            _ => Err(ParseError::InvalidField {
                field: "repository.full_name",
                value: self.full_name.clone(),
            }),
        }
    }
}

fn parse_sha(field: &'static str, value: &str) -> Result<Sha, ParseError> {
    Sha::parse(value).map_err(|_| ParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}

// ============================================================================
// pull_request event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    number: u64,
    pull_request: RawPullRequest,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    head: RawHead,
    merged: Option<bool>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawHead {
    sha: String,
}

fn parse_pull_request(payload: &[u8]) -> Result<Option<PullUpdate>, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;

    let Some(action) = PrAction::parse(&raw.action) else {
        warn!(action = %raw.action, "Skipping pull request event with unknown action");
        return Ok(None);
    };

    Ok(Some(PullUpdate {
        repo: raw.repository.repo_id()?,
        action,
        sha: parse_sha("pull_request.head.sha", &raw.pull_request.head.sha)?,
        number: raw.number,
        merged: raw.pull_request.merged.unwrap_or(false),
        timestamp: raw.pull_request.updated_at,
    }))
}

// ============================================================================
// push event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPushPayload {
    before: String,
    after: String,
    #[serde(default)]
    created: bool,
    #[serde(default)]
    deleted: bool,
    repository: RawPushRepository,
}

#[derive(Debug, Deserialize)]
struct RawPushRepository {
    full_name: String,
    pushed_at: RawTimestamp,
}

/// `repository.pushed_at` is unix seconds in push payloads and an RFC 3339
/// string everywhere else; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Unix(i64),
    Rfc3339(DateTime<Utc>),
}

impl RawTimestamp {
    fn to_utc(&self) -> Result<DateTime<Utc>, ParseError> {
        match self {
            RawTimestamp::Rfc3339(t) => Ok(*t),
            RawTimestamp::Unix(secs) => {
                Utc.timestamp_opt(*secs, 0)
                    .single()
                    .ok_or_else(|| ParseError::InvalidField {
                        field: "repository.pushed_at",
                        value: secs.to_string(),
                    })
            }
        }
    }
}

fn parse_push(payload: &[u8]) -> Result<Option<BranchUpdate>, ParseError> {
    let raw: RawPushPayload = serde_json::from_slice(payload)?;

    let Some(action) = BranchAction::from_push_flags(raw.created, raw.deleted) else {
        warn!("Skipping push that both created and deleted a branch");
        return Ok(None);
    };

    let repository = RawRepository {
        full_name: raw.repository.full_name,
    };

    Ok(Some(BranchUpdate {
        repo: repository.repo_id()?,
        action,
        sha: parse_sha("after", &raw.after)?,
        old_sha: parse_sha("before", &raw.before)?,
        timestamp: raw.repository.pushed_at.to_utc()?,
    }))
}

// ============================================================================
// status event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawStatusPayload {
    sha: String,
    state: String,
    context: String,
    updated_at: DateTime<Utc>,
    repository: RawRepository,
}

fn parse_status(payload: &[u8]) -> Result<Option<CommitUpdate>, ParseError> {
    let raw: RawStatusPayload = serde_json::from_slice(payload)?;

    let Some(status) = StatusState::parse(&raw.state) else {
        warn!(state = %raw.state, "Skipping status event with unknown state");
        return Ok(None);
    };

    Ok(Some(CommitUpdate {
        repo: raw.repository.repo_id()?,
        status,
        context: raw.context,
        sha: parse_sha("sha", &raw.sha)?,
        timestamp: raw.updated_at,
    }))
}
