//! Shared test utilities: a recording publisher, arbitrary generators for
//! property-based testing, update builders and log capture.

use std::io;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use crate::events::{
    BranchAction, BranchUpdate, CommitUpdate, PrAction, PullUpdate, StatusState, UpdateEvent,
};
use crate::metrics::Publisher;
use crate::types::{RepoId, Sha};

// ─── Time and identity helpers ───

/// A fixed epoch all test timestamps are offset from.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
        .single()
        .expect("valid test epoch")
}

/// `epoch() + secs` seconds.
pub fn at(secs: i64) -> DateTime<Utc> {
    epoch() + Duration::seconds(secs)
}

/// A deterministic SHA whose hex digits are all derived from `n`.
/// `sha(0)` is the all-zero SHA of branch creation and deletion pushes.
pub fn sha(n: u8) -> Sha {
    Sha::parse(format!("{:02x}", n).repeat(20)).unwrap()
}

pub fn repo() -> RepoId {
    RepoId::new("octocat", "hello-world")
}

// ─── Update builders ───

pub fn pull(action: PrAction, sha: Sha, secs: i64) -> UpdateEvent {
    PullUpdate {
        repo: repo(),
        action,
        sha,
        number: 1,
        merged: false,
        timestamp: at(secs),
    }
    .into()
}

pub fn opened(sha: Sha, secs: i64) -> UpdateEvent {
    pull(PrAction::Opened, sha, secs)
}

pub fn closed(sha: Sha, secs: i64, merged: bool) -> UpdateEvent {
    PullUpdate {
        repo: repo(),
        action: PrAction::Closed,
        sha,
        number: 1,
        merged,
        timestamp: at(secs),
    }
    .into()
}

pub fn branch(action: BranchAction, old_sha: Sha, sha: Sha, secs: i64) -> UpdateEvent {
    BranchUpdate {
        repo: repo(),
        action,
        sha,
        old_sha,
        timestamp: at(secs),
    }
    .into()
}

pub fn status(sha: Sha, context: &str, status: StatusState, secs: i64) -> UpdateEvent {
    CommitUpdate {
        repo: repo(),
        status,
        context: context.to_string(),
        sha,
        timestamp: at(secs),
    }
    .into()
}

pub fn pending(sha: Sha, context: &str, secs: i64) -> UpdateEvent {
    status(sha, context, StatusState::Pending, secs)
}

// ─── Recording publisher ───

/// One publisher call, as recorded by [`RecordingPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    PrEvent(RepoId, PrAction),
    BranchEvent(RepoId, BranchAction),
    StatusCheck(RepoId, StatusState),
    MissedPending(RepoId),
    CiNoticed(RepoId, f64),
    Validation(RepoId, StatusState, f64),
    Merge(RepoId, f64),
    BuildDone(RepoId, String, StatusState, f64),
}

/// A [`Publisher`] that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    calls: Mutex<Vec<Observation>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, oldest first.
    pub fn observations(&self) -> Vec<Observation> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls matching `pred`.
    pub fn filtered(&self, pred: impl Fn(&Observation) -> bool) -> Vec<Observation> {
        self.observations().into_iter().filter(|o| pred(o)).collect()
    }

    pub fn ci_noticed(&self) -> Vec<f64> {
        self.observations()
            .into_iter()
            .filter_map(|o| match o {
                Observation::CiNoticed(_, s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn validations(&self) -> Vec<(StatusState, f64)> {
        self.observations()
            .into_iter()
            .filter_map(|o| match o {
                Observation::Validation(_, st, s) => Some((st, s)),
                _ => None,
            })
            .collect()
    }

    pub fn merges(&self) -> Vec<f64> {
        self.observations()
            .into_iter()
            .filter_map(|o| match o {
                Observation::Merge(_, s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn builds(&self) -> Vec<(String, StatusState, f64)> {
        self.observations()
            .into_iter()
            .filter_map(|o| match o {
                Observation::BuildDone(_, b, st, s) => Some((b, st, s)),
                _ => None,
            })
            .collect()
    }

    pub fn missed_pendings(&self) -> usize {
        self.filtered(|o| matches!(o, Observation::MissedPending(_)))
            .len()
    }

    fn record(&self, observation: Observation) {
        self.calls.lock().unwrap().push(observation);
    }
}

impl Publisher for RecordingPublisher {
    fn register_pr_event(&self, repo: &RepoId, action: PrAction) {
        self.record(Observation::PrEvent(repo.clone(), action));
    }

    fn register_branch_event(&self, repo: &RepoId, action: BranchAction) {
        self.record(Observation::BranchEvent(repo.clone(), action));
    }

    fn register_status_check(&self, repo: &RepoId, state: StatusState) {
        self.record(Observation::StatusCheck(repo.clone(), state));
    }

    fn register_missed_pending(&self, repo: &RepoId) {
        self.record(Observation::MissedPending(repo.clone()));
    }

    fn register_ci_noticed(&self, repo: &RepoId, seconds: f64) {
        self.record(Observation::CiNoticed(repo.clone(), seconds));
    }

    fn register_validation(&self, repo: &RepoId, status: StatusState, seconds: f64) {
        self.record(Observation::Validation(repo.clone(), status, seconds));
    }

    fn register_merge(&self, repo: &RepoId, seconds: f64) {
        self.record(Observation::Merge(repo.clone(), seconds));
    }

    fn register_build_done(&self, repo: &RepoId, build: &str, status: StatusState, seconds: f64) {
        self.record(Observation::BuildDone(
            repo.clone(),
            build.to_string(),
            status,
            seconds,
        ));
    }
}

// ─── Generators ───

pub fn arb_sha() -> impl Strategy<Value = Sha> {
    "[0-9a-f]{40}".prop_map(|s| Sha::parse(s).unwrap())
}

pub fn arb_terminal_state() -> impl Strategy<Value = StatusState> {
    prop_oneof![
        Just(StatusState::Success),
        Just(StatusState::Failure),
        Just(StatusState::Error),
    ]
}

pub fn arb_status_state() -> impl Strategy<Value = StatusState> {
    prop_oneof![Just(StatusState::Pending), arb_terminal_state()]
}

pub fn arb_context() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9/:_-]{0,30}".prop_map(String::from)
}

/// A commit status for `sha` with an arbitrary state, context and offset.
pub fn arb_status_for(sha: Sha) -> impl Strategy<Value = UpdateEvent> {
    (arb_status_state(), arb_context(), 0i64..100_000)
        .prop_map(move |(st, ctx, secs)| status(sha.clone(), &ctx, st, secs))
}

// ─── Log capture ───

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a thread-local subscriber and returns its result together
/// with the formatted log output (no ANSI colours).
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let out = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (out, logs)
}
