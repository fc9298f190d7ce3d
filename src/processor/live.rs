//! Live commit tracking state.
//!
//! A SHA is "live" while it is the head of an open pull request or a pushed
//! branch. The table is owned by the processor task alone; nothing else
//! holds a reference to it, so it needs no locking.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::Sha;

/// In-flight tracking for one live commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCommitState {
    /// When the SHA became live.
    pub created_at: DateTime<Utc>,

    /// True once any pending status has been observed.
    pub check_seen: bool,

    /// Time of the most recent pending status. Starts at `created_at` as an
    /// approximation until a real pending arrives.
    pub ci_start: DateTime<Utc>,

    /// Most recent pending time per status context.
    pub build_starts: HashMap<String, DateTime<Utc>>,
}

impl LiveCommitState {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        LiveCommitState {
            created_at,
            check_seen: false,
            ci_start: created_at,
            build_starts: HashMap::new(),
        }
    }
}

/// Mapping from live SHA to its tracking state.
///
/// Global across repositories: SHAs are assumed unique, so there is no
/// per-repository partitioning. Entries are only removed by explicit close,
/// delete or rebase events.
#[derive(Debug, Default)]
pub struct LiveShaTable {
    entries: HashMap<Sha, LiveCommitState>,
}

impl LiveShaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) tracking `sha`, discarding any previous state.
    pub fn track(&mut self, sha: Sha, created_at: DateTime<Utc>) {
        self.entries.insert(sha, LiveCommitState::new(created_at));
    }

    /// Stops tracking `sha`, returning its state if it was live.
    pub fn forget(&mut self, sha: &Sha) -> Option<LiveCommitState> {
        self.entries.remove(sha)
    }

    pub fn get(&self, sha: &Sha) -> Option<&LiveCommitState> {
        self.entries.get(sha)
    }

    pub fn get_mut(&mut self, sha: &Sha) -> Option<&mut LiveCommitState> {
        self.entries.get_mut(sha)
    }

    pub fn contains(&self, sha: &Sha) -> bool {
        self.entries.contains_key(sha)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
