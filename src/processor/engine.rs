//! The synchronous event state machine.
//!
//! Correlates pull request, branch and commit status updates by SHA and
//! turns them into latency observations on a [`Publisher`]. Every handler is
//! a short, non-blocking transformation of the live table followed by
//! publisher calls; nothing here can fail. Data that cannot be correlated is
//! logged and skipped.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::events::{BranchAction, BranchUpdate, CommitUpdate, PrAction, PullUpdate, UpdateEvent};
use crate::matcher::ContextMatcher;
use crate::metrics::Publisher;
use crate::types::Sha;

use super::live::{LiveCommitState, LiveShaTable};

/// Seconds from `start` to `end`, at millisecond resolution.
///
/// Out-of-order timestamps produce a negative value, which is reported as is.
fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

/// Owns the live SHA table and applies updates to it in order.
pub struct EventProcessor<P, M> {
    publisher: P,
    matcher: M,
    track_build_times: bool,
    live: LiveShaTable,
}

impl<P: Publisher, M: ContextMatcher> EventProcessor<P, M> {
    /// Creates a processor with an empty live table.
    ///
    /// When `track_build_times` is false, per-context build durations and
    /// missed-pending compensation are skipped.
    pub fn new(publisher: P, matcher: M, track_build_times: bool) -> Self {
        EventProcessor {
            publisher,
            matcher,
            track_build_times,
            live: LiveShaTable::new(),
        }
    }

    pub fn track_build_times(&self) -> bool {
        self.track_build_times
    }

    pub fn is_live(&self, sha: &Sha) -> bool {
        self.live.contains(sha)
    }

    pub fn live_state(&self, sha: &Sha) -> Option<&LiveCommitState> {
        self.live.get(sha)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Applies one update.
    pub fn process(&mut self, event: UpdateEvent) {
        match event {
            UpdateEvent::Pull(up) => self.process_pull_update(up),
            UpdateEvent::Branch(up) => self.process_branch_update(up),
            UpdateEvent::Commit(up) => self.process_commit_update(up),
        }
    }

    /// Opens, reopens and ready-for-review start tracking the head SHA;
    /// closing stops it and records the merge time if the PR merged.
    #[instrument(skip_all, fields(repo = %up.repo, pr = up.number, sha = %up.sha.short(), action = %up.action))]
    pub fn process_pull_update(&mut self, up: PullUpdate) {
        match up.action {
            action if action.starts_tracking() => {
                debug!("Tracking pull request head");
                self.live.track(up.sha.clone(), up.timestamp);
            }

            PrAction::Closed => match self.live.forget(&up.sha) {
                None => {
                    warn!("Closed pull request head is not live, skipping merge time");
                }
                Some(state) => {
                    if up.merged {
                        let seconds = elapsed_seconds(state.created_at, up.timestamp);
                        debug!(seconds, "Pull request merged");
                        self.publisher.register_merge(&up.repo, seconds);
                    }
                }
            },

            _ => {
                debug!("Skipping pull request action");
                return;
            }
        }

        self.publisher.register_pr_event(&up.repo, up.action);
    }

    /// Deletion forgets the branch's former head; a rebase moves tracking
    /// from the old head to the new one. Creation is counted only.
    #[instrument(skip_all, fields(repo = %up.repo, action = %up.action))]
    pub fn process_branch_update(&mut self, up: BranchUpdate) {
        match up.action {
            BranchAction::Deleted => {
                // The "after" SHA of a deletion push is all zeros.
                debug!(old_sha = %up.old_sha.short(), "Branch deleted, forgetting head");
                self.live.forget(&up.old_sha);
            }
            BranchAction::Rebased => {
                debug!(
                    old_sha = %up.old_sha.short(),
                    sha = %up.sha.short(),
                    "Branch updated, replacing live head"
                );
                self.live.forget(&up.old_sha);
                self.live.track(up.sha.clone(), up.timestamp);
            }
            BranchAction::Created => {}
        }

        self.publisher.register_branch_event(&up.repo, up.action);
    }

    /// Records CI start and build times from pending statuses, and
    /// validation and build durations from terminal ones.
    #[instrument(skip_all, fields(repo = %up.repo, sha = %up.sha.short(), context = %up.context, status = %up.status))]
    pub fn process_commit_update(&mut self, up: CommitUpdate) {
        self.publisher.register_status_check(&up.repo, up.status);

        let Some(state) = self.live.get_mut(&up.sha) else {
            warn!("Status for a SHA that is not live, skipping");
            return;
        };

        if up.status.is_terminal() {
            if self.matcher.accepts(&up.repo, &up.context) {
                let seconds = elapsed_seconds(state.created_at, up.timestamp);
                debug!(seconds, "Validation finished");
                self.publisher
                    .register_validation(&up.repo, up.status, seconds);
            }

            if !self.track_build_times {
                return;
            }

            let build_start = match state.build_starts.get(&up.context) {
                Some(start) => *start,
                None => {
                    // No pending seen for this context; the latest pending
                    // of any context is the best approximation.
                    self.publisher.register_missed_pending(&up.repo);
                    state.ci_start
                }
            };
            let seconds = elapsed_seconds(build_start, up.timestamp);
            debug!(seconds, "Build finished");
            self.publisher
                .register_build_done(&up.repo, &up.context, up.status, seconds);
        } else {
            if !state.check_seen {
                let seconds = elapsed_seconds(state.created_at, up.timestamp);
                debug!(seconds, "CI noticed commit");
                self.publisher.register_ci_noticed(&up.repo, seconds);
            }

            state.check_seen = true;
            state.ci_start = up.timestamp;

            if self.track_build_times {
                state.build_starts.insert(up.context, up.timestamp);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn elapsed_seconds_has_millisecond_resolution() {
        let start = crate::test_utils::at(0);
        assert_eq!(
            elapsed_seconds(start, start + Duration::milliseconds(1_500)),
            1.5
        );
        assert_eq!(elapsed_seconds(start, start), 0.0);
    }

    #[test]
    fn elapsed_seconds_can_be_negative() {
        let start = crate::test_utils::at(10);
        assert_eq!(elapsed_seconds(start, crate::test_utils::at(7)), -3.0);
    }
}
