//! Metrics sink for the event processor.
//!
//! The processor reports every observation through the [`Publisher`] trait
//! and never reads anything back. [`GithubMetrics`] is the Prometheus-backed
//! implementation that the HTTP server exposes for scraping; tests use a
//! recording implementation instead.
//!
//! # Metric Families
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `github_pull_request_events_total` | Counter | `repository`, `event` |
//! | `github_branch_events_total` | Counter | `repository`, `event` |
//! | `github_status_checks_total` | Counter | `repository`, `state` |
//! | `github_ci_missed_pending` | Counter | `repository` |
//! | `github_ci_noticed_duration_seconds` | Histogram | `repository` |
//! | `github_pull_request_validated_duration_seconds` | Histogram | `repository`, `status` |
//! | `github_pull_request_merged_duration_seconds` | Histogram | `repository` |
//! | `github_ci_build_duration_seconds` | Histogram | `repository`, `build`, `status` |
//! | `build_info` | Gauge | `version`, `revision`, `branch` |

use std::sync::Arc;

use crate::events::{BranchAction, PrAction, StatusState};
use crate::types::RepoId;

mod build_info;
mod github;

pub use build_info::{BuildInfo, register_build_info};
pub use github::{GithubMetrics, MetricsError, MetricsResult, encode_text};

/// Receives one call per observation made by the processor.
///
/// Calls are fire-and-forget: nothing returned here influences processing.
/// Implementations own whatever synchronization their aggregation needs.
pub trait Publisher: Send + Sync + 'static {
    /// A recognized pull request event occurred.
    fn register_pr_event(&self, repo: &RepoId, action: PrAction);

    /// A branch was created, deleted or rebased.
    fn register_branch_event(&self, repo: &RepoId, action: BranchAction);

    /// A status check was received (tracked SHA or not).
    fn register_status_check(&self, repo: &RepoId, state: StatusState);

    /// A terminal status arrived for a context never seen pending.
    fn register_missed_pending(&self, repo: &RepoId);

    /// Seconds from the SHA going live to the first pending status.
    fn register_ci_noticed(&self, repo: &RepoId, seconds: f64);

    /// Seconds from the SHA going live to the validating check finishing.
    fn register_validation(&self, repo: &RepoId, status: StatusState, seconds: f64);

    /// Seconds from the SHA going live to the pull request merging.
    fn register_merge(&self, repo: &RepoId, seconds: f64);

    /// Seconds a single check (`build`) took from pending to terminal.
    fn register_build_done(&self, repo: &RepoId, build: &str, status: StatusState, seconds: f64);
}

impl<T: Publisher + ?Sized> Publisher for Arc<T> {
    fn register_pr_event(&self, repo: &RepoId, action: PrAction) {
        (**self).register_pr_event(repo, action)
    }

    fn register_branch_event(&self, repo: &RepoId, action: BranchAction) {
        (**self).register_branch_event(repo, action)
    }

    fn register_status_check(&self, repo: &RepoId, state: StatusState) {
        (**self).register_status_check(repo, state)
    }

    fn register_missed_pending(&self, repo: &RepoId) {
        (**self).register_missed_pending(repo)
    }

    fn register_ci_noticed(&self, repo: &RepoId, seconds: f64) {
        (**self).register_ci_noticed(repo, seconds)
    }

    fn register_validation(&self, repo: &RepoId, status: StatusState, seconds: f64) {
        (**self).register_validation(repo, status, seconds)
    }

    fn register_merge(&self, repo: &RepoId, seconds: f64) {
        (**self).register_merge(repo, seconds)
    }

    fn register_build_done(&self, repo: &RepoId, build: &str, status: StatusState, seconds: f64) {
        (**self).register_build_done(repo, build, status, seconds)
    }
}
