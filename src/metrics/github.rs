//! Prometheus implementation of [`Publisher`].

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    exponential_buckets,
};
use thiserror::Error;

use super::Publisher;
use crate::events::{BranchAction, PrAction, StatusState};
use crate::types::RepoId;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Failed to build or register a metric with Prometheus.
    #[error("failed to register metric: {0}")]
    RegistrationFailed(#[from] prometheus::Error),

    /// Failed to encode metrics output.
    #[error("failed to encode metrics: {0}")]
    EncodingFailed(String),
}

/// Result type for metrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// GitHub CI latency metrics.
///
/// All metrics use interior mutability; the struct is cheap to clone and
/// safe to share between the processor task and the scrape handler.
#[derive(Clone)]
pub struct GithubMetrics {
    /// Pull request events, by `repository` and `event`.
    pr_events: CounterVec,

    /// Branch creations, deletions and rebases, by `repository` and `event`.
    branch_events: CounterVec,

    /// Status checks received, by `repository` and `state`.
    status_checks: CounterVec,

    /// Terminal statuses without a preceding pending, by `repository`.
    missed_pendings: CounterVec,

    /// PR opened until the first pending status.
    ci_noticed_duration: HistogramVec,

    /// PR opened until the required check finished, by terminal `status`.
    pr_validated_duration: HistogramVec,

    /// PR opened until merged.
    pr_merged_duration: HistogramVec,

    /// Single check pending until terminal, by `build` and `status`.
    build_duration: HistogramVec,
}

impl GithubMetrics {
    /// Creates the metrics and registers them with the given registry.
    ///
    /// # Errors
    ///
    /// Returns an error if any metric fails to register (e.g., duplicate name).
    pub fn new(registry: &Registry) -> MetricsResult<Self> {
        let pr_events = CounterVec::new(
            Opts::new(
                "github_pull_request_events_total",
                "The number of Pull Request events",
            ),
            &["repository", "event"],
        )?;
        registry.register(Box::new(pr_events.clone()))?;

        let branch_events = CounterVec::new(
            Opts::new(
                "github_branch_events_total",
                "The number branch creations, rebases, and deletions",
            ),
            &["repository", "event"],
        )?;
        registry.register(Box::new(branch_events.clone()))?;

        let status_checks = CounterVec::new(
            Opts::new("github_status_checks_total", "The number of status checks"),
            &["repository", "state"],
        )?;
        registry.register(Box::new(status_checks.clone()))?;

        let missed_pendings = CounterVec::new(
            Opts::new(
                "github_ci_missed_pending",
                "The number of times there was a success/failure/error without corresponding pending status",
            ),
            &["repository"],
        )?;
        registry.register(Box::new(missed_pendings.clone()))?;

        // 1s up to 8192s (~2h15)
        let ci_noticed_duration = HistogramVec::new(
            HistogramOpts::new(
                "github_ci_noticed_duration_seconds",
                "The time it takes for a CI to send the first 'pending' status check, measured from opening the PR",
            )
            .buckets(exponential_buckets(1.0, 2.0, 14)?),
            &["repository"],
        )?;
        registry.register(Box::new(ci_noticed_duration.clone()))?;

        let pr_validated_duration = HistogramVec::new(
            HistogramOpts::new(
                "github_pull_request_validated_duration_seconds",
                "The time it takes for a CI to build a PR, measured from opening the PR until the required status check is finished, per status",
            )
            .buckets(exponential_buckets(1.0, 2.0, 14)?),
            &["repository", "status"],
        )?;
        registry.register(Box::new(pr_validated_duration.clone()))?;

        // 1min up to ~5.7 days
        let pr_merged_duration = HistogramVec::new(
            HistogramOpts::new(
                "github_pull_request_merged_duration_seconds",
                "The time it takes for a PR to be merged, measured from opening the PR",
            )
            .buckets(exponential_buckets(60.0, 2.0, 14)?),
            &["repository"],
        )?;
        registry.register(Box::new(pr_merged_duration.clone()))?;

        // 1s up to 512s
        let build_duration = HistogramVec::new(
            HistogramOpts::new("github_ci_build_duration_seconds", "The time it takes for a build")
                .buckets(exponential_buckets(1.0, 2.0, 10)?),
            &["repository", "build", "status"],
        )?;
        registry.register(Box::new(build_duration.clone()))?;

        Ok(Self {
            pr_events,
            branch_events,
            status_checks,
            missed_pendings,
            ci_noticed_duration,
            pr_validated_duration,
            pr_merged_duration,
            build_duration,
        })
    }
}

impl Publisher for GithubMetrics {
    fn register_pr_event(&self, repo: &RepoId, action: PrAction) {
        self.pr_events
            .with_label_values(&[&repo.full_name(), action.as_str()])
            .inc();
    }

    fn register_branch_event(&self, repo: &RepoId, action: BranchAction) {
        self.branch_events
            .with_label_values(&[&repo.full_name(), action.as_str()])
            .inc();
    }

    fn register_status_check(&self, repo: &RepoId, state: StatusState) {
        self.status_checks
            .with_label_values(&[&repo.full_name(), state.as_str()])
            .inc();
    }

    fn register_missed_pending(&self, repo: &RepoId) {
        self.missed_pendings
            .with_label_values(&[&repo.full_name()])
            .inc();
    }

    fn register_ci_noticed(&self, repo: &RepoId, seconds: f64) {
        self.ci_noticed_duration
            .with_label_values(&[&repo.full_name()])
            .observe(seconds);
    }

    fn register_validation(&self, repo: &RepoId, status: StatusState, seconds: f64) {
        self.pr_validated_duration
            .with_label_values(&[&repo.full_name(), status.as_str()])
            .observe(seconds);
    }

    fn register_merge(&self, repo: &RepoId, seconds: f64) {
        self.pr_merged_duration
            .with_label_values(&[&repo.full_name()])
            .observe(seconds);
    }

    fn register_build_done(&self, repo: &RepoId, build: &str, status: StatusState, seconds: f64) {
        self.build_duration
            .with_label_values(&[&repo.full_name(), build, status.as_str()])
            .observe(seconds);
    }
}

/// Encodes every metric in the registry in Prometheus text format.
pub fn encode_text(registry: &Registry) -> MetricsResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| MetricsError::EncodingFailed(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::EncodingFailed(e.to_string()))
}
