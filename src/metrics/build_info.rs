//! Build information, logged at startup and exported as `build_info`.

use std::fmt;

use prometheus::{IntGaugeVec, Opts, Registry};

use super::MetricsResult;

/// Version and source revision this binary was built from.
///
/// `revision` and `branch` are read from `CI_LATENCY_REVISION` and
/// `CI_LATENCY_BRANCH` at compile time, and are `unknown` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub revision: &'static str,
    pub branch: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        BuildInfo {
            version: env!("CARGO_PKG_VERSION"),
            revision: option_env!("CI_LATENCY_REVISION").unwrap_or("unknown"),
            branch: option_env!("CI_LATENCY_BRANCH").unwrap_or("unknown"),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(version={}, branch={}, revision={})",
            self.version, self.branch, self.revision
        )
    }
}

/// Registers a constant `build_info` gauge set to 1.
pub fn register_build_info(registry: &Registry, info: &BuildInfo) -> MetricsResult<()> {
    let gauge = IntGaugeVec::new(
        Opts::new(
            "build_info",
            "A metric with a constant '1' value labeled by version, revision, and branch from which ci-latency was built.",
        ),
        &["version", "revision", "branch"],
    )?;
    registry.register(Box::new(gauge.clone()))?;
    gauge
        .with_label_values(&[info.version, info.revision, info.branch])
        .set(1);
    Ok(())
}
