//! Service configuration.
//!
//! Every setting is a command-line flag with a `CI_LATENCY_*` environment
//! fallback (see [`Args`]). Context rules for the aggregate timing strategy
//! come from indexed variable pairs instead, since their number is open:
//!
//! ```text
//! CI_LATENCY_STRATEGY_AGGREGATE_REPO_REGEX_1=^acme/
//! CI_LATENCY_STRATEGY_AGGREGATE_CONTEXT_REGEX_1=^ci/circleci: all-jobs$
//! CI_LATENCY_STRATEGY_AGGREGATE_REPO_REGEX_2=.*
//! CI_LATENCY_STRATEGY_AGGREGATE_CONTEXT_REGEX_2=:all-jobs$
//! ```
//!
//! Rules are ordered by index. With no pairs set, the built-in rule
//! (`.*`, `:all-jobs$`) applies.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::num::NonZeroUsize;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use regex::Regex;
use thiserror::Error;

use crate::matcher::{ContextRule, ContextRules};
use crate::server::{HEALTH_PATH, RoutePaths};
use crate::webhooks::WebhookSecret;

/// Prefix of the indexed repository pattern variables.
pub const REPO_REGEX_PREFIX: &str = "CI_LATENCY_STRATEGY_AGGREGATE_REPO_REGEX_";
/// Prefix of the indexed context pattern variables.
pub const CONTEXT_REGEX_PREFIX: &str = "CI_LATENCY_STRATEGY_AGGREGATE_CONTEXT_REGEX_";

/// Errors that can occur while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not decode the webhook secret token from CI_LATENCY_WEBHOOK_TOKEN: {0}")]
    InvalidToken(#[from] base64::DecodeError),

    #[error("environment variable '{var}' does not end with a non-negative integer")]
    BadRuleIndex { var: String },

    #[error("context rule index {index} is defined more than once")]
    DuplicateRuleIndex { index: u64 },

    #[error("variable '{var}' empty or unset")]
    MissingContextRegex { var: String },

    #[error("could not compile the regex passed via {var}: {source}")]
    InvalidRegex {
        var: String,
        #[source]
        source: regex::Error,
    },

    #[error("endpoint path '{path}' is used more than once")]
    PathConflict { path: String },
}

/// How PR validation time is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimingStrategy {
    /// Validation ends when a designated aggregate status context finishes.
    Aggregate,
}

impl fmt::Display for TimingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingStrategy::Aggregate => f.write_str("aggregate"),
        }
    }
}

/// GitHub CI latency exporter
#[derive(Parser, Debug, Clone)]
#[command(name = "ci-latency")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Host to listen on
    #[arg(long, env = "CI_LATENCY_HOST", default_value = "localhost")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "CI_LATENCY_PORT", default_value_t = 1701)]
    pub port: u16,

    /// Path GitHub delivers webhooks to (empty for the root)
    #[arg(long, env = "CI_LATENCY_WEBHOOK_PATH", default_value = "")]
    pub webhook_path: String,

    /// Base64-encoded webhook secret; empty disables signature checks
    #[arg(
        long,
        env = "CI_LATENCY_WEBHOOK_TOKEN",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub webhook_token: String,

    /// Path Prometheus scrapes
    #[arg(long, env = "CI_LATENCY_METRICS_PATH", default_value = "metrics")]
    pub metrics_path: String,

    /// Record per-context build durations (accepts 1/0, t/f, true/false, yes/no, on/off)
    #[arg(
        long,
        env = "CI_LATENCY_TRACK_BUILD_TIMES",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub track_build_times: bool,

    /// PR timing strategy
    #[arg(
        long,
        env = "CI_LATENCY_PR_TIMING_STRATEGY",
        value_enum,
        default_value_t = TimingStrategy::Aggregate
    )]
    pub strategy: TimingStrategy,

    /// Capacity of the update queue in front of the event processor
    #[arg(long, env = "CI_LATENCY_QUEUE_CAPACITY", default_value = "100")]
    pub queue_capacity: NonZeroUsize,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub paths: RoutePaths,
    pub webhook_secret: WebhookSecret,
    pub track_build_times: bool,
    pub strategy: TimingStrategy,
    pub queue_capacity: NonZeroUsize,
    pub context_rules: ContextRules,
}

impl Config {
    /// Resolves parsed arguments and the environment `vars` (for context
    /// rules) into a configuration.
    pub fn from_args<I, K, V>(args: Args, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let webhook_secret = WebhookSecret::new(BASE64.decode(args.webhook_token.trim())?);

        let paths = RoutePaths::new(&args.webhook_path, &args.metrics_path);
        check_paths(&paths)?;

        let context_rules = match args.strategy {
            TimingStrategy::Aggregate => discover_context_rules(vars)?,
        };

        Ok(Config {
            host: args.host,
            port: args.port,
            paths,
            webhook_secret,
            track_build_times: args.track_build_times,
            strategy: args.strategy,
            queue_capacity: args.queue_capacity,
            context_rules,
        })
    }

    /// Parses the command line and process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(Args::parse(), std::env::vars())
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn check_paths(paths: &RoutePaths) -> Result<(), ConfigError> {
    let conflict = if paths.webhook == paths.metrics || paths.webhook == HEALTH_PATH {
        Some(&paths.webhook)
    } else if paths.metrics == HEALTH_PATH {
        Some(&paths.metrics)
    } else {
        None
    };
    match conflict {
        Some(path) => Err(ConfigError::PathConflict { path: path.clone() }),
        None => Ok(()),
    }
}

/// Builds the aggregate strategy's context rules from indexed variables.
///
/// Every `CI_LATENCY_STRATEGY_AGGREGATE_REPO_REGEX_<n>` needs a non-empty
/// `CI_LATENCY_STRATEGY_AGGREGATE_CONTEXT_REGEX_<n>`. Unrelated variables
/// are ignored. Returns the built-in rules if no pair is present.
pub fn discover_context_rules<I, K, V>(vars: I) -> Result<ContextRules, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let vars: HashMap<String, String> = vars
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();

    let mut indexed: BTreeMap<u64, (&str, &str)> = BTreeMap::new();
    for (name, repo_pattern) in &vars {
        let Some(suffix) = name.strip_prefix(REPO_REGEX_PREFIX) else {
            continue;
        };
        let index: u64 = suffix
            .parse()
            .map_err(|_| ConfigError::BadRuleIndex { var: name.clone() })?;

        let context_var = format!("{CONTEXT_REGEX_PREFIX}{index}");
        let context_pattern = vars
            .get(&context_var)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingContextRegex { var: context_var })?;

        if indexed
            .insert(index, (repo_pattern.as_str(), context_pattern.as_str()))
            .is_some()
        {
            return Err(ConfigError::DuplicateRuleIndex { index });
        }
    }

    if indexed.is_empty() {
        return Ok(ContextRules::default_rules());
    }

    let rules = indexed
        .into_iter()
        .map(|(index, (repo, context))| {
            Ok(ContextRule::new(
                compile(repo, format!("{REPO_REGEX_PREFIX}{index}"))?,
                compile(context, format!("{CONTEXT_REGEX_PREFIX}{index}"))?,
            ))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;
    Ok(ContextRules::new(rules))
}

fn compile(pattern: &str, var: String) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex { var, source })
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ci-latency is starting with the following configuration:")?;
        writeln!(f, "  Host:            {}", self.host)?;
        writeln!(f, "  Port:            {}", self.port)?;
        writeln!(f, "  MetricsPath:     {}", self.paths.metrics)?;
        writeln!(f, "  WebhookPath:     {}", self.paths.webhook)?;
        if self.webhook_secret.is_empty() {
            writeln!(f, "  WebhookToken:    <empty>")?;
        } else {
            let prefix: String = String::from_utf8_lossy(self.webhook_secret.as_bytes())
                .chars()
                .take(4)
                .flat_map(char::escape_default)
                .collect();
            writeln!(f, "  WebhookToken:    {prefix}...")?;
        }
        writeln!(f, "  TrackBuildTimes: {}", self.track_build_times)?;
        writeln!(f, "  QueueCapacity:   {}", self.queue_capacity)?;
        writeln!(f, "  Strategy:        {}", self.strategy)?;
        write!(f, "  Aggregate Strategy configuration:")?;
        for rule in self.context_rules.rules() {
            write!(
                f,
                "\n   - repo:    {}\n     context: {}",
                rule.repo, rule.context
            )?;
        }
        Ok(())
    }
}
