//! Context matching for PR validation time.
//!
//! Validation latency is only meaningful for the check that gates merging
//! (the "required" or aggregate status of a repository). A [`ContextMatcher`]
//! decides, per repository and status context, whether a terminal status is
//! that check.
//!
//! [`ContextRules`] is the configured implementation: an ordered list of
//! `(repository regex, context regex)` pairs. The first rule whose repository
//! pattern matches decides the answer, even if its context pattern does not
//! match and a later rule's would.

use regex::Regex;

use crate::types::RepoId;

/// Decides whether a status context is the one that validates a PR.
pub trait ContextMatcher: Send + 'static {
    fn accepts(&self, repo: &RepoId, context: &str) -> bool;
}

impl<F> ContextMatcher for F
where
    F: Fn(&RepoId, &str) -> bool + Send + 'static,
{
    fn accepts(&self, repo: &RepoId, context: &str) -> bool {
        self(repo, context)
    }
}

/// One `(repository, context)` pattern pair.
#[derive(Debug, Clone)]
pub struct ContextRule {
    pub repo: Regex,
    pub context: Regex,
}

impl ContextRule {
    pub fn new(repo: Regex, context: Regex) -> Self {
        ContextRule { repo, context }
    }
}

/// Ordered rule list, evaluated first-match-wins.
#[derive(Debug, Clone, Default)]
pub struct ContextRules {
    rules: Vec<ContextRule>,
}

/// Repository pattern of the built-in rule.
pub const DEFAULT_REPO_PATTERN: &str = ".*";
/// Context pattern of the built-in rule.
pub const DEFAULT_CONTEXT_PATTERN: &str = ":all-jobs$";

impl ContextRules {
    pub fn new(rules: Vec<ContextRule>) -> Self {
        ContextRules { rules }
    }

    /// Compiles rules from pattern pairs, preserving order.
    pub fn compile<'a, I>(pairs: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let rules = pairs
            .into_iter()
            .map(|(repo, context)| Ok(ContextRule::new(Regex::new(repo)?, Regex::new(context)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(ContextRules { rules })
    }

    /// The built-in rule set: every repository, contexts ending in `:all-jobs`.
    pub fn default_rules() -> Self {
        ContextRules::new(vec![ContextRule::new(
            Regex::new(DEFAULT_REPO_PATTERN).expect("default repository pattern compiles"),
            Regex::new(DEFAULT_CONTEXT_PATTERN).expect("default context pattern compiles"),
        )])
    }

    pub fn rules(&self) -> &[ContextRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

impl ContextMatcher for ContextRules {
    fn accepts(&self, repo: &RepoId, context: &str) -> bool {
        let full_name = repo.full_name();
        self.rules
            .iter()
            .find(|rule| rule.repo.is_match(&full_name))
            .is_some_and(|rule| rule.context.is_match(context))
    }
}
