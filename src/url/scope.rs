//! Allow/deny scope evaluation over absolute URLs

use crate::config::{RuleKind, ScopeRule};
use regex::Regex;

/// Compiled allow/deny rule set
///
/// Deny rules dominate: a URL matching any deny pattern is out of scope even
/// if an allow pattern also matches. An empty allow list admits everything
/// not denied.
#[derive(Debug, Clone, Default)]
pub struct ScopeEvaluator {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
}

impl ScopeEvaluator {
    /// Compiles the rules, skipping any pattern that is not a valid regex
    pub fn compile(rules: &[ScopeRule]) -> Self {
        let mut evaluator = Self::default();

        for rule in rules {
            let regex = match Regex::new(&rule.pattern) {
                Ok(regex) => regex,
                Err(e) => {
                    tracing::warn!("Skipping scope rule '{}': {}", rule.pattern, e);
                    continue;
                }
            };

            match rule.kind {
                RuleKind::Allow => evaluator.allow.push(regex),
                RuleKind::Deny => evaluator.deny.push(regex),
            }
        }

        evaluator
    }

    /// Decides whether a URL is in scope
    pub fn in_scope(&self, url: &str) -> bool {
        if self.deny.iter().any(|d| d.is_match(url)) {
            return false;
        }

        self.allow.is_empty() || self.allow.iter().any(|a| a.is_match(url))
    }

    /// Number of rules that survived compilation
    pub fn rule_count(&self) -> usize {
        self.allow.len() + self.deny.len()
    }
}
