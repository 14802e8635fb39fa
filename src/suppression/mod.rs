//! Suppression of known-benign errors.
//!
//! The wallet-pairing relay emits internally-recoverable errors during
//! normal session teardown. This module holds the pattern rules that
//! identify those errors, the engine that evaluates them, and (in the
//! submodules) the activator that rewires platform reporting channels and
//! the best-effort patcher for libraries that throw before any logging path
//! is reached.

pub mod activator;
pub mod patcher;

pub use activator::{CrashHook, LogSink, SuppressionStats, Suppressor, SuppressorConfig};
pub use patcher::{GuardedValidator, SessionValidator, ValidatorRegistry, PATCHABLE_METHODS};

use serde::{Deserialize, Serialize};

use crate::error::RawError;

/// How disruptive a suppressed error would have been if shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    /// Pure noise.
    Low,
    /// Noise that may hint at degraded pairing health.
    Medium,
    /// Suppressed only because it is known to self-heal.
    High,
}

/// A pattern-based predicate identifying a known-benign error.
///
/// A rule matches when at least one message pattern is a substring of the
/// lower-cased message AND, if stack patterns are present, at least one of
/// them is a substring of the lower-cased stack. Rules are immutable once
/// added.
#[derive(Clone, Debug, PartialEq)]
pub struct SuppressionRule {
    message_patterns: Vec<String>,
    stack_patterns: Option<Vec<String>>,
    description: String,
    severity: RuleSeverity,
}

impl SuppressionRule {
    /// Creates a rule that matches on message content alone.
    ///
    /// Patterns are stored lower-cased; matching is case-insensitive
    /// substring containment.
    pub fn new(
        message_patterns: impl IntoIterator<Item = impl Into<String>>,
        description: impl Into<String>,
        severity: RuleSeverity,
    ) -> Self {
        Self {
            message_patterns: message_patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
            stack_patterns: None,
            description: description.into(),
            severity,
        }
    }

    /// Restricts the rule to errors whose stack also matches one of the
    /// given patterns.
    pub fn with_stack_patterns(
        mut self,
        stack_patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.stack_patterns = Some(
            stack_patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        );
        self
    }

    /// Returns the rule's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the rule's severity.
    pub fn severity(&self) -> RuleSeverity {
        self.severity
    }

    /// Evaluates the rule against a pre-lowered message and stack.
    fn matches_lowered(&self, message: &str, stack: Option<&str>) -> bool {
        let message_hit = self.message_patterns.iter().any(|p| message.contains(p));
        if !message_hit {
            return false;
        }
        match &self.stack_patterns {
            None => true,
            Some(patterns) => match stack {
                Some(stack) => patterns.iter().any(|p| stack.contains(p)),
                None => false,
            },
        }
    }
}

/// An append-only, ordered sequence of suppression rules.
///
/// Rules are evaluated in insertion order and the engine short-circuits on
/// the first full match. There is no removal operation: suppression policy
/// only grows more permissive within a session, never silently stops
/// suppressing something a caller explicitly added.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<SuppressionRule>,
}

impl RuleSet {
    /// Creates a rule set pre-populated with the default pairing-teardown
    /// rules.
    pub fn new() -> Self {
        Self {
            rules: Self::default_rules(),
        }
    }

    /// Creates an empty rule set.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Creates a rule set from explicit rules.
    pub fn with_rules(rules: Vec<SuppressionRule>) -> Self {
        Self { rules }
    }

    /// The built-in rules covering the pairing relay's teardown noise.
    fn default_rules() -> Vec<SuppressionRule> {
        vec![
            SuppressionRule::new(
                ["no matching key"],
                "Pairing keychain lookup after session teardown",
                RuleSeverity::Low,
            ),
            SuppressionRule::new(
                [
                    "session or pairing topic doesn't exist",
                    "session topic doesn't exist",
                    "pairing topic doesn't exist",
                ],
                "Topic already deleted by the remote peer",
                RuleSeverity::Low,
            ),
            SuppressionRule::new(
                ["invalid session topic", "invalid pairing topic"],
                "Stale topic referenced during disconnect",
                RuleSeverity::Low,
            ),
            SuppressionRule::new(
                ["expirer: expired"],
                "Expirer fired for an already-dropped record",
                RuleSeverity::Low,
            ),
            SuppressionRule::new(
                ["missing or invalid. record:"],
                "History record pruned before the response arrived",
                RuleSeverity::Low,
            ),
            SuppressionRule::new(
                ["missing or invalid"],
                "Validation failure inside the pairing library's own cleanup",
                RuleSeverity::Medium,
            )
            .with_stack_patterns(["isvalidsessionorpairingtopic", "isvaliddisconnect"]),
        ]
    }

    /// Appends a rule at the end of the scan order.
    pub fn add_rule(&mut self, rule: SuppressionRule) {
        self.rules.push(rule);
    }

    /// Returns the number of rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Returns all rules in scan order.
    pub fn rules(&self) -> &[SuppressionRule] {
        &self.rules
    }

    /// Returns true when any rule fully matches the error.
    ///
    /// The message and stack are lowered once and the scan short-circuits on
    /// the first match; callers needing the matching rule for diagnostics
    /// must use [`RuleSet::matching_rule`].
    pub fn matches(&self, raw: &RawError) -> bool {
        let message = raw.message.to_lowercase();
        let stack = raw.stack.as_ref().map(|s| s.to_lowercase());
        self.rules
            .iter()
            .any(|r| r.matches_lowered(&message, stack.as_deref()))
    }

    /// Re-scans and returns the first matching rule, for diagnostics.
    pub fn matching_rule(&self, raw: &RawError) -> Option<&SuppressionRule> {
        let message = raw.message.to_lowercase();
        let stack = raw.stack.as_ref().map(|s| s.to_lowercase());
        self.rules
            .iter()
            .find(|r| r.matches_lowered(&message, stack.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_only_rule_ignores_stack() {
        let rule = SuppressionRule::new(["no matching key"], "test", RuleSeverity::Low);
        let rules = RuleSet::with_rules(vec![rule]);

        let without_stack = RawError::new("No Matching Key. session: abc");
        let with_stack = RawError::new("No Matching Key. session: abc")
            .with_stack("at somewhereCompletelyUnrelated");

        assert!(rules.matches(&without_stack));
        assert!(rules.matches(&with_stack));
    }

    #[test]
    fn test_stack_rule_requires_stack_hit() {
        let rule = SuppressionRule::new(["missing or invalid"], "test", RuleSeverity::Medium)
            .with_stack_patterns(["isvaliddisconnect"]);
        let rules = RuleSet::with_rules(vec![rule]);

        let no_stack = RawError::new("Missing or invalid. Record: 123");
        let wrong_stack =
            RawError::new("Missing or invalid. Record: 123").with_stack("at somewhereElse");
        let right_stack = RawError::new("Missing or invalid. Record: 123")
            .with_stack("at isValidDisconnect (core.js:88)");

        assert!(!rules.matches(&no_stack));
        assert!(!rules.matches(&wrong_stack));
        assert!(rules.matches(&right_stack));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let rules = RuleSet::new();
        assert!(rules.matches(&RawError::new("NO MATCHING KEY. SESSION: X")));
        assert!(rules.matches(&RawError::new("no matching key. session: x")));
    }

    #[test]
    fn test_default_rules_against_teardown_corpus() {
        let rules = RuleSet::new();
        let corpus = [
            (
                "No matching key. session or pairing topic doesn't exist: abc123",
                true,
            ),
            ("User rejected transaction", false),
            ("No matching key. session: def456", true),
            ("Network connection failed", false),
            ("session or pairing topic doesn't exist", true),
            ("Invalid session topic", true),
        ];

        let suppressed = corpus
            .iter()
            .filter(|(msg, _)| rules.matches(&RawError::new(*msg)))
            .count();
        assert_eq!(suppressed, 4);

        for (msg, expected) in corpus {
            assert_eq!(
                rules.matches(&RawError::new(msg)),
                expected,
                "msg: {}",
                msg
            );
        }
    }

    #[test]
    fn test_add_rule_appends_and_counts() {
        let mut rules = RuleSet::empty();
        assert_eq!(rules.rule_count(), 0);
        assert!(!rules.matches(&RawError::new("socket teardown race")));

        rules.add_rule(SuppressionRule::new(
            ["socket teardown race"],
            "added at runtime",
            RuleSeverity::Low,
        ));
        assert_eq!(rules.rule_count(), 1);
        assert!(rules.matches(&RawError::new("Socket Teardown Race in relay")));
    }

    #[test]
    fn test_first_match_wins_in_insertion_order() {
        let mut rules = RuleSet::empty();
        rules.add_rule(SuppressionRule::new(["shared"], "first", RuleSeverity::Low));
        rules.add_rule(SuppressionRule::new(
            ["shared"],
            "second",
            RuleSeverity::High,
        ));

        let hit = rules
            .matching_rule(&RawError::new("a shared pattern"))
            .unwrap();
        assert_eq!(hit.description(), "first");
        assert_eq!(hit.severity(), RuleSeverity::Low);
    }

    #[test]
    fn test_matching_rule_returns_none_on_no_match() {
        let rules = RuleSet::new();
        assert!(rules
            .matching_rule(&RawError::new("a perfectly ordinary error"))
            .is_none());
    }

    #[test]
    fn test_empty_message_never_matches_defaults() {
        let rules = RuleSet::new();
        assert!(!rules.matches(&RawError::new("")));
    }
}
