//! Rule evaluation engine.
//!
//! Selects at most one rule for an event. Rules are evaluated by descending
//! priority; equal priorities keep their configured order. The first target
//! of the first rule that matches wins. Evaluation has no side effects.

use crate::extract::extract;
use crate::patterns::{test_patterns, validate_pattern, CompiledPattern};
use mw_core::{InboundEvent, PatternDef, Rule, RuleTarget, ValidationError};
use serde::Serialize;
use tracing::{debug, instrument};

/// A rule whose patterns have been compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    patterns: Vec<CompiledPattern>,
}

impl CompiledRule {
    pub fn compile(rule: Rule) -> Self {
        let patterns = rule.patterns.iter().map(CompiledPattern::compile).collect();
        Self { rule, patterns }
    }

    /// Tests this rule's applicable targets against the event in declaration order.
    pub fn evaluate(&self, event: &InboundEvent) -> Option<RuleMatch> {
        for target in self.rule.targets_for(event.kind()) {
            let content = extract(event, target);
            if let Some(hit) = test_patterns(&self.patterns, &content, self.rule.match_mode) {
                return Some(RuleMatch {
                    rule: self.rule.clone(),
                    target,
                    content,
                    pattern: hit.pattern,
                    matched_text: hit.matched_text,
                });
            }
        }
        None
    }
}

/// The single rule selected for an event.
#[derive(Debug, Clone, Serialize)]
pub struct RuleMatch {
    pub rule: Rule,
    /// Target whose content matched.
    pub target: RuleTarget,
    /// Full extracted content of that target.
    pub content: String,
    /// Pattern that satisfied the rule.
    pub pattern: PatternDef,
    /// Text the pattern matched.
    pub matched_text: String,
}

/// Evaluates events against a community's rules.
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    /// Compiles `rules` and orders them by descending priority. The sort is
    /// stable, so equal priorities keep the order given.
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut rules: Vec<CompiledRule> = rules.into_iter().map(CompiledRule::compile).collect();
        rules.sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority));
        Self { rules }
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|r| &r.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the first matching enabled rule, or `None`.
    #[instrument(skip(self, event), fields(kind = ?event.kind(), community_id = event.community_id()))]
    pub fn evaluate(&self, event: &InboundEvent) -> Option<RuleMatch> {
        let kind = event.kind();
        let result = self
            .rules
            .iter()
            .filter(|r| r.rule.enabled && r.rule.applies_to(kind))
            .find_map(|r| r.evaluate(event));

        match &result {
            Some(m) => debug!(rule = %m.rule.name, target = %m.target, "Rule matched"),
            None => debug!("No rule matched"),
        }
        result
    }
}

/// Evaluates an event against a rule list without keeping the compiled engine.
pub fn evaluate(event: &InboundEvent, rules: &[Rule]) -> Option<RuleMatch> {
    RuleEngine::new(rules.to_vec()).evaluate(event)
}

/// Checks a rule before it is saved.
pub fn validate_rule(rule: &Rule) -> Result<(), ValidationError> {
    let invalid = |message: &str| ValidationError::InvalidRule {
        rule: rule.name.clone(),
        message: message.to_string(),
    };

    if rule.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if rule.targets.is_empty() {
        return Err(invalid("at least one target is required"));
    }
    if rule.patterns.is_empty() {
        return Err(invalid("at least one pattern is required"));
    }
    if rule.points <= 0 {
        return Err(ValidationError::NonPositivePoints(rule.points));
    }
    for pattern in &rule.patterns {
        validate_pattern(pattern)?;
    }
    Ok(())
}
