//! Rule file validation.
//!
//! Hard errors come from the loader: malformed YAML, invalid patterns, bad
//! tiers or duplicate rule names. On top of that this module reports settings
//! that load fine but probably do not behave the way the author expects.

use colored::Colorize;
use mw_core::{MuteMode, NotificationMode, RuleAction, TierAction, MAX_TIMEOUT_MS};
use mw_policy::{load_rule_file, RuleFile, PLACEHOLDERS};
use std::collections::HashMap;
use std::path::Path;

/// Result of rule file validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Problems that stop the file from loading.
    pub errors: Vec<String>,
    /// Settings that load but are likely mistakes.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Rule File Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Rule File Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Rule file OK", "✓".green());
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "valid": !self.has_errors(),
            "errors": self.errors,
            "warnings": self.warnings,
        })
    }
}

/// Validates rule files.
pub struct RuleFileValidator;

impl RuleFileValidator {
    /// Loads the file and checks it. A file that fails to load yields one error.
    pub fn validate_path(path: &Path) -> (Option<RuleFile>, ValidationResult) {
        match load_rule_file(path) {
            Ok(file) => {
                let result = Self::validate(&file);
                (Some(file), result)
            }
            Err(e) => {
                let mut result = ValidationResult::new();
                result.add_error(format!("{}: {}", path.display(), e));
                (None, result)
            }
        }
    }

    /// Checks a loaded file for likely mistakes.
    pub fn validate(file: &RuleFile) -> ValidationResult {
        let mut result = ValidationResult::new();
        let settings = &file.settings;

        if !settings.automod_enabled {
            result.add_warning("Automod is disabled; rules will not be evaluated");
        }

        if file.rules.is_empty() {
            result.add_warning("No rules defined");
        }

        if settings.log_channel_id.is_none() {
            result.add_warning(
                "No log_channel_id set; audit-log entries are dropped unless a logging collaborator is connected",
            );
        }

        if let MuteMode::Role { role_id } = settings.mute_mode {
            if settings.immune_roles.contains(&role_id) {
                result.add_warning(format!(
                    "Mute role {} is also an immune role; muted members would bypass automod",
                    role_id
                ));
            }
        }

        Self::check_tiers(file, &mut result);
        Self::check_rules(file, &mut result);
        Self::check_templates(file, &mut result);

        result
    }

    fn check_tiers(file: &RuleFile, result: &mut ValidationResult) {
        let mut thresholds: HashMap<i64, &str> = HashMap::new();
        for tier in &file.tiers {
            if let Some(first) = thresholds.insert(tier.threshold, tier.name.as_str()) {
                result.add_warning(format!(
                    "Tiers '{}' and '{}' share threshold {}; only '{}' will fire",
                    first, tier.name, tier.threshold, first
                ));
                thresholds.insert(tier.threshold, first);
            }
            if tier.action == TierAction::Timeout
                && tier.duration_ms.is_some_and(|d| d > MAX_TIMEOUT_MS)
            {
                result.add_warning(format!(
                    "Tier '{}' timeout exceeds the platform maximum and will be clamped to 28 days",
                    tier.name
                ));
            }
        }

        let records = file
            .rules
            .iter()
            .any(|r| r.actions.contains(&RuleAction::RecordInfraction));
        if records && file.tiers.is_empty() {
            result.add_warning(
                "Rules record infractions but no escalation tiers are defined; points never trigger a sanction",
            );
        }
    }

    fn check_rules(file: &RuleFile, result: &mut ValidationResult) {
        let notifications_off = file.settings.notification.mode == NotificationMode::Disabled;

        for rule in &file.rules {
            if !rule.enabled {
                continue;
            }
            if rule.actions.is_empty() {
                result.add_warning(format!(
                    "Rule '{}' has no actions; matches are only logged",
                    rule.name
                ));
            }
            let overridden_on = rule
                .notification
                .as_ref()
                .and_then(|n| n.enabled)
                .unwrap_or(false);
            if rule.actions.contains(&RuleAction::Notify) && notifications_off && !overridden_on {
                result.add_warning(format!(
                    "Rule '{}' asks to notify but notifications are disabled for the community",
                    rule.name
                ));
            }
        }

        let mut by_priority: HashMap<i32, Vec<&str>> = HashMap::new();
        for rule in file.rules.iter().filter(|r| r.enabled) {
            by_priority.entry(rule.priority).or_default().push(rule.name.as_str());
        }
        let mut ties: Vec<_> = by_priority
            .into_iter()
            .filter(|(_, names)| names.len() > 1)
            .collect();
        ties.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));
        for (priority, names) in ties {
            result.add_warning(format!(
                "Rules {} share priority {}; file order decides which matches first",
                names.join(", "),
                priority
            ));
        }
    }

    fn check_templates(file: &RuleFile, result: &mut ValidationResult) {
        let mut templates: Vec<(String, &str)> = Vec::new();
        if let Some(t) = &file.settings.notification.template {
            templates.push(("settings.notification".to_string(), t.as_str()));
        }
        for rule in &file.rules {
            if let Some(t) = rule.notification.as_ref().and_then(|n| n.template.as_deref()) {
                templates.push((format!("rule '{}'", rule.name), t));
            }
        }
        for tier in &file.tiers {
            if let Some(t) = tier.notification.as_ref().and_then(|n| n.template.as_deref()) {
                templates.push((format!("tier '{}'", tier.name), t));
            }
        }

        for (owner, template) in templates {
            for key in unknown_placeholders(template) {
                result.add_warning(format!(
                    "Template of {} uses unknown placeholder {{{}}}; it will be sent literally",
                    owner, key
                ));
            }
        }
    }
}

/// Placeholder names in a template that `render` does not substitute.
fn unknown_placeholders(template: &str) -> Vec<&str> {
    let mut unknown = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else { break };
        let key = &after[..end];
        if !PLACEHOLDERS.contains(&key) {
            unknown.push(key);
        }
        rest = &after[end + 1..];
    }
    unknown
}
