//! YAML rule file loader.
//!
//! A rule file carries one community's moderation settings, escalation tiers
//! and automod rules:
//!
//! ```yaml
//! community_id: 1234
//! settings:
//!   decay_enabled: true
//!   decay_days: 30
//!   log_channel_id: 42
//! tiers:
//!   - name: T1
//!     threshold: 5
//!     action: timeout
//!     duration_ms: 600000
//! rules:
//!   - name: R1
//!     targets: [message_text]
//!     patterns:
//!       - pattern: "badword"
//!         flags: i
//!     points: 5
//! ```
//!
//! `${VAR}` references are substituted from the environment before parsing,
//! and every rule and tier is validated before the file is returned.

use crate::engine::validate_rule;
use mw_core::{
    ChannelId, CommunityId, EscalationTier, MatchMode, ModerationConfig, MuteMode,
    NotificationOverride, NotificationSettings, PatternDef, RoleId, Rule, RuleAction, RuleTarget,
    ValidationError,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use thiserror::Error;

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid regex for env vars")
});

/// Errors that can occur while loading a rule file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read rule file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML rule file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Duplicate rule name: {0}")]
    DuplicateRule(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

/// Top-level rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    /// Community the file configures.
    pub community_id: CommunityId,
    /// Community-wide settings.
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Escalation tiers, in any order.
    #[serde(default)]
    pub tiers: Vec<EscalationTier>,
    /// Automod rules, in configured order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Community settings section. Omitted fields take the defaults of a new community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_true")]
    pub automod_enabled: bool,
    #[serde(default)]
    pub decay_enabled: bool,
    #[serde(default = "default_decay_days")]
    pub decay_days: u32,
    #[serde(default)]
    pub notification: NotificationSettings,
    #[serde(default)]
    pub immune_roles: Vec<RoleId>,
    #[serde(default)]
    pub log_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub mute_mode: MuteMode,
    #[serde(default = "default_mute_duration_ms")]
    pub default_mute_duration_ms: u64,
    #[serde(default)]
    pub ban_delete_message_seconds: u32,
    #[serde(default)]
    pub escalation_cooldown_secs: Option<u64>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            automod_enabled: true,
            decay_enabled: false,
            decay_days: default_decay_days(),
            notification: NotificationSettings::default(),
            immune_roles: Vec::new(),
            log_channel_id: None,
            mute_mode: MuteMode::default(),
            default_mute_duration_ms: default_mute_duration_ms(),
            ban_delete_message_seconds: 0,
            escalation_cooldown_secs: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_decay_days() -> u32 {
    30
}

fn default_mute_duration_ms() -> u64 {
    mw_core::DEFAULT_MUTE_DURATION_MS
}

fn default_points() -> i64 {
    1
}

fn default_actions() -> Vec<RuleAction> {
    vec![
        RuleAction::DeleteContent,
        RuleAction::RecordInfraction,
        RuleAction::Notify,
    ]
}

/// One rule as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    pub targets: Vec<RuleTarget>,
    pub patterns: Vec<PatternDef>,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default = "default_points")]
    pub points: i64,
    #[serde(default = "default_actions")]
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub notification: Option<NotificationOverride>,
}

impl RuleConfig {
    /// Converts to a domain rule for the given community.
    pub fn to_rule(&self, community_id: CommunityId) -> Rule {
        let mut rule = Rule::new(
            community_id,
            &self.name,
            self.targets.clone(),
            self.patterns.clone(),
        )
        .with_priority(self.priority)
        .with_points(self.points)
        .with_mode(self.match_mode)
        .with_actions(self.actions.clone());
        rule.enabled = self.enabled;
        rule.notification = self.notification.clone();
        rule
    }
}

impl RuleFile {
    /// Builds the community configuration described by this file.
    pub fn to_moderation_config(&self) -> ModerationConfig {
        let s = &self.settings;
        let mut config = ModerationConfig::new(self.community_id).with_tiers(self.tiers.clone());
        config.automod_enabled = s.automod_enabled;
        config.decay_enabled = s.decay_enabled;
        config.decay_days = s.decay_days;
        config.notification = s.notification.clone();
        config.immune_roles = s.immune_roles.clone();
        config.log_channel_id = s.log_channel_id;
        config.mute_mode = s.mute_mode;
        config.default_mute_duration_ms = s.default_mute_duration_ms;
        config.ban_delete_message_seconds = s.ban_delete_message_seconds;
        config.escalation_cooldown_secs = s.escalation_cooldown_secs;
        config
    }

    /// Builds the rules in configured order.
    pub fn to_rules(&self) -> Vec<Rule> {
        self.rules
            .iter()
            .map(|r| r.to_rule(self.community_id))
            .collect()
    }
}

/// Substitutes environment variables in a string.
///
/// Replaces patterns like `${VAR_NAME}` with the corresponding environment variable value.
fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut missing = Vec::new();

    let result = ENV_VAR_PATTERN.replace_all(input, |caps: &regex::Captures| {
        match env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => {
                missing.push(caps[1].to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }

    Ok(result.into_owned())
}

/// Parses and validates a rule file from a YAML string.
pub fn parse_rule_file(content: &str) -> Result<RuleFile, ConfigError> {
    let content = substitute_env_vars(content)?;
    let file: RuleFile = serde_yaml::from_str(&content)?;
    validate_rule_file(&file)?;
    Ok(file)
}

/// Loads and validates a rule file.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use mw_policy::config::load_rule_file;
///
/// let file = load_rule_file(Path::new("config/rules.yaml")).unwrap();
/// let rules = file.to_rules();
/// ```
pub fn load_rule_file(path: &Path) -> Result<RuleFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_rule_file(&content)
}

/// Validates every rule and tier, and the settings they produce.
pub fn validate_rule_file(file: &RuleFile) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for rule in file.to_rules() {
        validate_rule(&rule)?;
        if !names.insert(rule.name.clone()) {
            return Err(ConfigError::DuplicateRule(rule.name));
        }
    }

    file.to_moderation_config().validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_core::TierAction;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_yaml() -> &'static str {
        r#"
community_id: 1234
settings:
  decay_enabled: true
  decay_days: 14
  immune_roles: [77]
  log_channel_id: 42
  mute_mode:
    mode: role
    role_id: 555
  escalation_cooldown_secs: 30
  notification:
    mode: direct_message
    template: "You got a {action}: {reason}"
tiers:
  - name: T1
    threshold: 5
    action: timeout
    duration_ms: 600000
  - name: Kick
    threshold: 25
    action: kick
rules:
  - name: R1
    priority: 10
    targets: [message_text, link]
    patterns:
      - pattern: "bad(word)?"
        flags: i
        label: profanity
    points: 5
  - name: invites
    targets: [link]
    patterns:
      - pattern: "discord\\.gg/"
    actions: [delete_content]
    notification:
      enabled: false
"#
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(create_valid_yaml().as_bytes()).unwrap();

        let loaded = load_rule_file(file.path()).unwrap();
        assert_eq!(loaded.community_id, 1234);
        assert_eq!(loaded.rules.len(), 2);

        let rules = loaded.to_rules();
        assert_eq!(rules[0].name, "R1");
        assert_eq!(rules[0].priority, 10);
        assert_eq!(rules[0].points, 5);
        assert_eq!(rules[0].actions.len(), 3);
        assert_eq!(rules[1].actions, vec![RuleAction::DeleteContent]);
        assert_eq!(rules[1].points, 1);
        assert_eq!(
            rules[1].notification.as_ref().and_then(|n| n.enabled),
            Some(false)
        );

        let config = loaded.to_moderation_config();
        assert!(config.decay_enabled);
        assert_eq!(config.decay_days, 14);
        assert_eq!(config.mute_mode, MuteMode::Role { role_id: 555 });
        assert_eq!(config.log_channel_id, Some(42));
        assert_eq!(config.escalation_cooldown_secs, Some(30));
        assert_eq!(config.tiers.len(), 2);
        assert_eq!(config.tiers[1].action, TierAction::Kick);
    }

    #[test]
    fn test_missing_file() {
        let result = load_rule_file(Path::new("/nonexistent/path/rules.yaml"));
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = parse_rule_file("community_id: [");
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let yaml = r#"
community_id: 1
rules:
  - name: broken
    targets: [message_text]
    patterns:
      - pattern: "[invalid(regex"
"#;
        assert!(matches!(
            parse_rule_file(yaml).unwrap_err(),
            ConfigError::Validation(ValidationError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let yaml = r#"
community_id: 1
rules:
  - name: flags
    targets: [message_text]
    patterns:
      - pattern: "x"
        flags: "iz"
"#;
        assert!(matches!(
            parse_rule_file(yaml).unwrap_err(),
            ConfigError::Validation(ValidationError::InvalidFlag { flag: 'z', .. })
        ));
    }

    #[test]
    fn test_invalid_tier_rejected() {
        let yaml = r#"
community_id: 1
tiers:
  - name: T1
    threshold: 5
    action: timeout
"#;
        assert!(matches!(
            parse_rule_file(yaml).unwrap_err(),
            ConfigError::Validation(ValidationError::InvalidTier { .. })
        ));
    }

    #[test]
    fn test_oversized_settings_rejected() {
        for settings in [
            "decay_enabled: true\n  decay_days: 4000000000",
            "escalation_cooldown_secs: 10000000000000",
        ] {
            let yaml = format!("community_id: 1\nsettings:\n  {}\n", settings);
            assert!(matches!(
                parse_rule_file(&yaml).unwrap_err(),
                ConfigError::Validation(ValidationError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let yaml = r#"
community_id: 1
rules:
  - name: same
    targets: [message_text]
    patterns: [{pattern: a}]
  - name: same
    targets: [message_text]
    patterns: [{pattern: b}]
"#;
        assert!(matches!(
            parse_rule_file(yaml).unwrap_err(),
            ConfigError::DuplicateRule(name) if name == "same"
        ));
    }

    #[test]
    fn test_non_positive_points_rejected() {
        let yaml = r#"
community_id: 1
rules:
  - name: zero
    targets: [message_text]
    patterns: [{pattern: a}]
    points: 0
"#;
        assert!(matches!(
            parse_rule_file(yaml).unwrap_err(),
            ConfigError::Validation(ValidationError::NonPositivePoints(0))
        ));
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("MW_TEST_LOG_CHANNEL", "9001");
        let yaml = r#"
community_id: 1
settings:
  log_channel_id: ${MW_TEST_LOG_CHANNEL}
"#;
        let file = parse_rule_file(yaml).unwrap();
        assert_eq!(file.settings.log_channel_id, Some(9001));
        env::remove_var("MW_TEST_LOG_CHANNEL");
    }

    #[test]
    fn test_missing_env_var() {
        let yaml = "community_id: ${MW_TEST_DOES_NOT_EXIST}\n";
        assert!(matches!(
            parse_rule_file(yaml).unwrap_err(),
            ConfigError::EnvVarNotFound(name) if name == "MW_TEST_DOES_NOT_EXIST"
        ));
    }
}
