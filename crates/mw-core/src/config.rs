//! Per-community moderation configuration and escalation tiers.

use crate::member::{ChannelId, CommunityId, RoleId};
use crate::validation::ValidationError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Longest native timeout the platform accepts (28 days).
pub const MAX_TIMEOUT_MS: u64 = 28 * 24 * 60 * 60 * 1000;

/// Mute length used when a moderator does not give one (1 hour).
pub const DEFAULT_MUTE_DURATION_MS: u64 = 60 * 60 * 1000;

/// Longest accepted infraction decay window (100 years).
pub const MAX_DECAY_DAYS: u32 = 36_500;

/// Longest accepted escalation cooldown (100 years).
pub const MAX_ESCALATION_COOLDOWN_SECS: u64 = MAX_DECAY_DAYS as u64 * 24 * 60 * 60;

/// Sanction applied by an escalation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierAction {
    Timeout,
    Kick,
    Ban,
}

impl std::fmt::Display for TierAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TierAction::Timeout => write!(f, "timeout"),
            TierAction::Kick => write!(f, "kick"),
            TierAction::Ban => write!(f, "ban"),
        }
    }
}

/// Whether and how members are told about moderation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    /// Send a direct message to the member.
    #[default]
    DirectMessage,
    /// Do not notify.
    Disabled,
}

/// Community-wide notification defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub mode: NotificationMode,
    /// Message template; see `mw_policy::templates` for placeholders.
    #[serde(default)]
    pub template: Option<String>,
    /// Send an embed instead of plain text.
    #[serde(default)]
    pub use_embed: bool,
}

/// Override of the community notification defaults, set on a rule or tier.
/// Unset fields fall through to the next level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationOverride {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub use_embed: Option<bool>,
}

/// How the executor mutes members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MuteMode {
    /// Native platform timeout, capped at `MAX_TIMEOUT_MS`.
    #[default]
    Timeout,
    /// Assign a configured mute role; supports indefinite mutes.
    Role { role_id: RoleId },
}

/// A point threshold mapped to an automatic sanction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationTier {
    /// Tier name, shown in logs and results.
    pub name: String,
    /// Active points at which this tier fires.
    pub threshold: i64,
    /// Sanction to apply.
    pub action: TierAction,
    /// Timeout length in milliseconds (timeout tiers only).
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Per-tier notification override.
    #[serde(default)]
    pub notification: Option<NotificationOverride>,
}

impl EscalationTier {
    pub fn new(name: &str, threshold: i64, action: TierAction) -> Self {
        Self {
            name: name.to_string(),
            threshold,
            action,
            duration_ms: None,
            notification: None,
        }
    }

    /// Creates a timeout tier.
    pub fn timeout(name: &str, threshold: i64, duration_ms: u64) -> Self {
        Self::new(name, threshold, TierAction::Timeout).with_duration(duration_ms)
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_notification(mut self, notification: NotificationOverride) -> Self {
        self.notification = Some(notification);
        self
    }

    /// Timeout length clamped to the platform maximum.
    pub fn clamped_duration_ms(&self) -> Option<u64> {
        self.duration_ms.map(|d| d.min(MAX_TIMEOUT_MS))
    }

    /// Validates the tier before it is persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidTier {
                tier: self.name.clone(),
                message: "name must not be empty".to_string(),
            });
        }
        if self.threshold <= 0 {
            return Err(ValidationError::InvalidTier {
                tier: self.name.clone(),
                message: format!("threshold must be positive, got {}", self.threshold),
            });
        }
        match (self.action, self.duration_ms) {
            (TierAction::Timeout, None) | (TierAction::Timeout, Some(0)) => {
                Err(ValidationError::InvalidTier {
                    tier: self.name.clone(),
                    message: "timeout tiers require a duration".to_string(),
                })
            }
            (TierAction::Kick | TierAction::Ban, Some(_)) => Err(ValidationError::InvalidTier {
                tier: self.name.clone(),
                message: format!("duration is only valid for timeout, not {}", self.action),
            }),
            _ => Ok(()),
        }
    }
}

/// Moderation settings for one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Community these settings belong to.
    pub community_id: CommunityId,
    /// Master switch for automod.
    #[serde(default = "default_true")]
    pub automod_enabled: bool,
    /// Whether infractions expire.
    #[serde(default)]
    pub decay_enabled: bool,
    /// Age in days after which infractions stop counting.
    #[serde(default = "default_decay_days")]
    pub decay_days: u32,
    /// Notification defaults.
    #[serde(default)]
    pub notification: NotificationSettings,
    /// Roles exempt from automod.
    #[serde(default)]
    pub immune_roles: Vec<RoleId>,
    /// Escalation tiers, in any order.
    #[serde(default)]
    pub tiers: Vec<EscalationTier>,
    /// Channel used when the logging collaborator does not deliver.
    #[serde(default)]
    pub log_channel_id: Option<ChannelId>,
    /// How manual mutes are applied.
    #[serde(default)]
    pub mute_mode: MuteMode,
    /// Mute length when the moderator gives none.
    #[serde(default = "default_mute_duration_ms")]
    pub default_mute_duration_ms: u64,
    /// Seconds of message history deleted on ban.
    #[serde(default)]
    pub ban_delete_message_seconds: u32,
    /// Suppress repeated firing of the same tier for a member within this many
    /// seconds. `None` fires every time a tier qualifies.
    #[serde(default)]
    pub escalation_cooldown_secs: Option<u64>,
    /// When the settings were last changed.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_decay_days() -> u32 {
    30
}

fn default_mute_duration_ms() -> u64 {
    DEFAULT_MUTE_DURATION_MS
}

impl ModerationConfig {
    /// Default settings for a community that has never been configured.
    pub fn new(community_id: CommunityId) -> Self {
        Self {
            community_id,
            automod_enabled: true,
            decay_enabled: false,
            decay_days: default_decay_days(),
            notification: NotificationSettings::default(),
            immune_roles: Vec::new(),
            tiers: Vec::new(),
            log_channel_id: None,
            mute_mode: MuteMode::default(),
            default_mute_duration_ms: DEFAULT_MUTE_DURATION_MS,
            ban_delete_message_seconds: 0,
            escalation_cooldown_secs: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_tiers(mut self, tiers: Vec<EscalationTier>) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_decay(mut self, days: u32) -> Self {
        self.decay_enabled = true;
        self.decay_days = days;
        self
    }

    pub fn with_log_channel(mut self, channel_id: ChannelId) -> Self {
        self.log_channel_id = Some(channel_id);
        self
    }

    /// Cutoff before which infractions no longer count, if decay is on.
    ///
    /// A window reaching past the earliest representable time counts every
    /// infraction.
    pub fn decay_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.decay_enabled {
            return None;
        }
        let cutoff = TimeDelta::try_days(i64::from(self.decay_days))
            .and_then(|window| now.checked_sub_signed(window));
        Some(cutoff.unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    /// Escalation cooldown as a signed window, capped at
    /// `MAX_ESCALATION_COOLDOWN_SECS`.
    pub fn escalation_cooldown(&self) -> Option<TimeDelta> {
        self.escalation_cooldown_secs.map(|secs| {
            let secs = i64::try_from(secs.min(MAX_ESCALATION_COOLDOWN_SECS)).unwrap_or(i64::MAX);
            TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX)
        })
    }

    /// Validates the whole config before it is persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.decay_enabled && self.decay_days == 0 {
            return Err(ValidationError::InvalidConfig(
                "decay_days must be at least 1 when decay is enabled".to_string(),
            ));
        }
        if self.decay_days > MAX_DECAY_DAYS {
            return Err(ValidationError::InvalidConfig(format!(
                "decay_days must be at most {}",
                MAX_DECAY_DAYS
            )));
        }
        if self
            .escalation_cooldown_secs
            .is_some_and(|secs| secs > MAX_ESCALATION_COOLDOWN_SECS)
        {
            return Err(ValidationError::InvalidConfig(format!(
                "escalation_cooldown_secs must be at most {}",
                MAX_ESCALATION_COOLDOWN_SECS
            )));
        }
        if self.default_mute_duration_ms == 0 {
            return Err(ValidationError::InvalidConfig(
                "default_mute_duration_ms must be positive".to_string(),
            ));
        }
        for tier in &self.tiers {
            tier.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_tier_requires_duration() {
        let tier = EscalationTier::new("t", 5, TierAction::Timeout);
        assert!(matches!(
            tier.validate(),
            Err(ValidationError::InvalidTier { .. })
        ));

        let tier = EscalationTier::timeout("t", 5, 60_000);
        assert!(tier.validate().is_ok());
    }

    #[test]
    fn test_kick_tier_rejects_duration() {
        let tier = EscalationTier::new("k", 10, TierAction::Kick).with_duration(1000);
        assert!(tier.validate().is_err());
    }

    #[test]
    fn test_tier_rejects_non_positive_threshold() {
        let tier = EscalationTier::new("b", 0, TierAction::Ban);
        assert!(tier.validate().is_err());
    }

    #[test]
    fn test_duration_clamped_to_platform_max() {
        let tier = EscalationTier::timeout("long", 1, MAX_TIMEOUT_MS * 2);
        assert_eq!(tier.clamped_duration_ms(), Some(MAX_TIMEOUT_MS));
    }

    #[test]
    fn test_decay_cutoff() {
        let now = Utc::now();
        let config = ModerationConfig::new(1);
        assert!(config.decay_cutoff(now).is_none());

        let config = config.with_decay(7);
        assert_eq!(config.decay_cutoff(now), Some(now - chrono::Duration::days(7)));
    }

    #[test]
    fn test_oversized_windows_are_rejected() {
        assert!(ModerationConfig::new(1).with_decay(MAX_DECAY_DAYS).validate().is_ok());
        assert!(matches!(
            ModerationConfig::new(1).with_decay(4_000_000_000).validate(),
            Err(ValidationError::InvalidConfig(_))
        ));

        let mut config = ModerationConfig::new(1);
        config.escalation_cooldown_secs = Some(MAX_ESCALATION_COOLDOWN_SECS);
        assert!(config.validate().is_ok());
        config.escalation_cooldown_secs = Some(10_000_000_000_000);
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_oversized_windows_do_not_overflow() {
        let now = Utc::now();
        let config = ModerationConfig::new(1).with_decay(u32::MAX);
        assert_eq!(config.decay_cutoff(now), Some(DateTime::<Utc>::MIN_UTC));

        let mut config = ModerationConfig::new(1);
        config.escalation_cooldown_secs = Some(u64::MAX);
        let cooldown = config.escalation_cooldown().unwrap();
        assert_eq!(cooldown.num_seconds(), MAX_ESCALATION_COOLDOWN_SECS as i64);
        assert!(now.checked_add_signed(cooldown).is_some());

        config.escalation_cooldown_secs = Some(30);
        assert_eq!(config.escalation_cooldown(), Some(TimeDelta::seconds(30)));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ModerationConfig =
            serde_json::from_value(serde_json::json!({"community_id": 5})).unwrap();
        assert!(config.automod_enabled);
        assert!(!config.decay_enabled);
        assert_eq!(config.mute_mode, MuteMode::Timeout);
        assert!(config.escalation_cooldown_secs.is_none());
    }
}
