//! Automod rule definitions.

use crate::config::NotificationOverride;
use crate::events::EventKind;
use crate::member::CommunityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What part of an event a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    /// Full message text.
    MessageText,
    /// Emoji used inside a message.
    MessageEmoji,
    /// Sticker names attached to a message.
    Sticker,
    /// Links inside a message.
    Link,
    /// Member username.
    Username,
    /// Member nickname.
    Nickname,
    /// Emoji of an added reaction.
    ReactionEmoji,
}

impl RuleTarget {
    /// All targets, in a fixed order.
    pub const ALL: [RuleTarget; 7] = [
        RuleTarget::MessageText,
        RuleTarget::MessageEmoji,
        RuleTarget::Sticker,
        RuleTarget::Link,
        RuleTarget::Username,
        RuleTarget::Nickname,
        RuleTarget::ReactionEmoji,
    ];

    /// The event kind this target can be extracted from.
    pub fn event_kind(&self) -> EventKind {
        match self {
            RuleTarget::MessageText
            | RuleTarget::MessageEmoji
            | RuleTarget::Sticker
            | RuleTarget::Link => EventKind::Message,
            RuleTarget::Username | RuleTarget::Nickname => EventKind::MemberUpdate,
            RuleTarget::ReactionEmoji => EventKind::Reaction,
        }
    }

    pub fn applies_to(&self, kind: EventKind) -> bool {
        self.event_kind() == kind
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            RuleTarget::MessageText => "message_text",
            RuleTarget::MessageEmoji => "message_emoji",
            RuleTarget::Sticker => "sticker",
            RuleTarget::Link => "link",
            RuleTarget::Username => "username",
            RuleTarget::Nickname => "nickname",
            RuleTarget::ReactionEmoji => "reaction_emoji",
        }
    }
}

impl std::fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// How a rule's patterns combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// One matching pattern is enough.
    #[default]
    Any,
    /// Every pattern must match somewhere in the content.
    All,
}

/// Side effects a rule triggers when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Remove the offending message or reaction.
    DeleteContent,
    /// Add the rule's points to the member's ledger.
    RecordInfraction,
    /// Tell the member what happened.
    Notify,
}

/// A single regular expression with optional flags and a display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDef {
    /// Regular expression source.
    pub pattern: String,
    /// Flags such as "i" or "im".
    #[serde(default)]
    pub flags: Option<String>,
    /// Label shown in logs instead of the raw expression.
    #[serde(default)]
    pub label: Option<String>,
}

impl PatternDef {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            flags: None,
            label: None,
        }
    }

    pub fn with_flags(mut self, flags: &str) -> Self {
        self.flags = Some(flags.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Label if set, else the expression itself.
    pub fn display(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.pattern)
    }
}

/// A content rule evaluated against inbound events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier.
    pub id: Uuid,
    /// Community this rule belongs to.
    pub community_id: CommunityId,
    /// Rule name, recorded on infractions.
    pub name: String,
    /// Whether this rule is enabled.
    pub enabled: bool,
    /// Priority (higher = evaluated first).
    pub priority: i32,
    /// Targets, evaluated in declaration order.
    pub targets: Vec<RuleTarget>,
    /// Patterns to test.
    pub patterns: Vec<PatternDef>,
    /// How patterns combine.
    pub match_mode: MatchMode,
    /// Points added per violation.
    pub points: i64,
    /// Side effects on match.
    pub actions: Vec<RuleAction>,
    /// Per-rule notification override.
    #[serde(default)]
    pub notification: Option<NotificationOverride>,
    /// When the rule was created.
    pub created_at: DateTime<Utc>,
    /// When the rule was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Creates an enabled "any" rule that deletes, records and notifies.
    pub fn new(
        community_id: CommunityId,
        name: &str,
        targets: Vec<RuleTarget>,
        patterns: Vec<PatternDef>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            community_id,
            name: name.to_string(),
            enabled: true,
            priority: 0,
            targets,
            patterns,
            match_mode: MatchMode::Any,
            points: 1,
            actions: vec![
                RuleAction::DeleteContent,
                RuleAction::RecordInfraction,
                RuleAction::Notify,
            ],
            notification: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_points(mut self, points: i64) -> Self {
        self.points = points;
        self
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn with_actions(mut self, actions: Vec<RuleAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_notification(mut self, notification: NotificationOverride) -> Self {
        self.notification = Some(notification);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn has_action(&self, action: RuleAction) -> bool {
        self.actions.contains(&action)
    }

    /// Targets applicable to the given event kind, in declaration order.
    pub fn targets_for(&self, kind: EventKind) -> impl Iterator<Item = RuleTarget> + '_ {
        self.targets.iter().copied().filter(move |t| t.applies_to(kind))
    }

    /// Whether any declared target applies to the event kind.
    pub fn applies_to(&self, kind: EventKind) -> bool {
        self.targets.iter().any(|t| t.applies_to(kind))
    }
}

/// Partial update for a rule.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
    pub targets: Option<Vec<RuleTarget>>,
    pub patterns: Option<Vec<PatternDef>>,
    pub match_mode: Option<MatchMode>,
    pub points: Option<i64>,
    pub actions: Option<Vec<RuleAction>>,
    pub notification: Option<Option<NotificationOverride>>,
}

impl RuleUpdate {
    /// Applies the update to a rule in place.
    pub fn apply(&self, rule: &mut Rule) {
        if let Some(name) = &self.name {
            rule.name = name.clone();
        }
        if let Some(enabled) = self.enabled {
            rule.enabled = enabled;
        }
        if let Some(priority) = self.priority {
            rule.priority = priority;
        }
        if let Some(targets) = &self.targets {
            rule.targets = targets.clone();
        }
        if let Some(patterns) = &self.patterns {
            rule.patterns = patterns.clone();
        }
        if let Some(mode) = self.match_mode {
            rule.match_mode = mode;
        }
        if let Some(points) = self.points {
            rule.points = points;
        }
        if let Some(actions) = &self.actions {
            rule.actions = actions.clone();
        }
        if let Some(notification) = &self.notification {
            rule.notification = notification.clone();
        }
        rule.updated_at = Utc::now();
    }
}
