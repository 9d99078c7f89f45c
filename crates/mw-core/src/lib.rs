//! # mw-core
//!
//! Core data models, persistence and the infraction ledger for Mod Warden.
//!
//! This crate defines the moderation domain (rules, infractions, escalation
//! tiers, per-community configuration, inbound platform events) together with
//! the repository traits the rest of the workspace persists through.

pub mod config;
pub mod db;
pub mod events;
pub mod infraction;
pub mod ledger;
pub mod member;
pub mod rule;
pub mod validation;

pub use config::{
    EscalationTier, ModerationConfig, MuteMode, NotificationMode, NotificationOverride,
    NotificationSettings, TierAction, DEFAULT_MUTE_DURATION_MS, MAX_DECAY_DAYS,
    MAX_ESCALATION_COOLDOWN_SECS, MAX_TIMEOUT_MS,
};
pub use events::{EventKind, InboundEvent, ReactionEmoji, Sticker};
pub use infraction::{Infraction, InfractionSource, NewInfraction};
pub use ledger::{InfractionLedger, InfractionPage, LedgerError};
pub use member::{ChannelId, CommunityId, Member, MemberId, MessageId, RoleId, RoleRef};
pub use rule::{MatchMode, PatternDef, Rule, RuleAction, RuleTarget, RuleUpdate};
pub use validation::ValidationError;
