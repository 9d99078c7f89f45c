//! Threshold-crossing escalation.
//!
//! Given a member's active points and the community's tiers, at most one tier
//! fires: the one with the highest threshold not above the points. Tiers are
//! re-sorted on every call so callers may pass them in any order.
//!
//! Kick and ban tiers message the member before removing them, since a
//! removed member usually cannot be reached any more. Timeouts notify after.

use crate::modlog::{sanction_embed, ModLogDispatcher};
use crate::notify::Notifier;
use chrono::{DateTime, Duration, Utc};
use mw_connectors::{ConnectorError, PlatformConnector};
use mw_core::db::ModerationConfigRepository;
use mw_core::{
    CommunityId, EscalationTier, Member, MemberId, ModerationConfig, TierAction, MAX_TIMEOUT_MS,
};
use mw_observability::{AuditOutcome, MetricsCollector, ModerationAuditEntry, ModerationAuditLog};
use mw_policy::{format_duration, resolve, TemplateContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use mw_observability::action_span;
use tracing::{info, instrument, warn, Instrument};

/// What an escalation check did.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EscalationOutcome {
    pub triggered: bool,
    pub tier_name: Option<String>,
    pub action: Option<TierAction>,
}

impl EscalationOutcome {
    pub fn not_triggered() -> Self {
        Self::default()
    }

    fn fired(tier: &EscalationTier) -> Self {
        Self {
            triggered: true,
            tier_name: Some(tier.name.clone()),
            action: Some(tier.action),
        }
    }
}

/// Selects the tier that fires for `points`, if any.
///
/// Ties on threshold keep their configured order.
pub fn select_tier(points: i64, tiers: &[EscalationTier]) -> Option<&EscalationTier> {
    let mut sorted: Vec<&EscalationTier> = tiers.iter().collect();
    sorted.sort_by(|a, b| b.threshold.cmp(&a.threshold));
    sorted.into_iter().find(|t| t.threshold <= points)
}

/// Suppresses repeated fires of one tier for one member inside a window.
///
/// Only consulted when the community sets `escalation_cooldown_secs`.
#[derive(Debug, Default)]
pub struct EscalationGuard {
    /// Claim expiry per (community, member, tier).
    claims: RwLock<HashMap<(CommunityId, MemberId, String), DateTime<Utc>>>,
}

impl EscalationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the tier for this member. Returns `false` if it already fired
    /// within `cooldown`.
    pub async fn try_acquire(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        tier: &str,
        cooldown: Duration,
    ) -> bool {
        let now = Utc::now();
        let mut claims = self.claims.write().await;
        claims.retain(|_, expires| *expires > now);

        let key = (community_id, member_id, tier.to_string());
        if claims.contains_key(&key) {
            return false;
        }
        let expires = now
            .checked_add_signed(cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        claims.insert(key, expires);
        true
    }

    /// Drops a claim, used when the sanction could not be applied.
    pub async fn release(&self, community_id: CommunityId, member_id: MemberId, tier: &str) {
        self.claims
            .write()
            .await
            .remove(&(community_id, member_id, tier.to_string()));
    }
}

/// Applies escalation sanctions.
pub struct EscalationService {
    platform: Arc<dyn PlatformConnector>,
    configs: Arc<dyn ModerationConfigRepository>,
    notifier: Arc<Notifier>,
    mod_log: Arc<ModLogDispatcher>,
    guard: EscalationGuard,
    audit: ModerationAuditLog,
    metrics: Arc<MetricsCollector>,
}

impl EscalationService {
    pub fn new(
        platform: Arc<dyn PlatformConnector>,
        configs: Arc<dyn ModerationConfigRepository>,
        notifier: Arc<Notifier>,
        mod_log: Arc<ModLogDispatcher>,
        audit: ModerationAuditLog,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            platform,
            configs,
            notifier,
            mod_log,
            guard: EscalationGuard::new(),
            audit,
            metrics,
        }
    }

    /// Fires the highest qualifying tier for `current_points`.
    ///
    /// A failed sanction yields `triggered: false`. Infractions that led here
    /// are never rolled back.
    #[instrument(skip(self, member, tiers), fields(member_id = member.id))]
    pub async fn check_and_escalate(
        &self,
        community_id: CommunityId,
        member: &Member,
        current_points: i64,
        tiers: &[EscalationTier],
    ) -> EscalationOutcome {
        let Some(tier) = select_tier(current_points, tiers) else {
            return EscalationOutcome::not_triggered();
        };

        let config = self.load_config(community_id).await;

        if let Some(cooldown) = config.escalation_cooldown() {
            if !self
                .guard
                .try_acquire(community_id, member.id, &tier.name, cooldown)
                .await
            {
                info!(tier = %tier.name, "Escalation suppressed by cooldown");
                return EscalationOutcome::not_triggered();
            }
        }

        let reason = format!(
            "Reached {} points (escalation tier {})",
            current_points, tier.name
        );
        let duration_ms = match tier.action {
            TierAction::Timeout => Some(
                tier.clamped_duration_ms()
                    .unwrap_or(config.default_mute_duration_ms)
                    .min(MAX_TIMEOUT_MS),
            ),
            _ => None,
        };

        let notified_before = match tier.action {
            TierAction::Kick | TierAction::Ban => Some(
                self.notify(&config, member, tier, current_points, duration_ms, &reason)
                    .await,
            ),
            TierAction::Timeout => None,
        };

        if let Err(e) = self
            .apply(&config, member.id, tier.action, duration_ms, &reason)
            .instrument(action_span!(tier.action, community_id, member.id))
            .await
        {
            warn!(tier = %tier.name, action = %tier.action, error = %e, "Escalation sanction failed");
            if notified_before == Some(true) {
                warn!(tier = %tier.name, "Member was notified of a removal that did not happen");
            }
            self.metrics
                .record_sanction(&tier.action.to_string(), false);
            self.audit
                .log(ModerationAuditEntry::new(
                    &tier.action.to_string(),
                    community_id,
                    member.id,
                    None,
                    &reason,
                    AuditOutcome::Failure(e.to_string()),
                ))
                .await;
            if config.escalation_cooldown_secs.is_some() {
                self.guard
                    .release(community_id, member.id, &tier.name)
                    .await;
            }
            return EscalationOutcome::not_triggered();
        }

        let notified = match notified_before {
            Some(notified) => notified,
            None => {
                self.notify(&config, member, tier, current_points, duration_ms, &reason)
                    .await
            }
        };
        info!(tier = %tier.name, action = %tier.action, points = current_points, notified, "Escalation tier fired");
        self.metrics.record_sanction(&tier.action.to_string(), true);
        self.metrics.record_escalation(&tier.name);
        self.audit
            .log(
                ModerationAuditEntry::new(
                    &tier.action.to_string(),
                    community_id,
                    member.id,
                    None,
                    &reason,
                    AuditOutcome::Success,
                )
                .with_details(serde_json::json!({
                    "tier": tier.name,
                    "points": current_points,
                    "duration_ms": duration_ms,
                    "notified": notified,
                })),
            )
            .await;

        let mut embed = sanction_embed(
            &tier.action.to_string(),
            member.id,
            member.display_name(),
            None,
            &reason,
        )
        .with_field("Tier", &tier.name, true)
        .with_field("Active points", &current_points.to_string(), true);
        if let Some(ms) = duration_ms {
            embed = embed.with_field("Duration", &format_duration(ms), true);
        }
        self.mod_log.send(&config, &embed).await;

        EscalationOutcome::fired(tier)
    }

    async fn apply(
        &self,
        config: &ModerationConfig,
        member_id: MemberId,
        action: TierAction,
        duration_ms: Option<u64>,
        reason: &str,
    ) -> Result<(), ConnectorError> {
        let community_id = config.community_id;
        match action {
            TierAction::Timeout => {
                let ms = duration_ms.unwrap_or(config.default_mute_duration_ms);
                self.platform
                    .timeout(community_id, member_id, ms, reason)
                    .await
            }
            TierAction::Kick => self.platform.kick(community_id, member_id, reason).await,
            TierAction::Ban => {
                self.platform
                    .ban(
                        community_id,
                        member_id,
                        config.ban_delete_message_seconds,
                        reason,
                    )
                    .await
            }
        }
    }

    async fn notify(
        &self,
        config: &ModerationConfig,
        member: &Member,
        tier: &EscalationTier,
        points: i64,
        duration_ms: Option<u64>,
        reason: &str,
    ) -> bool {
        let settings = resolve(None, tier.notification.as_ref(), &config.notification);
        let community = self
            .platform
            .community_name(config.community_id)
            .await
            .unwrap_or_else(|_| config.community_id.to_string());

        let mut ctx = TemplateContext::new(&tier.action.to_string(), reason, &community)
            .with_member(member.display_name())
            .with_total_points(points)
            .with_tier(&tier.name);
        if let Some(ms) = duration_ms {
            ctx = ctx.with_duration(ms);
        }
        self.notifier.notify(member.id, &settings, &ctx).await
    }

    async fn load_config(&self, community_id: CommunityId) -> ModerationConfig {
        match self.configs.get_or_create(community_id).await {
            Ok(config) => config,
            Err(e) => {
                warn!(community_id, error = %e, "Using default moderation config");
                ModerationConfig::new(community_id)
            }
        }
    }
}
