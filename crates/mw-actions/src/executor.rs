//! Guarded manual sanctions.
//!
//! Every action follows the same shape: resolve the target, check the role
//! hierarchy, call the platform once, then notify the member and post an
//! audit-log entry. Kick and ban notify just before the platform call, while
//! the member can still be reached, and only report `notified` once the
//! removal succeeded. Notification and logging are best effort and only set
//! the `notified` / `logged` flags; a platform failure becomes
//! `success: false` and is never retried.

use crate::escalate::{EscalationOutcome, EscalationService};
use crate::modlog::{sanction_embed, ModLogDispatcher};
use crate::notify::Notifier;
use mw_connectors::{ConnectorError, PlatformConnector};
use mw_core::db::ModerationConfigRepository;
use mw_core::{
    CommunityId, InfractionLedger, LedgerError, Member, MemberId, ModerationConfig, MuteMode,
    NewInfraction, ValidationError, MAX_TIMEOUT_MS,
};
use mw_observability::{AuditOutcome, MetricsCollector, ModerationAuditEntry, ModerationAuditLog};
use mw_policy::{format_duration, resolve, TemplateContext};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use mw_observability::action_span;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Errors that make a manual action fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Member {0} is not in this community")]
    NotAMember(MemberId),

    #[error("Insufficient permissions: {0}")]
    Permission(String),

    #[error("Platform error: {0}")]
    Platform(#[from] ConnectorError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ActionError {
    /// Whether the message is meant for the invoking moderator. Other errors
    /// should be reported generically.
    pub fn is_user_visible(&self) -> bool {
        match self {
            ActionError::NotAMember(_) | ActionError::Permission(_) | ActionError::Validation(_) => {
                true
            }
            ActionError::Platform(e) => matches!(
                e,
                ConnectorError::PermissionDenied(_) | ConnectorError::NotFound(_)
            ),
            ActionError::Storage(_) => false,
        }
    }
}

impl From<LedgerError> for ActionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(e) => ActionError::Validation(e),
            LedgerError::Storage(e) => ActionError::Storage(e.to_string()),
        }
    }
}

/// Manual sanction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModAction {
    Ban,
    Kick,
    Mute,
    Unmute,
    Warn,
    Unban,
}

impl ModAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModAction::Ban => "ban",
            ModAction::Kick => "kick",
            ModAction::Mute => "mute",
            ModAction::Unmute => "unmute",
            ModAction::Warn => "warn",
            ModAction::Unban => "unban",
        }
    }
}

impl std::fmt::Display for ModAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A staff-issued action request.
#[derive(Debug, Clone)]
pub struct ModerationRequest {
    pub community_id: CommunityId,
    pub target_id: MemberId,
    /// Invoking moderator. `None` when issued by the system itself.
    pub moderator: Option<Member>,
    pub reason: String,
}

impl ModerationRequest {
    pub fn new(community_id: CommunityId, target_id: MemberId, reason: &str) -> Self {
        Self {
            community_id,
            target_id,
            moderator: None,
            reason: reason.to_string(),
        }
    }

    pub fn by(mut self, moderator: Member) -> Self {
        self.moderator = Some(moderator);
        self
    }

    fn moderator_id(&self) -> Option<MemberId> {
        self.moderator.as_ref().map(|m| m.id)
    }
}

/// Outcome of a manual action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub action: ModAction,
    pub community_id: CommunityId,
    pub target_id: MemberId,
    pub success: bool,
    pub error: Option<ActionError>,
    pub notified: bool,
    pub logged: bool,
    /// Applied mute length; `None` for indefinite role mutes.
    pub duration_ms: Option<u64>,
    /// Warn only: the stored infraction.
    pub infraction_id: Option<Uuid>,
    /// Warn only: active points after recording.
    pub total_points: Option<i64>,
    /// Warn only: what escalation did.
    pub escalation: Option<EscalationOutcome>,
}

impl ActionResult {
    fn new(action: ModAction, request: &ModerationRequest) -> Self {
        Self {
            action,
            community_id: request.community_id,
            target_id: request.target_id,
            success: false,
            error: None,
            notified: false,
            logged: false,
            duration_ms: None,
            infraction_id: None,
            total_points: None,
            escalation: None,
        }
    }

    fn failed(mut self, error: ActionError) -> Self {
        self.success = false;
        self.error = Some(error);
        self
    }
}

/// Executes manual sanctions with hierarchy checks.
pub struct ActionExecutor {
    platform: Arc<dyn PlatformConnector>,
    configs: Arc<dyn ModerationConfigRepository>,
    ledger: Arc<InfractionLedger>,
    escalation: Arc<EscalationService>,
    notifier: Arc<Notifier>,
    mod_log: Arc<ModLogDispatcher>,
    audit: ModerationAuditLog,
    metrics: Arc<MetricsCollector>,
}

impl ActionExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn PlatformConnector>,
        configs: Arc<dyn ModerationConfigRepository>,
        ledger: Arc<InfractionLedger>,
        escalation: Arc<EscalationService>,
        notifier: Arc<Notifier>,
        mod_log: Arc<ModLogDispatcher>,
        audit: ModerationAuditLog,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            platform,
            configs,
            ledger,
            escalation,
            notifier,
            mod_log,
            audit,
            metrics,
        }
    }

    /// Bans a user. The hierarchy is only checked while the target is still a
    /// member. `delete_message_seconds` defaults to the community setting.
    pub async fn ban(
        &self,
        request: &ModerationRequest,
        delete_message_seconds: Option<u32>,
    ) -> ActionResult {
        let span = action_span!(ModAction::Ban, request.community_id, request.target_id);
        async move {
            let mut result = ActionResult::new(ModAction::Ban, request);
            let config = self.load_config(request.community_id).await;

            let target = match self.lookup(request).await {
                Ok(target) => target,
                Err(e) => return self.finish_failed(request, result, e).await,
            };
            if let Some(member) = &target {
                if let Err(e) = self.check_hierarchy(request, member).await {
                    return self.finish_failed(request, result, e).await;
                }
            }

            let name = display_name(target.as_ref(), request.target_id);
            let ctx = self.template_context(&config, ModAction::Ban, request, &name).await;
            let notified = self.notify(&config, request.target_id, &ctx).await;

            let delete_seconds =
                delete_message_seconds.unwrap_or(config.ban_delete_message_seconds);
            if let Err(e) = self
                .platform
                .ban(
                    request.community_id,
                    request.target_id,
                    delete_seconds,
                    &request.reason,
                )
                .await
            {
                return self.finish_removal_failed(request, result, e, notified).await;
            }

            result.notified = notified;
            let embed = sanction_embed(
                "ban",
                request.target_id,
                &name,
                request.moderator_id(),
                &request.reason,
            )
            .with_field("History deleted", &format!("{}s", delete_seconds), true);
            self.finish_ok(&config, request, result, embed).await
        }
        .instrument(span)
        .await
    }

    /// Removes a member from the community.
    pub async fn kick(&self, request: &ModerationRequest) -> ActionResult {
        let span = action_span!(ModAction::Kick, request.community_id, request.target_id);
        async move {
            let mut result = ActionResult::new(ModAction::Kick, request);
            let config = self.load_config(request.community_id).await;

            let member = match self.guarded_member(request).await {
                Ok(member) => member,
                Err(e) => return self.finish_failed(request, result, e).await,
            };

            let ctx = self
                .template_context(&config, ModAction::Kick, request, member.display_name())
                .await;
            let notified = self.notify(&config, member.id, &ctx).await;

            if let Err(e) = self
                .platform
                .kick(request.community_id, request.target_id, &request.reason)
                .await
            {
                return self.finish_removal_failed(request, result, e, notified).await;
            }

            result.notified = notified;
            let embed = sanction_embed(
                "kick",
                member.id,
                member.display_name(),
                request.moderator_id(),
                &request.reason,
            );
            self.finish_ok(&config, request, result, embed).await
        }
        .instrument(span)
        .await
    }

    /// Mutes a member using the community's mute mode.
    ///
    /// Native timeouts default to the configured mute length and are clamped
    /// to the platform maximum. Role mutes are indefinite until `unmute`, so a
    /// duration is rejected in role mode.
    pub async fn mute(&self, request: &ModerationRequest, duration_ms: Option<u64>) -> ActionResult {
        let span = action_span!(ModAction::Mute, request.community_id, request.target_id);
        async move {
            let mut result = ActionResult::new(ModAction::Mute, request);
            let config = self.load_config(request.community_id).await;

            if duration_ms == Some(0) {
                let error = ValidationError::InvalidConfig("mute duration must be positive".into());
                return self.finish_failed(request, result, error.into()).await;
            }
            if duration_ms.is_some() && matches!(config.mute_mode, MuteMode::Role { .. }) {
                let error = ValidationError::InvalidConfig(
                    "role mutes last until unmuted and cannot take a duration".into(),
                );
                return self.finish_failed(request, result, error.into()).await;
            }

            let member = match self.guarded_member(request).await {
                Ok(member) => member,
                Err(e) => return self.finish_failed(request, result, e).await,
            };

            let applied = match config.mute_mode {
                MuteMode::Timeout => {
                    let ms = duration_ms
                        .unwrap_or(config.default_mute_duration_ms)
                        .min(MAX_TIMEOUT_MS);
                    self.platform
                        .timeout(request.community_id, member.id, ms, &request.reason)
                        .await
                        .map(|_| Some(ms))
                }
                MuteMode::Role { role_id } => self
                    .platform
                    .add_role(request.community_id, member.id, role_id, &request.reason)
                    .await
                    .map(|_| None),
            };
            match applied {
                Ok(ms) => result.duration_ms = ms,
                Err(e) => return self.finish_failed(request, result, e.into()).await,
            }

            let mut ctx = self
                .template_context(&config, ModAction::Mute, request, member.display_name())
                .await;
            let mut embed = sanction_embed(
                "mute",
                member.id,
                member.display_name(),
                request.moderator_id(),
                &request.reason,
            );
            match result.duration_ms {
                Some(ms) => {
                    ctx = ctx.with_duration(ms);
                    embed = embed.with_field("Duration", &format_duration(ms), true);
                }
                None => embed = embed.with_field("Duration", "Indefinite", true),
            }
            result.notified = self.notify(&config, member.id, &ctx).await;
            self.finish_ok(&config, request, result, embed).await
        }
        .instrument(span)
        .await
    }

    /// Lifts a mute in whichever mode the community uses.
    pub async fn unmute(&self, request: &ModerationRequest) -> ActionResult {
        let span = action_span!(ModAction::Unmute, request.community_id, request.target_id);
        async move {
            let mut result = ActionResult::new(ModAction::Unmute, request);
            let config = self.load_config(request.community_id).await;

            let member = match self.guarded_member(request).await {
                Ok(member) => member,
                Err(e) => return self.finish_failed(request, result, e).await,
            };

            let lifted = match config.mute_mode {
                MuteMode::Timeout => {
                    self.platform
                        .remove_timeout(request.community_id, member.id, &request.reason)
                        .await
                }
                MuteMode::Role { role_id } => {
                    self.platform
                        .remove_role(request.community_id, member.id, role_id, &request.reason)
                        .await
                }
            };
            if let Err(e) = lifted {
                return self.finish_failed(request, result, e.into()).await;
            }

            let ctx = self
                .template_context(&config, ModAction::Unmute, request, member.display_name())
                .await;
            result.notified = self.notify(&config, member.id, &ctx).await;
            let embed = sanction_embed(
                "unmute",
                member.id,
                member.display_name(),
                request.moderator_id(),
                &request.reason,
            );
            self.finish_ok(&config, request, result, embed).await
        }
        .instrument(span)
        .await
    }

    /// Records a manual infraction and runs escalation on the new total.
    pub async fn warn(&self, request: &ModerationRequest, points: i64) -> ActionResult {
        let span = action_span!(ModAction::Warn, request.community_id, request.target_id);
        async move {
            let mut result = ActionResult::new(ModAction::Warn, request);
            let config = self.load_config(request.community_id).await;

            let member = match self.guarded_member(request).await {
                Ok(member) => member,
                Err(e) => return self.finish_failed(request, result, e).await,
            };

            let infraction = NewInfraction::manual(
                request.community_id,
                member.id,
                points,
                request.moderator_id(),
                &request.reason,
            );
            let infraction = match self.ledger.record(infraction).await {
                Ok(infraction) => infraction,
                Err(e) => return self.finish_failed(request, result, e.into()).await,
            };
            self.metrics.record_infraction("manual");
            result.infraction_id = Some(infraction.id);

            let total = match self
                .ledger
                .active_points(request.community_id, member.id)
                .await
            {
                Ok(total) => total,
                Err(e) => {
                    warn!(error = %e, "Could not compute active points, skipping escalation");
                    result.success = true;
                    return self.finish_partial(&config, request, result, &member, points).await;
                }
            };
            result.total_points = Some(total);
            result.escalation = Some(
                self.escalation
                    .check_and_escalate(request.community_id, &member, total, &config.tiers)
                    .await,
            );

            self.finish_partial(&config, request, result, &member, points)
                .await
        }
        .instrument(span)
        .await
    }

    /// Lifts a ban. No hierarchy check applies.
    pub async fn unban(&self, request: &ModerationRequest) -> ActionResult {
        let span = action_span!(ModAction::Unban, request.community_id, request.target_id);
        async move {
            let mut result = ActionResult::new(ModAction::Unban, request);
            let config = self.load_config(request.community_id).await;

            if let Err(e) = self
                .platform
                .unban(request.community_id, request.target_id, &request.reason)
                .await
            {
                return self.finish_failed(request, result, e.into()).await;
            }

            let name = request.target_id.to_string();
            let ctx = self
                .template_context(&config, ModAction::Unban, request, &name)
                .await;
            result.notified = self.notify(&config, request.target_id, &ctx).await;
            let embed = sanction_embed(
                "unban",
                request.target_id,
                &name,
                request.moderator_id(),
                &request.reason,
            );
            self.finish_ok(&config, request, result, embed).await
        }
        .instrument(span)
        .await
    }

    async fn finish_partial(
        &self,
        config: &ModerationConfig,
        request: &ModerationRequest,
        mut result: ActionResult,
        member: &Member,
        points: i64,
    ) -> ActionResult {
        let mut ctx = self
            .template_context(config, ModAction::Warn, request, member.display_name())
            .await
            .with_points(points);
        let mut embed = sanction_embed(
            "warn",
            member.id,
            member.display_name(),
            request.moderator_id(),
            &request.reason,
        )
        .with_field("Points", &points.to_string(), true);

        if let Some(total) = result.total_points {
            ctx = ctx.with_total_points(total);
            embed = embed.with_field("Active points", &total.to_string(), true);
        }
        if let Some(EscalationOutcome {
            triggered: true,
            tier_name: Some(tier),
            ..
        }) = &result.escalation
        {
            ctx = ctx.with_tier(tier);
            embed = embed.with_field("Escalation", tier, true);
        }

        result.notified = self.notify(config, member.id, &ctx).await;
        self.finish_ok(config, request, result, embed).await
    }

    /// Best-effort DM with the community's notification settings.
    async fn notify(
        &self,
        config: &ModerationConfig,
        target_id: MemberId,
        ctx: &TemplateContext,
    ) -> bool {
        let settings = resolve(None, None, &config.notification);
        self.notifier.notify(target_id, &settings, ctx).await
    }

    /// Success path: log, audit.
    async fn finish_ok(
        &self,
        config: &ModerationConfig,
        request: &ModerationRequest,
        mut result: ActionResult,
        embed: mw_connectors::Embed,
    ) -> ActionResult {
        result.success = true;
        result.logged = self.mod_log.send(config, &embed).await;

        self.record(request, &result).await;
        info!(
            action = %result.action,
            notified = result.notified,
            logged = result.logged,
            "Moderation action applied"
        );
        result
    }

    /// Failure path for kick and ban, which notify before the platform call.
    async fn finish_removal_failed(
        &self,
        request: &ModerationRequest,
        result: ActionResult,
        error: ConnectorError,
        notified: bool,
    ) -> ActionResult {
        if notified {
            warn!(action = %result.action, "Member was notified of a removal that did not happen");
        }
        self.finish_failed(request, result, error.into()).await
    }

    async fn finish_failed(
        &self,
        request: &ModerationRequest,
        result: ActionResult,
        error: ActionError,
    ) -> ActionResult {
        warn!(action = %result.action, error = %error, "Moderation action failed");
        let result = result.failed(error);
        self.record(request, &result).await;
        result
    }

    /// Audit trail and metrics for every attempt.
    async fn record(&self, request: &ModerationRequest, result: &ActionResult) {
        let outcome = match &result.error {
            None => AuditOutcome::Success,
            Some(ActionError::Permission(msg)) => AuditOutcome::Denied(msg.clone()),
            Some(e) => AuditOutcome::Failure(e.to_string()),
        };
        self.metrics
            .record_sanction(result.action.as_str(), result.success);
        self.audit
            .log(
                ModerationAuditEntry::new(
                    result.action.as_str(),
                    request.community_id,
                    request.target_id,
                    request.moderator_id(),
                    &request.reason,
                    outcome,
                )
                .with_details(serde_json::json!({
                    "notified": result.notified,
                    "logged": result.logged,
                    "duration_ms": result.duration_ms,
                    "total_points": result.total_points,
                })),
            )
            .await;
    }

    async fn lookup(&self, request: &ModerationRequest) -> Result<Option<Member>, ActionError> {
        Ok(self
            .platform
            .get_member(request.community_id, request.target_id)
            .await?)
    }

    /// Resolves a current member and checks the hierarchy against them.
    async fn guarded_member(&self, request: &ModerationRequest) -> Result<Member, ActionError> {
        let member = self
            .lookup(request)
            .await?
            .ok_or(ActionError::NotAMember(request.target_id))?;
        self.check_hierarchy(request, &member).await?;
        Ok(member)
    }

    /// Both the bot and the invoking moderator must strictly outrank the target.
    async fn check_hierarchy(
        &self,
        request: &ModerationRequest,
        target: &Member,
    ) -> Result<(), ActionError> {
        let bot = self.platform.bot_member(request.community_id).await?;
        if !bot.outranks(target) {
            return Err(ActionError::Permission(format!(
                "my highest role must be above {}'s",
                target.display_name()
            )));
        }
        if let Some(moderator) = &request.moderator {
            if !moderator.outranks(target) {
                return Err(ActionError::Permission(format!(
                    "your highest role must be above {}'s",
                    target.display_name()
                )));
            }
        }
        Ok(())
    }

    async fn template_context(
        &self,
        config: &ModerationConfig,
        action: ModAction,
        request: &ModerationRequest,
        member_name: &str,
    ) -> TemplateContext {
        let community = self
            .platform
            .community_name(config.community_id)
            .await
            .unwrap_or_else(|_| config.community_id.to_string());
        TemplateContext::new(action.as_str(), &request.reason, &community).with_member(member_name)
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

fn display_name(member: Option<&Member>, id: MemberId) -> String {
    member
        .map(|m| m.display_name().to_string())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_visible_errors() {
        assert!(ActionError::NotAMember(1).is_user_visible());
        assert!(ActionError::Permission("x".into()).is_user_visible());
        assert!(ActionError::Validation(ValidationError::NonPositivePoints(0)).is_user_visible());
        assert!(ActionError::Platform(ConnectorError::PermissionDenied("ban".into()))
            .is_user_visible());
        assert!(!ActionError::Platform(ConnectorError::RateLimited(3)).is_user_visible());
        assert!(!ActionError::Storage("db down".into()).is_user_visible());
    }

    #[test]
    fn test_ledger_error_conversion() {
        let err: ActionError = LedgerError::Validation(ValidationError::NonPositivePoints(-1)).into();
        assert_eq!(
            err,
            ActionError::Validation(ValidationError::NonPositivePoints(-1))
        );
    }

    #[test]
    fn test_mod_action_names() {
        assert_eq!(ModAction::Unmute.to_string(), "unmute");
        assert_eq!(ModAction::Ban.as_str(), "ban");
    }
}
