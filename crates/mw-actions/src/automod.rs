//! Automod pipeline.
//!
//! One call per inbound event. After the immunity checks and rule
//! evaluation, every step runs in isolation: a failed removal does not stop
//! the infraction, a failed infraction does not stop escalation on the
//! existing total, and so on. The returned [`AutomodReport`] records what
//! each step did.

use crate::escalate::{EscalationOutcome, EscalationService};
use crate::modlog::{color_for_action, ModLogDispatcher};
use crate::notify::Notifier;
use mw_connectors::{truncate, Embed, PlatformConnector};
use mw_core::db::{ModerationConfigRepository, RuleRepository};
use mw_core::{
    CommunityId, EventKind, InboundEvent, InfractionLedger, MemberId, ModerationConfig,
    NewInfraction, RuleAction, RuleTarget,
};
use mw_observability::{event_span, MetricsCollector};
use mw_policy::{resolve, RuleEngine, RuleMatch, TemplateContext};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Longest excerpt of matched content shown in audit-log entries.
pub const LOG_EXCERPT_LEN: usize = 200;

/// Why an event was not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AutomodDisabled,
    AutomatedAccount,
    ImmuneRole,
    ConfigUnavailable,
    RulesUnavailable,
    NoMatch,
}

/// Result of one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The rule did not ask for this step, or there was nothing to act on.
    NotRequested,
    Done,
    Failed(String),
}

/// What automod did with one event.
#[derive(Debug, Clone, Serialize)]
pub struct AutomodReport {
    pub community_id: CommunityId,
    pub member_id: MemberId,
    pub skipped: Option<SkipReason>,
    pub rule: Option<String>,
    pub target: Option<RuleTarget>,
    pub matched_text: Option<String>,
    pub removal: StepOutcome,
    pub infraction: StepOutcome,
    pub infraction_id: Option<Uuid>,
    pub active_points: Option<i64>,
    pub escalation: Option<EscalationOutcome>,
    pub notified: bool,
    pub logged: bool,
}

impl AutomodReport {
    fn new(event: &InboundEvent) -> Self {
        Self {
            community_id: event.community_id(),
            member_id: event.actor().id,
            skipped: None,
            rule: None,
            target: None,
            matched_text: None,
            removal: StepOutcome::NotRequested,
            infraction: StepOutcome::NotRequested,
            infraction_id: None,
            active_points: None,
            escalation: None,
            notified: false,
            logged: false,
        }
    }

    fn skip(mut self, reason: SkipReason) -> Self {
        self.skipped = Some(reason);
        self
    }

    /// Whether a rule matched.
    pub fn matched(&self) -> bool {
        self.rule.is_some()
    }
}

/// Per-event entry point for automated moderation.
pub struct AutomodOrchestrator {
    platform: Arc<dyn PlatformConnector>,
    rules: Arc<dyn RuleRepository>,
    configs: Arc<dyn ModerationConfigRepository>,
    ledger: Arc<InfractionLedger>,
    escalation: Arc<EscalationService>,
    notifier: Arc<Notifier>,
    mod_log: Arc<ModLogDispatcher>,
    metrics: Arc<MetricsCollector>,
}

impl AutomodOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn PlatformConnector>,
        rules: Arc<dyn RuleRepository>,
        configs: Arc<dyn ModerationConfigRepository>,
        ledger: Arc<InfractionLedger>,
        escalation: Arc<EscalationService>,
        notifier: Arc<Notifier>,
        mod_log: Arc<ModLogDispatcher>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            platform,
            rules,
            configs,
            ledger,
            escalation,
            notifier,
            mod_log,
            metrics,
        }
    }

    /// Handles one inbound event.
    pub async fn handle_event(&self, event: &InboundEvent) -> AutomodReport {
        let span = event_span!(event.community_id(), event.actor().id);
        let started = Instant::now();
        let report = self.run(event).instrument(span).await;
        self.metrics
            .record_event_duration(started.elapsed().as_secs_f64());
        report
    }

    async fn run(&self, event: &InboundEvent) -> AutomodReport {
        let report = AutomodReport::new(event);
        let community_id = event.community_id();
        let author = event.actor();

        let config = match self.configs.get_or_create(community_id).await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Could not load moderation config");
                return report.skip(SkipReason::ConfigUnavailable);
            }
        };
        if !config.automod_enabled {
            return report.skip(SkipReason::AutomodDisabled);
        }
        if author.is_automated() {
            return report.skip(SkipReason::AutomatedAccount);
        }
        if author.has_any_role(&config.immune_roles) {
            debug!("Author holds an immune role");
            return report.skip(SkipReason::ImmuneRole);
        }

        self.metrics.record_event_evaluated(kind_label(event.kind()));

        let rules = match self.rules.list_enabled(community_id).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(error = %e, "Could not load rules");
                return report.skip(SkipReason::RulesUnavailable);
            }
        };
        let Some(matched) = RuleEngine::new(rules).evaluate(event) else {
            return report.skip(SkipReason::NoMatch);
        };

        info!(rule = %matched.rule.name, target = ?matched.target, "Automod rule matched");
        self.metrics.record_rule_match(&matched.rule.name);
        self.act(event, &config, matched, report).await
    }

    async fn act(
        &self,
        event: &InboundEvent,
        config: &ModerationConfig,
        matched: RuleMatch,
        mut report: AutomodReport,
    ) -> AutomodReport {
        let rule = &matched.rule;
        let author = event.actor();
        report.rule = Some(rule.name.clone());
        report.target = Some(matched.target);
        report.matched_text = Some(matched.matched_text.clone());

        if rule.has_action(RuleAction::DeleteContent) {
            report.removal = self.remove_content(event).await;
        }

        let reason = format!("Automod rule '{}' matched", rule.name);
        if rule.has_action(RuleAction::RecordInfraction) {
            let new = NewInfraction::automod(
                config.community_id,
                author.id,
                rule.points,
                &rule.name,
                &reason,
            );
            report.infraction = match self.ledger.record(new).await {
                Ok(infraction) => {
                    self.metrics.record_infraction("automod");
                    report.infraction_id = Some(infraction.id);
                    StepOutcome::Done
                }
                Err(e) => {
                    warn!(error = %e, "Failed to record automod infraction");
                    StepOutcome::Failed(e.to_string())
                }
            };
        }

        match self.ledger.active_points(config.community_id, author.id).await {
            Ok(points) => {
                report.active_points = Some(points);
                report.escalation = Some(
                    self.escalation
                        .check_and_escalate(config.community_id, author, points, &config.tiers)
                        .await,
                );
            }
            Err(e) => warn!(error = %e, "Could not compute active points, skipping escalation"),
        }

        if rule.has_action(RuleAction::Notify) {
            let settings = resolve(rule.notification.as_ref(), None, &config.notification);
            let community = self
                .platform
                .community_name(config.community_id)
                .await
                .unwrap_or_else(|_| config.community_id.to_string());
            let mut ctx = TemplateContext::new("automod", &reason, &community)
                .with_member(author.display_name())
                .with_rule(&rule.name);
            if report.infraction_id.is_some() {
                ctx = ctx.with_points(rule.points);
            }
            if let Some(points) = report.active_points {
                ctx = ctx.with_total_points(points);
            }
            report.notified = self.notifier.notify(author.id, &settings, &ctx).await;
        }

        let embed = log_embed(event, &matched, &report);
        report.logged = self.mod_log.send(config, &embed).await;
        report
    }

    async fn remove_content(&self, event: &InboundEvent) -> StepOutcome {
        let removed = match event {
            InboundEvent::MessageCreated {
                channel_id,
                message_id,
                ..
            } => self.platform.delete_message(*channel_id, *message_id).await,
            InboundEvent::ReactionAdded {
                channel_id,
                message_id,
                member,
                emoji,
                ..
            } => {
                self.platform
                    .remove_reaction(*channel_id, *message_id, member.id, emoji)
                    .await
            }
            InboundEvent::MemberUpdated { .. } => return StepOutcome::NotRequested,
        };

        match removed {
            Ok(()) => StepOutcome::Done,
            Err(e) => {
                warn!(error = %e, "Failed to remove offending content");
                StepOutcome::Failed(e.to_string())
            }
        }
    }
}

fn kind_label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Message => "message",
        EventKind::Reaction => "reaction",
        EventKind::MemberUpdate => "member_update",
    }
}

fn log_embed(event: &InboundEvent, matched: &RuleMatch, report: &AutomodReport) -> Embed {
    let author = event.actor();
    let mut embed = Embed::new(&format!("automod | {}", author.display_name()))
        .with_color(color_for_action("automod"))
        .with_field(
            "Member",
            &format!("{} ({})", author.display_name(), author.id),
            true,
        )
        .with_field("Rule", &matched.rule.name, true)
        .with_field("Target", matched.target.as_db_str(), true)
        .with_field(
            "Matched content",
            &truncate(&matched.content, LOG_EXCERPT_LEN),
            false,
        )
        .with_timestamp(chrono::Utc::now());

    if let Some(channel_id) = event.channel_id() {
        embed = embed.with_field("Channel", &format!("<#{}>", channel_id), true);
    }
    if let Some(points) = report.active_points {
        embed = embed.with_field("Active points", &points.to_string(), true);
    }
    if let Some(EscalationOutcome {
        triggered: true,
        tier_name: Some(tier),
        action: Some(action),
    }) = &report.escalation
    {
        embed = embed.with_field("Escalation", &format!("{} ({})", tier, action), true);
    }
    if report.removal == StepOutcome::Done {
        embed = embed.with_footer("Content removed");
    }
    embed
}
