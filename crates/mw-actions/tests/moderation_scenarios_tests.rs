//! End-to-end moderation scenarios over mock repositories and connectors.
//!
//! These tests wire the full service set the way a host would and drive it
//! through automod events and manual staff actions.

use std::sync::Arc;

use mw_actions::{
    ActionError, EscalationOutcome, ModerationRequest, ModerationServices, SkipReason,
    StepOutcome,
};
use mw_connectors::{
    ConnectorError, MockModLogConnector, MockPlatformConnector, ModLogConnector,
    PlatformOperation,
};
use mw_core::db::mocks::{
    MockInfractionRepository, MockModerationConfigRepository, MockRuleRepository,
};
use mw_core::{
    EscalationTier, InboundEvent, InfractionSource, Member, ModerationConfig, MuteMode,
    NewInfraction, NotificationOverride, PatternDef, ReactionEmoji, Rule, RuleAction, RuleTarget,
    TierAction,
};
use mw_observability::AuditOutcome;

const COMMUNITY: u64 = 1;
const TARGET: u64 = 5;
const MODERATOR: u64 = 7;
const LOG_CHANNEL: u64 = 900;

struct Harness {
    platform: Arc<MockPlatformConnector>,
    infractions: Arc<MockInfractionRepository>,
    services: ModerationServices,
}

async fn harness(config: ModerationConfig, rules: Vec<Rule>) -> Harness {
    harness_with_log(config, rules, None).await
}

async fn harness_with_log(
    config: ModerationConfig,
    rules: Vec<Rule>,
    mod_log: Option<Arc<MockModLogConnector>>,
) -> Harness {
    let platform = Arc::new(MockPlatformConnector::new(100));
    platform.add_member(target()).await;
    platform.add_member(moderator()).await;

    let infractions = Arc::new(MockInfractionRepository::new());
    let services = ModerationServices::new(
        platform.clone(),
        mod_log.map(|m| m as Arc<dyn ModLogConnector>),
        Arc::new(MockRuleRepository::with_rules(rules)),
        infractions.clone(),
        Arc::new(MockModerationConfigRepository::with_config(config)),
    );

    Harness {
        platform,
        infractions,
        services,
    }
}

fn target() -> Member {
    Member::new(TARGET, "target").with_role(10, 1)
}

fn moderator() -> Member {
    Member::new(MODERATOR, "moderator").with_role(11, 50)
}

fn config_with_tiers(tiers: Vec<EscalationTier>) -> ModerationConfig {
    ModerationConfig::new(COMMUNITY)
        .with_tiers(tiers)
        .with_log_channel(LOG_CHANNEL)
}

fn badword_rule() -> Rule {
    Rule::new(
        COMMUNITY,
        "R1",
        vec![RuleTarget::MessageText],
        vec![PatternDef::new("badword").with_flags("i")],
    )
    .with_points(5)
}

fn message(content: &str) -> InboundEvent {
    InboundEvent::message(COMMUNITY, 20, 300, target(), content)
}

fn warn_request(reason: &str) -> ModerationRequest {
    ModerationRequest::new(COMMUNITY, TARGET, reason).by(moderator())
}

// =============================================================================
// Automod Pipeline Tests
// =============================================================================

#[tokio::test]
async fn test_rule_match_records_infraction_and_fires_timeout_tier() {
    let h = harness(
        config_with_tiers(vec![EscalationTier::timeout("T1", 5, 600_000)]),
        vec![badword_rule()],
    )
    .await;

    let report = h
        .services
        .automod
        .handle_event(&message("this has a BADWORD in it"))
        .await;

    assert_eq!(report.skipped, None);
    assert_eq!(report.rule.as_deref(), Some("R1"));
    assert_eq!(report.matched_text.as_deref(), Some("BADWORD"));
    assert_eq!(report.removal, StepOutcome::Done);
    assert_eq!(report.infraction, StepOutcome::Done);
    assert_eq!(report.active_points, Some(5));
    assert_eq!(
        report.escalation,
        Some(EscalationOutcome {
            triggered: true,
            tier_name: Some("T1".to_string()),
            action: Some(TierAction::Timeout),
        })
    );

    let stored = h.infractions.snapshot().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].points, 5);
    assert_eq!(stored[0].source, InfractionSource::Automod);
    assert_eq!(stored[0].rule_name.as_deref(), Some("R1"));

    let timeouts = h
        .platform
        .successful_calls(PlatformOperation::Timeout)
        .await;
    assert_eq!(timeouts.len(), 1);
    assert_eq!(timeouts[0].target, TARGET);
    assert_eq!(timeouts[0].detail, "600000");
    assert!(h.platform.timeout_until(TARGET).await.is_some());

    assert_eq!(
        h.platform.call_count(PlatformOperation::DeleteMessage).await,
        1
    );
    assert!(report.notified);
    assert!(report.logged);
}

#[tokio::test]
async fn test_no_match_when_rule_disabled() {
    let h = harness(
        config_with_tiers(vec![]),
        vec![badword_rule().disabled()],
    )
    .await;

    let report = h.services.automod.handle_event(&message("badword")).await;
    assert_eq!(report.skipped, Some(SkipReason::NoMatch));
    assert!(!report.matched());
    assert!(h.infractions.snapshot().await.is_empty());
    assert!(h.platform.calls().await.is_empty());
}

#[tokio::test]
async fn test_immunity_checks() {
    let mut config = config_with_tiers(vec![]);
    config.immune_roles = vec![10];
    let h = harness(config, vec![badword_rule()]).await;
    let report = h.services.automod.handle_event(&message("badword")).await;
    assert_eq!(report.skipped, Some(SkipReason::ImmuneRole));

    let h = harness(config_with_tiers(vec![]), vec![badword_rule()]).await;
    let bot_message = InboundEvent::message(COMMUNITY, 20, 301, Member::new(8, "bot").as_bot(), "badword");
    let report = h.services.automod.handle_event(&bot_message).await;
    assert_eq!(report.skipped, Some(SkipReason::AutomatedAccount));

    let mut config = config_with_tiers(vec![]);
    config.automod_enabled = false;
    let h = harness(config, vec![badword_rule()]).await;
    let report = h.services.automod.handle_event(&message("badword")).await;
    assert_eq!(report.skipped, Some(SkipReason::AutomodDisabled));
    assert!(h.infractions.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_steps_follow_rule_actions() {
    let rule = badword_rule().with_actions(vec![RuleAction::DeleteContent]);
    let h = harness(
        config_with_tiers(vec![EscalationTier::timeout("T1", 1, 60_000)]),
        vec![rule],
    )
    .await;

    let report = h.services.automod.handle_event(&message("badword")).await;
    assert_eq!(report.removal, StepOutcome::Done);
    assert_eq!(report.infraction, StepOutcome::NotRequested);
    assert_eq!(report.active_points, Some(0));
    assert_eq!(report.escalation, Some(EscalationOutcome::not_triggered()));
    assert!(!report.notified);
    assert_eq!(
        h.platform.call_count(PlatformOperation::DirectMessage).await,
        0
    );
}

#[tokio::test]
async fn test_failed_removal_does_not_stop_infraction() {
    let h = harness(config_with_tiers(vec![]), vec![badword_rule()]).await;
    h.platform
        .fail_on(
            PlatformOperation::DeleteMessage,
            ConnectorError::PermissionDenied("manage messages".into()),
        )
        .await;

    let report = h.services.automod.handle_event(&message("badword")).await;
    assert!(matches!(report.removal, StepOutcome::Failed(_)));
    assert_eq!(report.infraction, StepOutcome::Done);
    assert_eq!(h.infractions.snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_reaction_removal_and_member_update() {
    let reaction_rule = Rule::new(
        COMMUNITY,
        "no-clowns",
        vec![RuleTarget::ReactionEmoji],
        vec![PatternDef::new("🤡")],
    );
    let name_rule = Rule::new(
        COMMUNITY,
        "no-admin-names",
        vec![RuleTarget::Username],
        vec![PatternDef::new("^admin").with_flags("i")],
    );
    let h = harness(config_with_tiers(vec![]), vec![reaction_rule, name_rule]).await;

    let reaction = InboundEvent::ReactionAdded {
        community_id: COMMUNITY,
        channel_id: 20,
        message_id: 300,
        member: target(),
        emoji: ReactionEmoji::Unicode {
            name: "🤡".to_string(),
        },
    };
    let report = h.services.automod.handle_event(&reaction).await;
    assert_eq!(report.target, Some(RuleTarget::ReactionEmoji));
    assert_eq!(report.removal, StepOutcome::Done);
    assert_eq!(
        h.platform.call_count(PlatformOperation::RemoveReaction).await,
        1
    );

    let renamed = InboundEvent::MemberUpdated {
        community_id: COMMUNITY,
        member: Member::new(TARGET, "Admin_Official").with_role(10, 1),
        old_username: Some("target".to_string()),
        old_nickname: None,
    };
    let report = h.services.automod.handle_event(&renamed).await;
    assert_eq!(report.rule.as_deref(), Some("no-admin-names"));
    assert_eq!(report.removal, StepOutcome::NotRequested);
    assert_eq!(report.infraction, StepOutcome::Done);
}

#[tokio::test]
async fn test_rule_notification_override_disables_dm() {
    let rule = badword_rule().with_notification(NotificationOverride {
        enabled: Some(false),
        ..Default::default()
    });
    let h = harness(config_with_tiers(vec![]), vec![rule]).await;

    let report = h.services.automod.handle_event(&message("badword")).await;
    assert!(!report.notified);
    assert_eq!(
        h.platform.call_count(PlatformOperation::DirectMessage).await,
        0
    );
}

#[tokio::test]
async fn test_log_goes_to_collaborator_then_channel() {
    let collaborator = Arc::new(MockModLogConnector::new());
    let h = harness_with_log(
        config_with_tiers(vec![]),
        vec![badword_rule()],
        Some(collaborator.clone()),
    )
    .await;

    let report = h.services.automod.handle_event(&message("badword")).await;
    assert!(report.logged);
    let entries = collaborator.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.field("Rule"), Some("R1"));
    assert_eq!(entries[0].1.field("Matched content"), Some("badword"));

    collaborator.set_delivers(false);
    let report = h.services.automod.handle_event(&message("badword again")).await;
    assert!(report.logged);
    let posted = h
        .platform
        .successful_calls(PlatformOperation::ChannelMessage)
        .await;
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].target, LOG_CHANNEL);
}

// =============================================================================
// Manual Action Tests
// =============================================================================

#[tokio::test]
async fn test_warn_adds_to_existing_points_and_escalates() {
    let h = harness(
        config_with_tiers(vec![EscalationTier::timeout("T5", 5, 600_000)]),
        vec![],
    )
    .await;
    h.services
        .ledger
        .record(NewInfraction::manual(
            COMMUNITY,
            TARGET,
            2,
            Some(MODERATOR),
            "earlier",
        ))
        .await
        .unwrap();

    let result = h
        .services
        .executor
        .warn(&warn_request("spamming"), 3)
        .await;

    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(result.total_points, Some(5));
    let escalation = result.escalation.unwrap();
    assert!(escalation.triggered);
    assert_eq!(escalation.tier_name.as_deref(), Some("T5"));
    assert!(result.infraction_id.is_some());

    let stored = h.infractions.snapshot().await;
    assert_eq!(stored.len(), 2);
    assert!(stored
        .iter()
        .all(|i| i.source == InfractionSource::Manual && i.moderator_id == Some(MODERATOR)));
}

#[tokio::test]
async fn test_highest_qualifying_tier_only() {
    let h = harness(
        config_with_tiers(vec![
            EscalationTier::timeout("T10", 10, 60_000),
            EscalationTier::new("T25", 25, TierAction::Kick),
            EscalationTier::new("T50", 50, TierAction::Ban),
        ]),
        vec![],
    )
    .await;

    let result = h
        .services
        .executor
        .warn(&warn_request("repeated abuse"), 30)
        .await;

    assert_eq!(
        result.escalation,
        Some(EscalationOutcome {
            triggered: true,
            tier_name: Some("T25".to_string()),
            action: Some(TierAction::Kick),
        })
    );
    assert_eq!(h.platform.call_count(PlatformOperation::Kick).await, 1);
    assert_eq!(h.platform.call_count(PlatformOperation::Timeout).await, 0);
    assert_eq!(h.platform.call_count(PlatformOperation::Ban).await, 0);
    assert!(!h.platform.is_member(TARGET).await);
}

#[tokio::test]
async fn test_warn_rejects_non_positive_points() {
    let h = harness(config_with_tiers(vec![]), vec![]).await;

    let result = h.services.executor.warn(&warn_request("oops"), 0).await;
    assert!(!result.success);
    assert!(matches!(result.error, Some(ActionError::Validation(_))));
    assert!(h.infractions.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_failed_escalation_keeps_infraction() {
    let h = harness(
        config_with_tiers(vec![EscalationTier::new("T1", 1, TierAction::Kick)]),
        vec![],
    )
    .await;
    h.platform
        .fail_on(
            PlatformOperation::Kick,
            ConnectorError::PermissionDenied("kick members".into()),
        )
        .await;

    let result = h.services.executor.warn(&warn_request("spam"), 2).await;
    assert!(result.success);
    assert_eq!(result.escalation, Some(EscalationOutcome::not_triggered()));
    assert_eq!(h.infractions.snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_dm_failure_is_not_action_failure() {
    let h = harness(config_with_tiers(vec![]), vec![]).await;
    h.platform
        .fail_on(
            PlatformOperation::DirectMessage,
            ConnectorError::DirectMessagesClosed,
        )
        .await;

    let result = h
        .services
        .executor
        .kick(&warn_request("raiding"))
        .await;
    assert!(result.success);
    assert!(!result.notified);
    assert!(!h.platform.is_member(TARGET).await);
}

#[tokio::test]
async fn test_hierarchy_blocks_platform_call() {
    let h = harness(config_with_tiers(vec![]), vec![]).await;
    let junior = Member::new(9, "junior").with_role(12, 1);

    let request = ModerationRequest::new(COMMUNITY, TARGET, "nope").by(junior);
    let result = h.services.executor.kick(&request).await;
    assert!(!result.success);
    assert!(matches!(result.error, Some(ActionError::Permission(_))));
    assert!(result.error.as_ref().unwrap().is_user_visible());
    assert_eq!(h.platform.call_count(PlatformOperation::Kick).await, 0);

    let outranking = Member::new(30, "senior-staff").with_role(13, 200);
    h.platform.add_member(outranking).await;
    let request = ModerationRequest::new(COMMUNITY, 30, "bot too low").by(moderator());
    let result = h.services.executor.ban(&request, None).await;
    assert!(matches!(result.error, Some(ActionError::Permission(_))));
    assert_eq!(h.platform.call_count(PlatformOperation::Ban).await, 0);

    let denied = h.services.audit.entries_for_member(COMMUNITY, TARGET).await;
    assert!(matches!(denied[0].outcome, AuditOutcome::Denied(_)));
}

#[tokio::test]
async fn test_kick_requires_membership() {
    let h = harness(config_with_tiers(vec![]), vec![]).await;
    let request = ModerationRequest::new(COMMUNITY, 404, "gone").by(moderator());

    let result = h.services.executor.kick(&request).await;
    assert_eq!(result.error, Some(ActionError::NotAMember(404)));
}

#[tokio::test]
async fn test_ban_and_unban_non_member() {
    let mut config = config_with_tiers(vec![]);
    config.ban_delete_message_seconds = 86_400;
    let h = harness(config, vec![]).await;
    let request = ModerationRequest::new(COMMUNITY, 404, "ban evasion").by(moderator());

    let result = h.services.executor.ban(&request, None).await;
    assert!(result.success);
    assert!(result.logged);
    let bans = h.platform.successful_calls(PlatformOperation::Ban).await;
    assert_eq!(bans[0].detail, "86400");
    assert!(h.platform.is_banned(404).await);

    let result = h.services.executor.unban(&request).await;
    assert!(result.success);
    assert!(result.notified);
    assert!(result.logged);
    assert!(!h.platform.is_banned(404).await);
    let dms = h
        .platform
        .successful_calls(PlatformOperation::DirectMessage)
        .await;
    assert_eq!(dms.len(), 2);
    assert!(dms.iter().all(|dm| dm.target == 404));
    assert!(dms[1].detail.contains("unban"));

    let result = h.services.executor.unban(&request).await;
    assert!(!result.success);
    assert!(!result.notified);
    assert!(matches!(result.error, Some(ActionError::Platform(_))));
    assert_eq!(
        h.platform.call_count(PlatformOperation::DirectMessage).await,
        2
    );
}

#[tokio::test]
async fn test_kick_notifies_before_removal() {
    let h = harness(config_with_tiers(vec![]), vec![]).await;

    let result = h.services.executor.kick(&warn_request("raiding")).await;
    assert!(result.success);
    assert!(result.notified);

    let order: Vec<PlatformOperation> = h
        .platform
        .calls()
        .await
        .iter()
        .map(|c| c.operation)
        .filter(|op| matches!(op, PlatformOperation::DirectMessage | PlatformOperation::Kick))
        .collect();
    assert_eq!(
        order,
        vec![PlatformOperation::DirectMessage, PlatformOperation::Kick]
    );
}

#[tokio::test]
async fn test_failed_kick_does_not_report_notified() {
    let h = harness(config_with_tiers(vec![]), vec![]).await;
    h.platform
        .fail_on(
            PlatformOperation::Kick,
            ConnectorError::PermissionDenied("kick members".into()),
        )
        .await;

    let result = h.services.executor.kick(&warn_request("raiding")).await;
    assert!(!result.success);
    assert!(!result.notified);
    assert!(h.platform.is_member(TARGET).await);
}

#[tokio::test]
async fn test_mute_modes() {
    let h = harness(config_with_tiers(vec![]), vec![]).await;
    let result = h
        .services
        .executor
        .mute(&warn_request("cool off"), Some(u64::MAX))
        .await;
    assert!(result.success);
    assert_eq!(result.duration_ms, Some(mw_core::MAX_TIMEOUT_MS));

    let result = h.services.executor.unmute(&warn_request("done")).await;
    assert!(result.success);
    assert!(h.platform.timeout_until(TARGET).await.is_none());

    let mut config = config_with_tiers(vec![]);
    config.mute_mode = MuteMode::Role { role_id: 77 };
    let h = harness(config, vec![]).await;
    let result = h.services.executor.mute(&warn_request("cool off"), None).await;
    assert!(result.success);
    assert_eq!(result.duration_ms, None);
    assert!(h.platform.member_has_role(TARGET, 77).await);

    h.services.executor.unmute(&warn_request("done")).await;
    assert!(!h.platform.member_has_role(TARGET, 77).await);
}

#[tokio::test]
async fn test_role_mute_rejects_duration() {
    let mut config = config_with_tiers(vec![]);
    config.mute_mode = MuteMode::Role { role_id: 77 };
    let h = harness(config, vec![]).await;

    let result = h
        .services
        .executor
        .mute(&warn_request("cool off"), Some(3_600_000))
        .await;
    assert!(!result.success);
    assert!(matches!(result.error, Some(ActionError::Validation(_))));
    assert!(result.error.as_ref().unwrap().is_user_visible());
    assert_eq!(result.duration_ms, None);
    assert!(!h.platform.member_has_role(TARGET, 77).await);
    assert_eq!(h.platform.call_count(PlatformOperation::AddRole).await, 0);
    assert_eq!(
        h.platform.call_count(PlatformOperation::DirectMessage).await,
        0
    );
}

#[tokio::test]
async fn test_clear_twice() {
    let h = harness(config_with_tiers(vec![]), vec![]).await;
    h.services.executor.warn(&warn_request("a"), 1).await;
    h.services.executor.warn(&warn_request("b"), 2).await;

    assert_eq!(h.services.ledger.clear(COMMUNITY, TARGET).await.unwrap(), 2);
    assert_eq!(h.services.ledger.clear(COMMUNITY, TARGET).await.unwrap(), 0);
    assert_eq!(
        h.services
            .ledger
            .active_points(COMMUNITY, TARGET)
            .await
            .unwrap(),
        0
    );
}

// =============================================================================
// Escalation Cooldown Tests
// =============================================================================

#[tokio::test]
async fn test_cooldown_suppresses_repeat_fire() {
    let mut config = config_with_tiers(vec![EscalationTier::timeout("T1", 5, 60_000)]);
    config.escalation_cooldown_secs = Some(300);
    let h = harness(config, vec![]).await;

    let first = h.services.executor.warn(&warn_request("a"), 5).await;
    let second = h.services.executor.warn(&warn_request("b"), 5).await;

    assert!(first.escalation.unwrap().triggered);
    assert!(!second.escalation.unwrap().triggered);
    assert_eq!(h.platform.call_count(PlatformOperation::Timeout).await, 1);
}

#[tokio::test]
async fn test_without_cooldown_both_fire() {
    let h = harness(
        config_with_tiers(vec![EscalationTier::timeout("T1", 5, 60_000)]),
        vec![],
    )
    .await;

    let first = h.services.executor.warn(&warn_request("a"), 5).await;
    let second = h.services.executor.warn(&warn_request("b"), 5).await;

    assert!(first.escalation.unwrap().triggered);
    assert!(second.escalation.unwrap().triggered);
    assert_eq!(h.platform.call_count(PlatformOperation::Timeout).await, 2);
}

#[tokio::test]
async fn test_metrics_and_audit_trail() {
    let h = harness(
        config_with_tiers(vec![EscalationTier::timeout("T1", 5, 60_000)]),
        vec![badword_rule()],
    )
    .await;

    h.services.automod.handle_event(&message("badword")).await;
    h.services.executor.kick(&warn_request("done")).await;

    let snapshot = h.services.metrics.snapshot();
    assert_eq!(snapshot.events_evaluated, 1);
    assert_eq!(snapshot.rule_matches, 1);
    assert_eq!(snapshot.infractions_recorded, 1);
    assert_eq!(snapshot.escalations_triggered, 1);
    assert_eq!(snapshot.sanctions_executed, 2);

    let actions: Vec<String> = h
        .services
        .audit
        .entries()
        .await
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec!["timeout".to_string(), "kick".to_string()]);
}
