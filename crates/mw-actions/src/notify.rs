//! Member notifications.
//!
//! Delivery is best effort: a closed inbox or a platform error only clears
//! the `notified` flag of the surrounding action.

use crate::modlog::color_for_action;
use chrono::Utc;
use mw_connectors::{Embed, MessageContent, PlatformConnector};
use mw_core::MemberId;
use mw_observability::MetricsCollector;
use mw_policy::{render, ResolvedNotification, TemplateContext};
use std::sync::Arc;
use tracing::{debug, warn};

/// Renders and sends direct-message notifications.
pub struct Notifier {
    platform: Arc<dyn PlatformConnector>,
    metrics: Arc<MetricsCollector>,
}

impl Notifier {
    pub fn new(platform: Arc<dyn PlatformConnector>, metrics: Arc<MetricsCollector>) -> Self {
        Self { platform, metrics }
    }

    /// Sends a notification. Returns whether the member was actually reached.
    pub async fn notify(
        &self,
        member_id: MemberId,
        settings: &ResolvedNotification,
        ctx: &TemplateContext,
    ) -> bool {
        if !settings.enabled {
            debug!(member_id, action = %ctx.action, "Notification disabled");
            return false;
        }

        let content = build_content(settings, ctx);
        match self.platform.send_direct_message(member_id, &content).await {
            Ok(()) => {
                debug!(member_id, action = %ctx.action, "Member notified");
                true
            }
            Err(e) => {
                warn!(member_id, action = %ctx.action, error = %e, "Failed to notify member");
                self.metrics.record_notification_failure();
                false
            }
        }
    }
}

fn build_content(settings: &ResolvedNotification, ctx: &TemplateContext) -> MessageContent {
    let text = render(&settings.template, ctx);
    if !settings.use_embed {
        return MessageContent::text(text);
    }

    let mut embed = Embed::new(&format!("Moderation notice from {}", ctx.community))
        .with_description(&text)
        .with_color(color_for_action(&ctx.action))
        .with_timestamp(Utc::now());
    if let Some(tier) = &ctx.tier {
        embed = embed.with_field("Escalation", tier, true);
    }
    MessageContent::embed(embed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_connectors::{ConnectorError, MockPlatformConnector, PlatformOperation};

    fn settings(enabled: bool, use_embed: bool) -> ResolvedNotification {
        ResolvedNotification {
            enabled,
            template: "{action} in {community}: {reason}".to_string(),
            use_embed,
        }
    }

    #[tokio::test]
    async fn test_notify_renders_text() {
        let platform = Arc::new(MockPlatformConnector::new(10));
        let notifier = Notifier::new(platform.clone(), Arc::new(MetricsCollector::new()));
        let ctx = TemplateContext::new("warn", "spam", "Rustaceans");

        assert!(notifier.notify(5, &settings(true, false), &ctx).await);
        let sent = platform
            .successful_calls(PlatformOperation::DirectMessage)
            .await;
        assert_eq!(sent[0].detail, "warn in Rustaceans: spam");
    }

    #[tokio::test]
    async fn test_notify_embed() {
        let platform = Arc::new(MockPlatformConnector::new(10));
        let notifier = Notifier::new(platform.clone(), Arc::new(MetricsCollector::new()));
        let ctx = TemplateContext::new("timeout", "spam", "Rustaceans").with_tier("T1");

        assert!(notifier.notify(5, &settings(true, true), &ctx).await);
        let sent = platform
            .successful_calls(PlatformOperation::DirectMessage)
            .await;
        assert!(sent[0]
            .detail
            .starts_with("Moderation notice from Rustaceans\ntimeout in Rustaceans: spam"));
        assert!(sent[0].detail.contains("Escalation: T1"));
    }

    #[tokio::test]
    async fn test_disabled_notification_sends_nothing() {
        let platform = Arc::new(MockPlatformConnector::new(10));
        let notifier = Notifier::new(platform.clone(), Arc::new(MetricsCollector::new()));
        let ctx = TemplateContext::new("warn", "spam", "c");

        assert!(!notifier.notify(5, &settings(false, false), &ctx).await);
        assert!(platform.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_a_flag() {
        let platform = Arc::new(MockPlatformConnector::new(10));
        platform
            .fail_on(
                PlatformOperation::DirectMessage,
                ConnectorError::DirectMessagesClosed,
            )
            .await;
        let metrics = Arc::new(MetricsCollector::new());
        let notifier = Notifier::new(platform, metrics.clone());
        let ctx = TemplateContext::new("warn", "spam", "c");

        assert!(!notifier.notify(5, &settings(true, false), &ctx).await);
        assert_eq!(metrics.snapshot().notification_failures, 1);
    }
}
