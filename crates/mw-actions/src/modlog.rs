//! Audit-log delivery.
//!
//! Entries go to the logging collaborator first. When it is absent or
//! declines, they are posted to the community's fallback log channel. One
//! attempt each; a failed entry is dropped.

use mw_connectors::{colors, Embed, MessageContent, ModLogConnector, PlatformConnector};
use mw_core::{MemberId, ModerationConfig};
use mw_observability::MetricsCollector;
use std::sync::Arc;
use tracing::{debug, warn};

/// Embed colour for an action name.
pub fn color_for_action(action: &str) -> u32 {
    match action {
        "ban" => colors::BAN,
        "kick" => colors::KICK,
        "timeout" | "mute" => colors::MUTE,
        "warn" | "automod" => colors::WARN,
        "unban" | "unmute" => colors::RESOLVED,
        _ => colors::INFO,
    }
}

/// Standard audit-log embed for a sanction.
pub fn sanction_embed(
    action: &str,
    target_id: MemberId,
    target_name: &str,
    moderator_id: Option<MemberId>,
    reason: &str,
) -> Embed {
    let moderator = moderator_id
        .map(|id| format!("<@{}>", id))
        .unwrap_or_else(|| "Automod".to_string());

    Embed::new(&format!("{} | {}", action, target_name))
        .with_color(color_for_action(action))
        .with_field("Member", &format!("{} ({})", target_name, target_id), true)
        .with_field("Moderator", &moderator, true)
        .with_field("Reason", reason, false)
        .with_timestamp(chrono::Utc::now())
}

/// Sends audit-log entries with channel fallback.
pub struct ModLogDispatcher {
    platform: Arc<dyn PlatformConnector>,
    collaborator: Option<Arc<dyn ModLogConnector>>,
    metrics: Arc<MetricsCollector>,
}

impl ModLogDispatcher {
    pub fn new(
        platform: Arc<dyn PlatformConnector>,
        collaborator: Option<Arc<dyn ModLogConnector>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            platform,
            collaborator,
            metrics,
        }
    }

    /// Delivers an entry. Returns whether any destination accepted it.
    pub async fn send(&self, config: &ModerationConfig, embed: &Embed) -> bool {
        if let Some(collaborator) = &self.collaborator {
            if collaborator
                .send_mod_action_log(config.community_id, embed)
                .await
            {
                return true;
            }
            debug!(
                community_id = config.community_id,
                "Logging collaborator declined entry, falling back to log channel"
            );
        }

        let Some(channel_id) = config.log_channel_id else {
            debug!(community_id = config.community_id, "No log channel configured");
            return false;
        };

        match self
            .platform
            .send_channel_message(channel_id, &MessageContent::embed(embed.clone()))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    community_id = config.community_id,
                    channel_id,
                    error = %e,
                    "Failed to post audit-log entry"
                );
                self.metrics.record_log_failure();
                false
            }
        }
    }
}
