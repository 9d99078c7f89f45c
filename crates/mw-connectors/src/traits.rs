//! Connector trait definitions for Mod Warden.
//!
//! These are the only seams between moderation logic and the chat platform.
//! Implementations translate each primitive into the platform's API; the
//! moderation services never retry a call.

use crate::embed::Embed;
use async_trait::async_trait;
use mw_core::{ChannelId, CommunityId, Member, MemberId, MessageId, ReactionEmoji, RoleId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in connectors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("Missing permission: {0}")]
    PermissionDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Recipient does not accept direct messages")]
    DirectMessagesClosed,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Whether the failure is likely to clear on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionFailed(_)
                | ConnectorError::RateLimited(_)
                | ConnectorError::Timeout(_)
        )
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Health status of a connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    /// Connector is healthy and operational.
    Healthy,
    /// Connector is degraded but still functional.
    Degraded(String),
    /// Connector is unhealthy and not operational.
    Unhealthy(String),
}

/// Body of an outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    Embed { embed: Embed },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text { text: text.into() }
    }

    pub fn embed(embed: Embed) -> Self {
        MessageContent::Embed { embed }
    }

    /// Plain-text rendering, used in logs and mocks.
    pub fn as_plain_text(&self) -> String {
        match self {
            MessageContent::Text { text } => text.clone(),
            MessageContent::Embed { embed } => embed.plain_text(),
        }
    }
}

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name.
    fn name(&self) -> &str;

    /// Returns the connector type (e.g., "platform", "mod_log").
    fn connector_type(&self) -> &str;

    /// Checks the health of the connector.
    async fn health_check(&self) -> ConnectorResult<ConnectorHealth>;
}

/// Outbound primitives of the chat platform.
#[async_trait]
pub trait PlatformConnector: Connector {
    /// Display name of a community, used in notifications.
    async fn community_name(&self, community_id: CommunityId) -> ConnectorResult<String>;

    /// Looks up a current member. `None` if the user is not in the community.
    async fn get_member(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
    ) -> ConnectorResult<Option<Member>>;

    /// The moderation bot's own membership in a community.
    async fn bot_member(&self, community_id: CommunityId) -> ConnectorResult<Member>;

    /// Applies a native timeout. `duration_ms` is already clamped by the caller.
    async fn timeout(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        duration_ms: u64,
        reason: &str,
    ) -> ConnectorResult<()>;

    /// Lifts a native timeout.
    async fn remove_timeout(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        reason: &str,
    ) -> ConnectorResult<()>;

    async fn kick(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        reason: &str,
    ) -> ConnectorResult<()>;

    /// Bans a user, deleting `delete_message_seconds` of their message history.
    async fn ban(
        &self,
        community_id: CommunityId,
        user_id: MemberId,
        delete_message_seconds: u32,
        reason: &str,
    ) -> ConnectorResult<()>;

    async fn unban(
        &self,
        community_id: CommunityId,
        user_id: MemberId,
        reason: &str,
    ) -> ConnectorResult<()>;

    async fn add_role(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        role_id: RoleId,
        reason: &str,
    ) -> ConnectorResult<()>;

    async fn remove_role(
        &self,
        community_id: CommunityId,
        member_id: MemberId,
        role_id: RoleId,
        reason: &str,
    ) -> ConnectorResult<()>;

    async fn send_direct_message(
        &self,
        member_id: MemberId,
        content: &MessageContent,
    ) -> ConnectorResult<()>;

    async fn send_channel_message(
        &self,
        channel_id: ChannelId,
        content: &MessageContent,
    ) -> ConnectorResult<()>;

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> ConnectorResult<()>;

    /// Removes one member's reaction from a message.
    async fn remove_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        member_id: MemberId,
        emoji: &ReactionEmoji,
    ) -> ConnectorResult<()>;
}

/// Optional audit-log collaborator.
///
/// Returns `true` only when it actually delivered the entry; on `false` the
/// caller falls back to the community's log channel.
#[async_trait]
pub trait ModLogConnector: Connector {
    async fn send_mod_action_log(&self, community_id: CommunityId, embed: &Embed) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(ConnectorError::RateLimited(5).is_transient());
        assert!(ConnectorError::Timeout("slow".into()).is_transient());
        assert!(!ConnectorError::PermissionDenied("ban".into()).is_transient());
        assert!(!ConnectorError::DirectMessagesClosed.is_transient());
    }

    #[test]
    fn test_message_content_plain_text() {
        assert_eq!(MessageContent::text("hi").as_plain_text(), "hi");

        let embed = Embed::new("Warned").with_description("be nice");
        assert_eq!(
            MessageContent::embed(embed).as_plain_text(),
            "Warned\nbe nice"
        );
    }
}
