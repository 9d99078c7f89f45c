//! Mock connectors for testing and dry runs.
//!
//! The platform mock keeps an in-memory member list, applies sanctions to it,
//! records every call for test verification and supports per-operation failure
//! injection.

use crate::embed::Embed;
use crate::traits::{
    Connector, ConnectorError, ConnectorHealth, ConnectorResult, MessageContent, ModLogConnector,
    PlatformConnector,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mw_core::{
    ChannelId, CommunityId, Member, MemberId, MessageId, ReactionEmoji, RoleId, RoleRef,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Platform primitives, used to target failure injection and filter records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformOperation {
    GetMember,
    Timeout,
    RemoveTimeout,
    Kick,
    Ban,
    Unban,
    AddRole,
    RemoveRole,
    DirectMessage,
    ChannelMessage,
    DeleteMessage,
    RemoveReaction,
}

/// A recorded platform call.
#[derive(Debug, Clone)]
pub struct PlatformCall {
    pub operation: PlatformOperation,
    /// Member, user, channel or message the call addressed.
    pub target: u64,
    /// Operation-specific detail: duration, role id, message text.
    pub detail: String,
    pub reason: Option<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Mock platform connector.
pub struct MockPlatformConnector {
    name: String,
    community_name: String,
    bot: Member,
    members: Arc<RwLock<HashMap<MemberId, Member>>>,
    timeouts: Arc<RwLock<HashMap<MemberId, DateTime<Utc>>>>,
    bans: Arc<RwLock<HashSet<MemberId>>>,
    failures: Arc<RwLock<HashMap<PlatformOperation, ConnectorError>>>,
    calls: Arc<RwLock<Vec<PlatformCall>>>,
}

impl MockPlatformConnector {
    /// Creates a mock whose bot holds a role at `bot_role_position`.
    pub fn new(bot_role_position: i32) -> Self {
        Self {
            name: "mock-platform".to_string(),
            community_name: "Test Community".to_string(),
            bot: Member::new(0, "mod-warden").as_bot().with_role(1, bot_role_position),
            members: Arc::new(RwLock::new(HashMap::new())),
            timeouts: Arc::new(RwLock::new(HashMap::new())),
            bans: Arc::new(RwLock::new(HashSet::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_community_name(mut self, name: &str) -> Self {
        self.community_name = name.to_string();
        self
    }

    /// Adds or replaces a member.
    pub async fn add_member(&self, member: Member) {
        self.members.write().await.insert(member.id, member);
    }

    /// Makes every call to `operation` fail with `error` until cleared.
    pub async fn fail_on(&self, operation: PlatformOperation, error: ConnectorError) {
        self.failures.write().await.insert(operation, error);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// All recorded calls, in order.
    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.calls.read().await.clone()
    }

    /// Successful calls of one operation.
    pub async fn successful_calls(&self, operation: PlatformOperation) -> Vec<PlatformCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation == operation && c.success)
            .cloned()
            .collect()
    }

    /// Number of attempts (successful or not) of one operation.
    pub async fn call_count(&self, operation: PlatformOperation) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub async fn is_member(&self, member_id: MemberId) -> bool {
        self.members.read().await.contains_key(&member_id)
    }

    pub async fn is_banned(&self, user_id: MemberId) -> bool {
        self.bans.read().await.contains(&user_id)
    }

    /// End of the member's native timeout, if one is active.
    pub async fn timeout_until(&self, member_id: MemberId) -> Option<DateTime<Utc>> {
        self.timeouts.read().await.get(&member_id).copied()
    }

    pub async fn member_has_role(&self, member_id: MemberId, role_id: RoleId) -> bool {
        self.members
            .read()
            .await
            .get(&member_id)
            .map(|m| m.has_role(role_id))
            .unwrap_or(false)
    }

    /// Records the attempt and returns the injected failure, if any.
    async fn record(
        &self,
        operation: PlatformOperation,
        target: u64,
        detail: String,
        reason: Option<&str>,
    ) -> ConnectorResult<()> {
        let failure = self.failures.read().await.get(&operation).cloned();
        self.calls.write().await.push(PlatformCall {
            operation,
            target,
            detail,
            reason: reason.map(str::to_string),
            success: failure.is_none(),
            timestamp: Utc::now(),
        });
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn require_member(&self, member_id: MemberId) -> ConnectorResult<()> {
        if self.is_member(member_id).await {
            Ok(())
        } else {
            Err(ConnectorError::NotFound(format!("member {}", member_id)))
        }
    }
}

#[async_trait]
impl Connector for MockPlatformConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn connector_type(&self) -> &str {
        "platform"
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(ConnectorHealth::Healthy)
    }
}

#[async_trait]
impl PlatformConnector for MockPlatformConnector {
    async fn community_name(&self, _community_id: CommunityId) -> ConnectorResult<String> {
        Ok(self.community_name.clone())
    }

    async fn get_member(
        &self,
        _community_id: CommunityId,
        member_id: MemberId,
    ) -> ConnectorResult<Option<Member>> {
        self.record(PlatformOperation::GetMember, member_id, String::new(), None)
            .await?;
        Ok(self.members.read().await.get(&member_id).cloned())
    }

    async fn bot_member(&self, _community_id: CommunityId) -> ConnectorResult<Member> {
        Ok(self.bot.clone())
    }

    async fn timeout(
        &self,
        _community_id: CommunityId,
        member_id: MemberId,
        duration_ms: u64,
        reason: &str,
    ) -> ConnectorResult<()> {
        self.record(
            PlatformOperation::Timeout,
            member_id,
            duration_ms.to_string(),
            Some(reason),
        )
        .await?;
        self.require_member(member_id).await?;
        let until = Utc::now() + chrono::Duration::milliseconds(duration_ms as i64);
        self.timeouts.write().await.insert(member_id, until);
        Ok(())
    }

    async fn remove_timeout(
        &self,
        _community_id: CommunityId,
        member_id: MemberId,
        reason: &str,
    ) -> ConnectorResult<()> {
        self.record(
            PlatformOperation::RemoveTimeout,
            member_id,
            String::new(),
            Some(reason),
        )
        .await?;
        self.timeouts.write().await.remove(&member_id);
        Ok(())
    }

    async fn kick(
        &self,
        _community_id: CommunityId,
        member_id: MemberId,
        reason: &str,
    ) -> ConnectorResult<()> {
        self.record(PlatformOperation::Kick, member_id, String::new(), Some(reason))
            .await?;
        self.require_member(member_id).await?;
        self.members.write().await.remove(&member_id);
        Ok(())
    }

    async fn ban(
        &self,
        _community_id: CommunityId,
        user_id: MemberId,
        delete_message_seconds: u32,
        reason: &str,
    ) -> ConnectorResult<()> {
        self.record(
            PlatformOperation::Ban,
            user_id,
            delete_message_seconds.to_string(),
            Some(reason),
        )
        .await?;
        self.members.write().await.remove(&user_id);
        self.bans.write().await.insert(user_id);
        Ok(())
    }

    async fn unban(
        &self,
        _community_id: CommunityId,
        user_id: MemberId,
        reason: &str,
    ) -> ConnectorResult<()> {
        self.record(PlatformOperation::Unban, user_id, String::new(), Some(reason))
            .await?;
        if self.bans.write().await.remove(&user_id) {
            Ok(())
        } else {
            Err(ConnectorError::NotFound(format!("ban for user {}", user_id)))
        }
    }

    async fn add_role(
        &self,
        _community_id: CommunityId,
        member_id: MemberId,
        role_id: RoleId,
        reason: &str,
    ) -> ConnectorResult<()> {
        self.record(
            PlatformOperation::AddRole,
            member_id,
            role_id.to_string(),
            Some(reason),
        )
        .await?;
        let mut members = self.members.write().await;
        let member = members
            .get_mut(&member_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("member {}", member_id)))?;
        if !member.has_role(role_id) {
            member.roles.push(RoleRef::new(role_id, 0));
        }
        Ok(())
    }

    async fn remove_role(
        &self,
        _community_id: CommunityId,
        member_id: MemberId,
        role_id: RoleId,
        reason: &str,
    ) -> ConnectorResult<()> {
        self.record(
            PlatformOperation::RemoveRole,
            member_id,
            role_id.to_string(),
            Some(reason),
        )
        .await?;
        let mut members = self.members.write().await;
        let member = members
            .get_mut(&member_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("member {}", member_id)))?;
        member.roles.retain(|r| r.id != role_id);
        Ok(())
    }

    async fn send_direct_message(
        &self,
        member_id: MemberId,
        content: &MessageContent,
    ) -> ConnectorResult<()> {
        self.record(
            PlatformOperation::DirectMessage,
            member_id,
            content.as_plain_text(),
            None,
        )
        .await
    }

    async fn send_channel_message(
        &self,
        channel_id: ChannelId,
        content: &MessageContent,
    ) -> ConnectorResult<()> {
        self.record(
            PlatformOperation::ChannelMessage,
            channel_id,
            content.as_plain_text(),
            None,
        )
        .await
    }

    async fn delete_message(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
    ) -> ConnectorResult<()> {
        self.record(
            PlatformOperation::DeleteMessage,
            message_id,
            String::new(),
            None,
        )
        .await
    }

    async fn remove_reaction(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        member_id: MemberId,
        emoji: &ReactionEmoji,
    ) -> ConnectorResult<()> {
        self.record(
            PlatformOperation::RemoveReaction,
            message_id,
            format!("{}:{}", member_id, emoji.name()),
            None,
        )
        .await
    }
}

/// Mock audit-log collaborator that records embeds.
pub struct MockModLogConnector {
    delivers: AtomicBool,
    entries: Arc<RwLock<Vec<(CommunityId, Embed)>>>,
}

impl Default for MockModLogConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModLogConnector {
    /// Creates a collaborator that delivers every entry.
    pub fn new() -> Self {
        Self {
            delivers: AtomicBool::new(true),
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// When `false`, entries are rejected so callers fall back.
    pub fn set_delivers(&self, delivers: bool) {
        self.delivers.store(delivers, Ordering::SeqCst);
    }

    pub async fn entries(&self) -> Vec<(CommunityId, Embed)> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl Connector for MockModLogConnector {
    fn name(&self) -> &str {
        "mock-mod-log"
    }

    fn connector_type(&self) -> &str {
        "mod_log"
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        if self.delivers.load(Ordering::SeqCst) {
            Ok(ConnectorHealth::Healthy)
        } else {
            Ok(ConnectorHealth::Degraded("Not delivering".to_string()))
        }
    }
}

#[async_trait]
impl ModLogConnector for MockModLogConnector {
    async fn send_mod_action_log(&self, community_id: CommunityId, embed: &Embed) -> bool {
        if !self.delivers.load(Ordering::SeqCst) {
            return false;
        }
        self.entries
            .write()
            .await
            .push((community_id, embed.clone()));
        true
    }
}
