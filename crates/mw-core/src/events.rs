//! Inbound platform events evaluated by automod.

use crate::member::{ChannelId, CommunityId, Member, MessageId};
use serde::{Deserialize, Serialize};

/// A sticker attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sticker {
    pub id: u64,
    pub name: String,
}

/// The emoji of a reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactionEmoji {
    /// A Unicode emoji such as "👍".
    Unicode { name: String },
    /// A community custom emoji.
    Custom {
        id: u64,
        name: String,
        #[serde(default)]
        animated: bool,
    },
}

impl ReactionEmoji {
    /// The emoji's name: the character itself for Unicode emoji.
    pub fn name(&self) -> &str {
        match self {
            ReactionEmoji::Unicode { name } => name,
            ReactionEmoji::Custom { name, .. } => name,
        }
    }
}

/// Kind of inbound event, used to decide which rule targets apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Reaction,
    MemberUpdate,
}

/// An event delivered by the platform client, already deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A message was posted.
    MessageCreated {
        community_id: CommunityId,
        channel_id: ChannelId,
        message_id: MessageId,
        author: Member,
        content: String,
        #[serde(default)]
        stickers: Vec<Sticker>,
        #[serde(default)]
        attachments: Vec<String>,
    },
    /// A reaction was added to a message.
    ReactionAdded {
        community_id: CommunityId,
        channel_id: ChannelId,
        message_id: MessageId,
        member: Member,
        emoji: ReactionEmoji,
    },
    /// A member changed their username or nickname. `member` is the new state.
    MemberUpdated {
        community_id: CommunityId,
        member: Member,
        #[serde(default)]
        old_username: Option<String>,
        #[serde(default)]
        old_nickname: Option<String>,
    },
}

impl InboundEvent {
    /// Creates a plain text message event.
    pub fn message(
        community_id: CommunityId,
        channel_id: ChannelId,
        message_id: MessageId,
        author: Member,
        content: &str,
    ) -> Self {
        InboundEvent::MessageCreated {
            community_id,
            channel_id,
            message_id,
            author,
            content: content.to_string(),
            stickers: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::MessageCreated { .. } => EventKind::Message,
            InboundEvent::ReactionAdded { .. } => EventKind::Reaction,
            InboundEvent::MemberUpdated { .. } => EventKind::MemberUpdate,
        }
    }

    pub fn community_id(&self) -> CommunityId {
        match self {
            InboundEvent::MessageCreated { community_id, .. }
            | InboundEvent::ReactionAdded { community_id, .. }
            | InboundEvent::MemberUpdated { community_id, .. } => *community_id,
        }
    }

    /// The member responsible for the event.
    pub fn actor(&self) -> &Member {
        match self {
            InboundEvent::MessageCreated { author, .. } => author,
            InboundEvent::ReactionAdded { member, .. } => member,
            InboundEvent::MemberUpdated { member, .. } => member,
        }
    }

    /// Channel the event happened in, if any.
    pub fn channel_id(&self) -> Option<ChannelId> {
        match self {
            InboundEvent::MessageCreated { channel_id, .. }
            | InboundEvent::ReactionAdded { channel_id, .. } => Some(*channel_id),
            InboundEvent::MemberUpdated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = InboundEvent::message(1, 2, 3, Member::new(42, "alice"), "hello");
        assert_eq!(event.kind(), EventKind::Message);
        assert_eq!(event.community_id(), 1);
        assert_eq!(event.actor().id, 42);
        assert_eq!(event.channel_id(), Some(2));
    }

    #[test]
    fn test_event_deserialization() {
        let json = serde_json::json!({
            "event": "reaction_added",
            "community_id": 1,
            "channel_id": 2,
            "message_id": 3,
            "member": {"id": 9, "username": "bob"},
            "emoji": {"type": "custom", "id": 77, "name": "pepe"}
        });

        let event: InboundEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.kind(), EventKind::Reaction);
        match event {
            InboundEvent::ReactionAdded { emoji, .. } => assert_eq!(emoji.name(), "pepe"),
            _ => panic!("expected reaction"),
        }
    }
}
