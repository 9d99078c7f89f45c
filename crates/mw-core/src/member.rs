//! Community members and the role hierarchy.

use serde::{Deserialize, Serialize};

/// Platform identifier of a community (guild).
pub type CommunityId = u64;
/// Platform identifier of a member (user).
pub type MemberId = u64;
/// Platform identifier of a role.
pub type RoleId = u64;
/// Platform identifier of a channel.
pub type ChannelId = u64;
/// Platform identifier of a message.
pub type MessageId = u64;

/// A role held by a member, with its rank in the community's role list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleRef {
    /// Role ID.
    pub id: RoleId,
    /// Position in the role hierarchy (higher outranks lower).
    pub position: i32,
}

impl RoleRef {
    pub fn new(id: RoleId, position: i32) -> Self {
        Self { id, position }
    }
}

/// A member of a community as seen at the time of an event or action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member ID.
    pub id: MemberId,
    /// Account username.
    pub username: String,
    /// Per-community nickname, if set.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Whether the account is a bot.
    #[serde(default)]
    pub bot: bool,
    /// Whether the account is a platform system account.
    #[serde(default)]
    pub system: bool,
    /// Roles currently held.
    #[serde(default)]
    pub roles: Vec<RoleRef>,
}

impl Member {
    /// Creates a member with no roles.
    pub fn new(id: MemberId, username: &str) -> Self {
        Self {
            id,
            username: username.to_string(),
            nickname: None,
            bot: false,
            system: false,
            roles: Vec::new(),
        }
    }

    /// Adds a role.
    pub fn with_role(mut self, id: RoleId, position: i32) -> Self {
        self.roles.push(RoleRef::new(id, position));
        self
    }

    /// Sets the nickname.
    pub fn with_nickname(mut self, nickname: &str) -> Self {
        self.nickname = Some(nickname.to_string());
        self
    }

    /// Marks the member as a bot account.
    pub fn as_bot(mut self) -> Self {
        self.bot = true;
        self
    }

    /// Highest role position held, 0 when the member only has the implicit base role.
    pub fn highest_role_position(&self) -> i32 {
        self.roles.iter().map(|r| r.position).max().unwrap_or(0)
    }

    /// Checks if the member holds the given role.
    pub fn has_role(&self, role_id: RoleId) -> bool {
        self.roles.iter().any(|r| r.id == role_id)
    }

    /// Checks if the member holds any of the given roles.
    pub fn has_any_role(&self, role_ids: &[RoleId]) -> bool {
        role_ids.iter().any(|id| self.has_role(*id))
    }

    /// Whether this account is automated (bot or system) and never evaluated by automod.
    pub fn is_automated(&self) -> bool {
        self.bot || self.system
    }

    /// Checks whether this member strictly outranks another.
    pub fn outranks(&self, other: &Member) -> bool {
        self.highest_role_position() > other.highest_role_position()
    }

    /// Name shown to staff: nickname if set, else username.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_role_position() {
        let member = Member::new(1, "alice").with_role(10, 3).with_role(11, 7);
        assert_eq!(member.highest_role_position(), 7);
        assert_eq!(Member::new(2, "bob").highest_role_position(), 0);
    }

    #[test]
    fn test_outranks_is_strict() {
        let a = Member::new(1, "a").with_role(10, 5);
        let b = Member::new(2, "b").with_role(11, 5);
        assert!(!a.outranks(&b));
        assert!(!b.outranks(&a));

        let c = Member::new(3, "c").with_role(12, 6);
        assert!(c.outranks(&a));
    }

    #[test]
    fn test_display_name() {
        let member = Member::new(1, "alice");
        assert_eq!(member.display_name(), "alice");
        assert_eq!(member.with_nickname("Ally").display_name(), "Ally");
    }
}
