//! Content extraction: turns an inbound event into the string a rule target inspects.
//!
//! Extraction is pure. A target that does not apply to the event kind yields an
//! empty string, which never matches.

use mw_core::{InboundEvent, RuleTarget};
use once_cell::sync::Lazy;
use regex::Regex;

/// Custom emoji tokens (`<:name:id>`, `<a:name:id>`) and Unicode pictographs.
static EMOJI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<a?:[A-Za-z0-9_~]+:\d+>|\p{Extended_Pictographic}")
        .expect("Invalid emoji extraction regex")
});

/// `http(s)://` URLs and bare invite links.
static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://\S+|\b(?:discord\.gg|discord(?:app)?\.com/invite)/[\w-]+")
        .expect("Invalid link extraction regex")
});

type Extractor = fn(&InboundEvent) -> String;

/// One extraction function per target.
const EXTRACTORS: [(RuleTarget, Extractor); 7] = [
    (RuleTarget::MessageText, message_text),
    (RuleTarget::MessageEmoji, message_emoji),
    (RuleTarget::Sticker, sticker_names),
    (RuleTarget::Link, links),
    (RuleTarget::Username, username),
    (RuleTarget::Nickname, nickname),
    (RuleTarget::ReactionEmoji, reaction_emoji),
];

/// Extracts the content `target` inspects from `event`. Empty when not applicable.
pub fn extract(event: &InboundEvent, target: RuleTarget) -> String {
    EXTRACTORS
        .iter()
        .find(|(t, _)| *t == target)
        .map(|(_, extractor)| extractor(event))
        .unwrap_or_default()
}

fn message_content(event: &InboundEvent) -> Option<&str> {
    match event {
        InboundEvent::MessageCreated { content, .. } => Some(content),
        _ => None,
    }
}

fn join_matches(pattern: &Regex, content: &str) -> String {
    pattern
        .find_iter(content)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn message_text(event: &InboundEvent) -> String {
    message_content(event).unwrap_or_default().to_string()
}

fn message_emoji(event: &InboundEvent) -> String {
    message_content(event)
        .map(|content| join_matches(&EMOJI_PATTERN, content))
        .unwrap_or_default()
}

fn links(event: &InboundEvent) -> String {
    message_content(event)
        .map(|content| join_matches(&LINK_PATTERN, content))
        .unwrap_or_default()
}

fn sticker_names(event: &InboundEvent) -> String {
    match event {
        InboundEvent::MessageCreated { stickers, .. } => stickers
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

fn username(event: &InboundEvent) -> String {
    match event {
        InboundEvent::MemberUpdated { member, .. } => member.username.clone(),
        _ => String::new(),
    }
}

fn nickname(event: &InboundEvent) -> String {
    match event {
        InboundEvent::MemberUpdated { member, .. } => member.nickname.clone().unwrap_or_default(),
        _ => String::new(),
    }
}

fn reaction_emoji(event: &InboundEvent) -> String {
    match event {
        InboundEvent::ReactionAdded { emoji, .. } => emoji.name().to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_core::{Member, ReactionEmoji, Sticker};

    fn message(content: &str) -> InboundEvent {
        InboundEvent::message(1, 2, 3, Member::new(4, "author"), content)
    }

    #[test]
    fn test_every_target_has_an_extractor() {
        for target in RuleTarget::ALL {
            assert!(EXTRACTORS.iter().any(|(t, _)| *t == target), "{}", target);
        }
    }

    #[test]
    fn test_message_text() {
        assert_eq!(extract(&message("hello"), RuleTarget::MessageText), "hello");
    }

    #[test]
    fn test_message_emoji() {
        let event = message("hi <:pepe:123> and <a:dance:456> 🔥 ok 😀");
        assert_eq!(
            extract(&event, RuleTarget::MessageEmoji),
            "<:pepe:123> <a:dance:456> 🔥 😀"
        );
        assert_eq!(extract(&message("plain"), RuleTarget::MessageEmoji), "");
    }

    #[test]
    fn test_links() {
        let event = message("see https://example.com/a?b=1 and discord.gg/abc123 or http://x.io");
        assert_eq!(
            extract(&event, RuleTarget::Link),
            "https://example.com/a?b=1 discord.gg/abc123 http://x.io"
        );
    }

    #[test]
    fn test_invite_inside_url_reported_once() {
        let event = message("join https://discord.gg/xyz");
        assert_eq!(extract(&event, RuleTarget::Link), "https://discord.gg/xyz");
    }

    #[test]
    fn test_stickers() {
        let event = InboundEvent::MessageCreated {
            community_id: 1,
            channel_id: 2,
            message_id: 3,
            author: Member::new(4, "a"),
            content: String::new(),
            stickers: vec![
                Sticker {
                    id: 1,
                    name: "wave".to_string(),
                },
                Sticker {
                    id: 2,
                    name: "party".to_string(),
                },
            ],
            attachments: Vec::new(),
        };
        assert_eq!(extract(&event, RuleTarget::Sticker), "wave party");
    }

    #[test]
    fn test_member_update_targets() {
        let event = InboundEvent::MemberUpdated {
            community_id: 1,
            member: Member::new(4, "newname"),
            old_username: Some("oldname".to_string()),
            old_nickname: None,
        };
        assert_eq!(extract(&event, RuleTarget::Username), "newname");
        assert_eq!(extract(&event, RuleTarget::Nickname), "");

        let event = InboundEvent::MemberUpdated {
            community_id: 1,
            member: Member::new(4, "newname").with_nickname("nick"),
            old_username: None,
            old_nickname: None,
        };
        assert_eq!(extract(&event, RuleTarget::Nickname), "nick");
    }

    #[test]
    fn test_reaction_emoji() {
        let event = InboundEvent::ReactionAdded {
            community_id: 1,
            channel_id: 2,
            message_id: 3,
            member: Member::new(4, "a"),
            emoji: ReactionEmoji::Custom {
                id: 9,
                name: "pepe".to_string(),
                animated: false,
            },
        };
        assert_eq!(extract(&event, RuleTarget::ReactionEmoji), "pepe");
    }

    #[test]
    fn test_inapplicable_target_is_empty() {
        assert_eq!(extract(&message("hello"), RuleTarget::Username), "");
        assert_eq!(extract(&message("hello"), RuleTarget::ReactionEmoji), "");
    }
}
