//! Rich message embeds used for audit-log entries and member notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_FIELD_NAME_LEN: usize = 256;
pub const MAX_FIELD_VALUE_LEN: usize = 1024;
pub const MAX_FIELDS: usize = 25;

/// Embed accent colours by action severity.
pub mod colors {
    pub const INFO: u32 = 0x5865F2;
    pub const WARN: u32 = 0xFEE75C;
    pub const MUTE: u32 = 0xE67E22;
    pub const KICK: u32 = 0xED4245;
    pub const BAN: u32 = 0x992D22;
    pub const RESOLVED: u32 = 0x57F287;
}

/// One name/value pair inside an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// A rich message. Builders truncate to platform limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Embed {
    pub fn new(title: &str) -> Self {
        Self {
            title: truncate(title, MAX_TITLE_LEN),
            description: None,
            color: None,
            fields: Vec::new(),
            footer: None,
            timestamp: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(truncate(description, MAX_DESCRIPTION_LEN));
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    /// Adds a field. Fields beyond the platform maximum are dropped.
    pub fn with_field(mut self, name: &str, value: &str, inline: bool) -> Self {
        if self.fields.len() < MAX_FIELDS {
            self.fields.push(EmbedField {
                name: truncate(name, MAX_FIELD_NAME_LEN),
                value: truncate(value, MAX_FIELD_VALUE_LEN),
                inline,
            });
        }
        self
    }

    pub fn with_footer(mut self, footer: &str) -> Self {
        self.footer = Some(footer.to_string());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Value of the first field with the given name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Flattens the embed into plain text, one line per part.
    pub fn plain_text(&self) -> String {
        let mut lines = vec![self.title.clone()];
        if let Some(description) = &self.description {
            lines.push(description.clone());
        }
        for field in &self.fields {
            lines.push(format!("{}: {}", field.name, field.value));
        }
        if let Some(footer) = &self.footer {
            lines.push(footer.clone());
        }
        lines.join("\n")
    }
}

/// Truncates to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("ééééé", 3).chars().count(), 3);
    }

    #[test]
    fn test_field_limits() {
        let mut embed = Embed::new("t");
        for i in 0..30 {
            embed = embed.with_field(&format!("f{}", i), "v", true);
        }
        assert_eq!(embed.fields.len(), MAX_FIELDS);

        let long = "x".repeat(2000);
        let embed = Embed::new("t").with_field("long", &long, false);
        assert_eq!(
            embed.field("long").map(|v| v.chars().count()),
            Some(MAX_FIELD_VALUE_LEN)
        );
    }

    #[test]
    fn test_plain_text() {
        let embed = Embed::new("Member banned")
            .with_field("Reason", "spam", false)
            .with_footer("Case 1");
        assert_eq!(embed.plain_text(), "Member banned\nReason: spam\nCase 1");
    }
}
