//! Member notification templates.
//!
//! Settings resolve field by field through rule override, then tier override,
//! then the community defaults, then the built-in fallback. Templates use
//! `{placeholder}` syntax:
//!
//! | Placeholder | Value |
//! |---|---|
//! | `{action}` | action applied (`warn`, `timeout`, `kick`, ...) |
//! | `{reason}` | reason given or generated |
//! | `{community}` | community name |
//! | `{member}` | member display name |
//! | `{rule}` | matched rule name, empty for manual actions |
//! | `{points}` | points added by this action |
//! | `{total_points}` | active points after this action |
//! | `{duration}` | human readable duration, empty when not timed |
//! | `{tier}` | escalation tier name, empty when none fired |
//!
//! Unknown placeholders are left untouched.

use mw_core::{NotificationMode, NotificationOverride, NotificationSettings};
use serde::Serialize;

/// Template used when neither an override nor the community sets one.
pub const FALLBACK_TEMPLATE: &str =
    "You have received a {action} in {community}. Reason: {reason}";

/// Placeholders `render` substitutes.
pub const PLACEHOLDERS: [&str; 9] = [
    "action",
    "reason",
    "community",
    "member",
    "rule",
    "points",
    "total_points",
    "duration",
    "tier",
];

/// Effective notification settings for one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNotification {
    pub enabled: bool,
    pub template: String,
    pub use_embed: bool,
}

/// Resolves notification settings.
///
/// `rule` is only given for automod actions and `tier` only for escalations.
pub fn resolve(
    rule: Option<&NotificationOverride>,
    tier: Option<&NotificationOverride>,
    defaults: &NotificationSettings,
) -> ResolvedNotification {
    let layers = [rule, tier];

    let enabled = layers
        .iter()
        .flatten()
        .find_map(|o| o.enabled)
        .unwrap_or(defaults.mode != NotificationMode::Disabled);

    let template = layers
        .iter()
        .flatten()
        .find_map(|o| o.template.clone())
        .or_else(|| defaults.template.clone())
        .unwrap_or_else(|| FALLBACK_TEMPLATE.to_string());

    let use_embed = layers
        .iter()
        .flatten()
        .find_map(|o| o.use_embed)
        .unwrap_or(defaults.use_embed);

    ResolvedNotification {
        enabled,
        template,
        use_embed,
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateContext {
    pub action: String,
    pub reason: String,
    pub community: String,
    pub member: String,
    pub rule: Option<String>,
    pub points: Option<i64>,
    pub total_points: Option<i64>,
    pub duration_ms: Option<u64>,
    pub tier: Option<String>,
}

impl TemplateContext {
    pub fn new(action: &str, reason: &str, community: &str) -> Self {
        Self {
            action: action.to_string(),
            reason: reason.to_string(),
            community: community.to_string(),
            ..Default::default()
        }
    }

    pub fn with_member(mut self, member: &str) -> Self {
        self.member = member.to_string();
        self
    }

    pub fn with_rule(mut self, rule: &str) -> Self {
        self.rule = Some(rule.to_string());
        self
    }

    pub fn with_points(mut self, points: i64) -> Self {
        self.points = Some(points);
        self
    }

    pub fn with_total_points(mut self, total: i64) -> Self {
        self.total_points = Some(total);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_tier(mut self, tier: &str) -> Self {
        self.tier = Some(tier.to_string());
        self
    }

    fn value(&self, key: &str) -> Option<String> {
        let opt_num = |n: Option<i64>| n.map(|v| v.to_string()).unwrap_or_default();
        Some(match key {
            "action" => self.action.clone(),
            "reason" => self.reason.clone(),
            "community" => self.community.clone(),
            "member" => self.member.clone(),
            "rule" => self.rule.clone().unwrap_or_default(),
            "points" => opt_num(self.points),
            "total_points" => opt_num(self.total_points),
            "duration" => self.duration_ms.map(format_duration).unwrap_or_default(),
            "tier" => self.tier.clone().unwrap_or_default(),
            _ => return None,
        })
    }
}

/// Renders a template. Single pass: substituted values are not re-expanded.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match ctx.value(key) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Formats milliseconds as a compact duration such as `1d 2h` or `10m`.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    if total_secs == 0 {
        return format!("{}ms", ms);
    }

    let units = [
        (total_secs / 86_400, "d"),
        ((total_secs % 86_400) / 3_600, "h"),
        ((total_secs % 3_600) / 60, "m"),
        (total_secs % 60, "s"),
    ];
    units
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn override_with(
        enabled: Option<bool>,
        template: Option<&str>,
        use_embed: Option<bool>,
    ) -> NotificationOverride {
        NotificationOverride {
            enabled,
            template: template.map(str::to_string),
            use_embed,
        }
    }

    #[test]
    fn test_resolution_order() {
        let defaults = NotificationSettings {
            mode: NotificationMode::DirectMessage,
            template: Some("default {action}".to_string()),
            use_embed: false,
        };
        let rule = override_with(None, Some("rule {rule}"), None);
        let tier = override_with(Some(false), Some("tier {tier}"), Some(true));

        let resolved = resolve(Some(&rule), Some(&tier), &defaults);
        assert!(!resolved.enabled);
        assert_eq!(resolved.template, "rule {rule}");
        assert!(resolved.use_embed);

        let resolved = resolve(None, Some(&tier), &defaults);
        assert_eq!(resolved.template, "tier {tier}");

        let resolved = resolve(None, None, &defaults);
        assert!(resolved.enabled);
        assert_eq!(resolved.template, "default {action}");
        assert!(!resolved.use_embed);
    }

    #[test]
    fn test_fallback_template_and_disabled_mode() {
        let defaults = NotificationSettings {
            mode: NotificationMode::Disabled,
            template: None,
            use_embed: false,
        };
        let resolved = resolve(None, None, &defaults);
        assert!(!resolved.enabled);
        assert_eq!(resolved.template, FALLBACK_TEMPLATE);

        let enable = override_with(Some(true), None, None);
        assert!(resolve(Some(&enable), None, &defaults).enabled);
    }

    #[test]
    fn test_render_placeholders() {
        let ctx = TemplateContext::new("timeout", "spam", "Rustaceans")
            .with_rule("R1")
            .with_points(5)
            .with_total_points(12)
            .with_duration(600_000);
        let rendered = render(
            "{action} in {community} for {duration} ({rule}, +{points} = {total_points}): {reason}",
            &ctx,
        );
        assert_eq!(
            rendered,
            "timeout in Rustaceans for 10m (R1, +5 = 12): spam"
        );
    }

    #[test]
    fn test_render_leaves_unknown_and_unclosed() {
        let ctx = TemplateContext::new("warn", "{reason}", "c");
        assert_eq!(render("{unknown} {reason} {", &ctx), "{unknown} {reason} {");
        assert_eq!(render("{rule}|{tier}", &ctx), "|");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(600_000), "10m");
        assert_eq!(format_duration(90_061_000), "1d 1h 1m 1s");
        assert_eq!(format_duration(28 * 86_400_000), "28d");
        assert_eq!(format_duration(500), "500ms");
    }

    #[test]
    fn test_every_placeholder_is_known() {
        let ctx = TemplateContext::new("warn", "r", "c");
        for key in PLACEHOLDERS {
            assert!(ctx.value(key).is_some(), "{} not substituted", key);
        }
    }
}
