//! Infraction records: the append-only point ledger entries.

use crate::member::{CommunityId, MemberId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an infraction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfractionSource {
    /// Recorded by the automod pipeline.
    Automod,
    /// Issued by a staff member.
    Manual,
}

impl InfractionSource {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            InfractionSource::Automod => "automod",
            InfractionSource::Manual => "manual",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "automod" => Some(InfractionSource::Automod),
            "manual" => Some(InfractionSource::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for InfractionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// One point-bearing violation. Only `active` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Infraction {
    pub id: Uuid,
    pub community_id: CommunityId,
    pub member_id: MemberId,
    /// Always positive.
    pub points: i64,
    pub source: InfractionSource,
    /// Name of the rule that matched (automod only).
    pub rule_name: Option<String>,
    /// Staff member who issued it (manual only).
    pub moderator_id: Option<MemberId>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    /// Cleared infractions no longer count toward active points.
    pub active: bool,
}

impl Infraction {
    /// Whether this infraction still counts, given an optional decay cutoff.
    pub fn counts_toward_points(&self, decay_cutoff: Option<DateTime<Utc>>) -> bool {
        if !self.active {
            return false;
        }
        match decay_cutoff {
            Some(cutoff) => self.created_at > cutoff,
            None => true,
        }
    }
}

/// Input for recording an infraction.
#[derive(Debug, Clone)]
pub struct NewInfraction {
    pub community_id: CommunityId,
    pub member_id: MemberId,
    pub points: i64,
    pub source: InfractionSource,
    pub reason: String,
    pub rule_name: Option<String>,
    pub moderator_id: Option<MemberId>,
}

impl NewInfraction {
    /// An infraction recorded by automod for a matched rule.
    pub fn automod(
        community_id: CommunityId,
        member_id: MemberId,
        points: i64,
        rule_name: &str,
        reason: &str,
    ) -> Self {
        Self {
            community_id,
            member_id,
            points,
            source: InfractionSource::Automod,
            reason: reason.to_string(),
            rule_name: Some(rule_name.to_string()),
            moderator_id: None,
        }
    }

    /// An infraction issued by a staff member.
    pub fn manual(
        community_id: CommunityId,
        member_id: MemberId,
        points: i64,
        moderator_id: Option<MemberId>,
        reason: &str,
    ) -> Self {
        Self {
            community_id,
            member_id,
            points,
            source: InfractionSource::Manual,
            reason: reason.to_string(),
            rule_name: None,
            moderator_id,
        }
    }

    /// Builds the stored record, stamped now.
    pub fn into_infraction(self) -> Infraction {
        Infraction {
            id: Uuid::new_v4(),
            community_id: self.community_id,
            member_id: self.member_id,
            points: self.points,
            source: self.source,
            rule_name: self.rule_name,
            moderator_id: self.moderator_id,
            reason: self.reason,
            created_at: Utc::now(),
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_counts_toward_points() {
        let mut infraction = NewInfraction::manual(1, 2, 3, Some(9), "spam").into_infraction();
        let now = Utc::now();

        assert!(infraction.counts_toward_points(None));
        assert!(infraction.counts_toward_points(Some(now - Duration::days(1))));

        infraction.created_at = now - Duration::days(10);
        assert!(!infraction.counts_toward_points(Some(now - Duration::days(7))));

        infraction.created_at = now;
        infraction.active = false;
        assert!(!infraction.counts_toward_points(None));
    }

    #[test]
    fn test_source_db_roundtrip() {
        for source in [InfractionSource::Automod, InfractionSource::Manual] {
            assert_eq!(InfractionSource::from_db_str(source.as_db_str()), Some(source));
        }
        assert_eq!(InfractionSource::from_db_str("other"), None);
    }
}
