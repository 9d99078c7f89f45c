//! Replays events against a rule file with in-memory connectors.

use anyhow::{bail, Context, Result};
use mw_actions::{AutomodReport, ModerationServices};
use mw_connectors::{MockPlatformConnector, PlatformCall};
use mw_core::db::mocks::{
    MockInfractionRepository, MockModerationConfigRepository, MockRuleRepository,
};
use mw_core::{InboundEvent, MemberId, NewInfraction};
use mw_observability::MetricsSnapshot;
use mw_policy::RuleFile;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Everything a simulation did.
pub struct SimulationOutcome {
    pub reports: Vec<AutomodReport>,
    pub calls: Vec<PlatformCall>,
    pub metrics: MetricsSnapshot,
}

impl SimulationOutcome {
    pub fn to_json(&self) -> serde_json::Value {
        let calls: Vec<_> = self
            .calls
            .iter()
            .map(|c| {
                json!({
                    "operation": format!("{:?}", c.operation),
                    "target": c.target,
                    "detail": c.detail,
                    "reason": c.reason,
                    "success": c.success,
                })
            })
            .collect();
        json!({
            "reports": self.reports,
            "platform_calls": calls,
            "metrics": self.metrics,
        })
    }
}

/// Reads events from a JSON file holding one event or an array of them.
pub fn load_events(path: &Path) -> Result<Vec<InboundEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let events = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(events)
}

/// Runs every event through automod, in order, sharing one ledger.
///
/// Each event's actor is a member of the simulated community, ranked below a
/// bot at `bot_position`. With `prior_points`, every actor starts with one
/// manual infraction worth that many points.
pub async fn run_simulation(
    file: &RuleFile,
    events: &[InboundEvent],
    bot_position: i32,
    prior_points: i64,
) -> Result<SimulationOutcome> {
    if let Some(event) = events
        .iter()
        .find(|e| e.community_id() != file.community_id)
    {
        bail!(
            "Event for community {} does not match rule file community {}",
            event.community_id(),
            file.community_id
        );
    }

    let platform = Arc::new(MockPlatformConnector::new(bot_position));
    let services = ModerationServices::new(
        platform.clone(),
        None,
        Arc::new(MockRuleRepository::with_rules(file.to_rules())),
        Arc::new(MockInfractionRepository::new()),
        Arc::new(MockModerationConfigRepository::with_config(
            file.to_moderation_config(),
        )),
    );

    let mut seen: HashSet<MemberId> = HashSet::new();
    for event in events {
        let actor = event.actor();
        if !seen.insert(actor.id) {
            continue;
        }
        platform.add_member(actor.clone()).await;
        if prior_points > 0 {
            services
                .ledger
                .record(NewInfraction::manual(
                    file.community_id,
                    actor.id,
                    prior_points,
                    None,
                    "Prior infractions",
                ))
                .await?;
        }
    }

    let mut reports = Vec::with_capacity(events.len());
    for event in events {
        reports.push(services.automod.handle_event(event).await);
    }

    Ok(SimulationOutcome {
        reports,
        calls: platform.calls().await,
        metrics: services.metrics.snapshot(),
    })
}
