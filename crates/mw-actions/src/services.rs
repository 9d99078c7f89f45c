//! Service wiring.
//!
//! Builds the moderation services over one set of repositories and
//! connectors. Everything is constructor-injected; there are no globals.

use crate::automod::AutomodOrchestrator;
use crate::escalate::EscalationService;
use crate::executor::ActionExecutor;
use crate::modlog::ModLogDispatcher;
use crate::notify::Notifier;
use mw_connectors::{ModLogConnector, PlatformConnector};
use mw_core::db::{InfractionRepository, ModerationConfigRepository, RuleRepository};
use mw_core::InfractionLedger;
use mw_observability::{MetricsCollector, ModerationAuditLog};
use std::sync::Arc;

/// Capacity of the in-process audit trail.
pub const AUDIT_TRAIL_CAPACITY: usize = 10_000;

/// The full set of moderation services, sharing state.
#[derive(Clone)]
pub struct ModerationServices {
    pub ledger: Arc<InfractionLedger>,
    pub escalation: Arc<EscalationService>,
    pub executor: Arc<ActionExecutor>,
    pub automod: Arc<AutomodOrchestrator>,
    pub audit: ModerationAuditLog,
    pub metrics: Arc<MetricsCollector>,
}

impl ModerationServices {
    pub fn new(
        platform: Arc<dyn PlatformConnector>,
        mod_log: Option<Arc<dyn ModLogConnector>>,
        rules: Arc<dyn RuleRepository>,
        infractions: Arc<dyn InfractionRepository>,
        configs: Arc<dyn ModerationConfigRepository>,
    ) -> Self {
        Self::with_audit(
            platform,
            mod_log,
            rules,
            infractions,
            configs,
            ModerationAuditLog::new(AUDIT_TRAIL_CAPACITY),
        )
    }

    /// Like [`ModerationServices::new`] with a caller-supplied audit trail.
    pub fn with_audit(
        platform: Arc<dyn PlatformConnector>,
        mod_log: Option<Arc<dyn ModLogConnector>>,
        rules: Arc<dyn RuleRepository>,
        infractions: Arc<dyn InfractionRepository>,
        configs: Arc<dyn ModerationConfigRepository>,
        audit: ModerationAuditLog,
    ) -> Self {
        let metrics = Arc::new(MetricsCollector::new());
        let ledger = Arc::new(InfractionLedger::new(infractions, configs.clone()));
        let notifier = Arc::new(Notifier::new(platform.clone(), metrics.clone()));
        let dispatcher = Arc::new(ModLogDispatcher::new(
            platform.clone(),
            mod_log,
            metrics.clone(),
        ));
        let escalation = Arc::new(EscalationService::new(
            platform.clone(),
            configs.clone(),
            notifier.clone(),
            dispatcher.clone(),
            audit.clone(),
            metrics.clone(),
        ));
        let executor = Arc::new(ActionExecutor::new(
            platform.clone(),
            configs.clone(),
            ledger.clone(),
            escalation.clone(),
            notifier.clone(),
            dispatcher.clone(),
            audit.clone(),
            metrics.clone(),
        ));
        let automod = Arc::new(AutomodOrchestrator::new(
            platform,
            rules,
            configs,
            ledger.clone(),
            escalation.clone(),
            notifier,
            dispatcher,
            metrics.clone(),
        ));

        Self {
            ledger,
            escalation,
            executor,
            automod,
            audit,
            metrics,
        }
    }
}
