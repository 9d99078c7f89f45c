//! # mw-actions
//!
//! Sanction machinery for Mod Warden.
//!
//! - [`escalate`]: threshold-crossing escalation with an optional cooldown guard
//! - [`executor`]: guarded manual actions (ban, kick, mute, unmute, warn, unban)
//! - [`automod`]: the per-event automod pipeline
//! - [`notify`] / [`modlog`]: best-effort member notification and audit-log delivery

pub mod automod;
pub mod escalate;
pub mod executor;
pub mod modlog;
pub mod notify;
pub mod services;

pub use automod::{AutomodOrchestrator, AutomodReport, SkipReason, StepOutcome};
pub use escalate::{select_tier, EscalationGuard, EscalationOutcome, EscalationService};
pub use executor::{ActionError, ActionExecutor, ActionResult, ModAction, ModerationRequest};
pub use modlog::{sanction_embed, ModLogDispatcher};
pub use notify::Notifier;
pub use services::ModerationServices;
