//! Subcommands that need more than a few lines of wiring.

mod import;
mod simulate;
mod sweep;

pub use import::import_rule_file;
pub use simulate::{load_events, run_simulation, SimulationOutcome};
pub use sweep::sweep_community;
