//! # mw-connectors
//!
//! Interfaces to the chat platform and the optional audit-log collaborator.
//!
//! Moderation services only talk to the outside world through the traits in
//! this crate. The `mock` module provides in-memory implementations used by
//! tests and by the CLI's event simulator.

pub mod embed;
pub mod mock;
pub mod traits;

pub use embed::{colors, truncate, Embed, EmbedField};
pub use mock::{MockModLogConnector, MockPlatformConnector, PlatformCall, PlatformOperation};
pub use traits::{
    Connector, ConnectorError, ConnectorHealth, ConnectorResult, MessageContent, ModLogConnector,
    PlatformConnector,
};
