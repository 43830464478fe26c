//! Bridge lifecycle.

mod orchestrator;
mod stats;

pub use orchestrator::Bridge;
pub use stats::{BridgeStats, ShutdownReason};
