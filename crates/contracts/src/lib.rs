//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Event timestamps are epoch milliseconds (i64) as published by the fusion stage
//! - Conversion to offset date-times uses the local system zone at conversion time

mod blueprint;
mod control;
mod error;
mod event;
mod mission;
mod sink;
mod transport;

pub use blueprint::*;
pub use control::ControlCommand;
pub use error::*;
pub use event::{to_local_offset, FusedEvent};
pub use mission::MissionId;
pub use sink::*;
pub use transport::{InboundMessage, LocalTransport, Transport};
