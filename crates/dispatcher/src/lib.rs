//! # Dispatcher
//!
//! Delivery side of the bridge.
//!
//! Responsibilities:
//! - Consume `FusedEvent`s from the event queue
//! - Deliver each event to the transcription sink and the command sink
//! - Keep the command-service session token fresh
//! - Isolate sink failures from each other and from the loop

pub mod api;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod mission;
pub mod session;
pub mod sinks;
pub mod testing;

pub use contracts::{EventSink, FusedEvent};
pub use dispatcher::{
    create_clients, create_dispatcher, BridgeDispatcher, DispatchReport, DispatchState,
    Dispatcher, SinkReport,
};
pub use error::DispatcherError;
pub use handle::DispatcherHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use mission::resolve_mission;
pub use session::{SessionCredential, SessionManager};
pub use sinks::{CommandSink, EvaluationLog, SinkOutcome, TranscriptionSink};
