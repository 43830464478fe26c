//! # Ingestion
//!
//! Inbound side of the bridge.
//!
//! Responsibilities:
//! - Connect to the MQTT broker and forward publishes as `InboundMessage`s
//! - Route data and control topics
//! - Decode data payloads into `FusedEvent`s and buffer them in the `EventQueue`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{EventQueue, IngestionListener, MqttTransport};
//! use contracts::Transport;
//!
//! let (transport, rx) = MqttTransport::connect(&blueprint.broker);
//! transport.subscribe(&blueprint.topics.data).await?;
//! transport.subscribe(&blueprint.topics.control).await?;
//!
//! let queue = EventQueue::new();
//! let exit = CancellationToken::new();
//! let listener = IngestionListener::new(blueprint.topics.clone(), queue.clone(), exit.clone());
//! let task = listener.spawn(rx, CancellationToken::new());
//! ```
//!
//! ## Testing
//!
//! `InMemoryTransport` loops published messages back to the inbound receiver,
//! so the full ingestion path runs without a broker.

mod listener;
mod memory;
mod metrics;
mod mqtt;
mod queue;

// Re-exports
pub use listener::IngestionListener;
pub use memory::InMemoryTransport;
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use mqtt::MqttTransport;
pub use queue::{EventQueue, QueueEntry};
