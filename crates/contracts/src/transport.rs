//! Transport trait - pub/sub channel boundary
//!
//! A transport delivers inbound messages as `(topic, payload)` pairs on a
//! channel it hands out at connect time; this trait covers the control side.

use bytes::Bytes;

use crate::ContractError;

/// Message received from the pub/sub broker
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Topic the message was published on
    pub topic: String,
    /// Opaque payload
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Pub/sub transport control interface
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Subscribe to a topic
    async fn subscribe(&self, topic: &str) -> Result<(), ContractError>;

    /// Publish a payload
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ContractError>;

    /// Disconnect from the broker
    ///
    /// Calling this on an already disconnected transport returns an error
    /// but has no other effect.
    async fn disconnect(&self) -> Result<(), ContractError>;
}
