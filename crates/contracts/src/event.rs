//! FusedEvent - Ingestion output, Dispatcher input
//!
//! A resolved communication record: who spoke to whom, what was said, and
//! the time span of the utterance (epoch milliseconds).

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Fused communication event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusedEvent {
    /// Speaker identifier (non-empty)
    pub sender: String,

    /// Addressee identifier (non-empty)
    pub receiver: String,

    /// Message text, may be empty
    pub text: String,

    /// Start of the utterance, epoch milliseconds
    pub from_time: i64,

    /// End of the utterance, epoch milliseconds
    pub to_time: i64,
}

/// Data channel wire format
///
/// Auxiliary fields published by the fusion stage (id, intent, frame, ...)
/// are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    sender: String,
    addressee: String,
    text: String,
    from_time: i64,
    to_time: i64,
}

impl FusedEvent {
    /// Create a new event
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        text: impl Into<String>,
        from_time: i64,
        to_time: i64,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            text: text.into(),
            from_time,
            to_time,
        }
    }

    /// Decode a data channel payload
    ///
    /// # Errors
    /// Returns `ContractError::Decode` when the payload is not UTF-8 JSON,
    /// misses a required field, or names an empty sender/addressee.
    /// `from_time > to_time` is passed through unchanged.
    pub fn from_payload(topic: &str, payload: &[u8]) -> Result<Self, ContractError> {
        let wire: WireEvent = serde_json::from_slice(payload)
            .map_err(|e| ContractError::decode(topic, e.to_string()))?;

        if wire.sender.is_empty() {
            return Err(ContractError::decode(topic, "empty sender"));
        }
        if wire.addressee.is_empty() {
            return Err(ContractError::decode(topic, "empty addressee"));
        }

        Ok(Self {
            sender: wire.sender,
            receiver: wire.addressee,
            text: wire.text,
            from_time: wire.from_time,
            to_time: wire.to_time,
        })
    }

    /// Start time in the local system zone
    pub fn start_time(&self) -> Option<DateTime<FixedOffset>> {
        to_local_offset(self.from_time)
    }

    /// End time in the local system zone
    pub fn end_time(&self) -> Option<DateTime<FixedOffset>> {
        to_local_offset(self.to_time)
    }

    /// Utterance duration in milliseconds (negative for inverted spans)
    pub fn duration_ms(&self) -> i64 {
        self.to_time - self.from_time
    }
}

/// Convert epoch milliseconds to an offset date-time in the local zone.
///
/// The offset depends on the host's zone at conversion time.
pub fn to_local_offset(epoch_ms: i64) -> Option<DateTime<FixedOffset>> {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|dt| dt.fixed_offset())
}
