//! TranscriptionSink - forwards each event as one transcript entry

use contracts::{ContractError, EventSink, FusedEvent};
use tracing::{debug, instrument};

use crate::api::{TranscriptEntry, TranscriptionApi};

/// Default sink name
pub const TRANSCRIPTION_SINK: &str = "transcription";

/// Sink writing events to the transcription service
pub struct TranscriptionSink<A> {
    name: String,
    api: A,
}

impl<A: TranscriptionApi + Sync> TranscriptionSink<A> {
    pub fn new(api: A) -> Self {
        Self {
            name: TRANSCRIPTION_SINK.to_string(),
            api,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn entry(&self, event: &FusedEvent) -> Result<TranscriptEntry, ContractError> {
        let (Some(start_time), Some(end_time)) = (event.start_time(), event.end_time()) else {
            return Err(ContractError::delivery(
                &self.name,
                format!(
                    "timestamps out of range: {}..{}",
                    event.from_time, event.to_time
                ),
            ));
        };

        Ok(TranscriptEntry {
            sender: event.sender.clone(),
            receiver: event.receiver.clone(),
            message: event.text.clone(),
            start_time,
            end_time,
        })
    }
}

impl<A: TranscriptionApi + Send + Sync> EventSink for TranscriptionSink<A> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "transcription_sink_write",
        skip(self, event),
        fields(sink = %self.name, sender = %event.sender)
    )]
    async fn write(&mut self, event: &FusedEvent) -> Result<(), ContractError> {
        let entry = self.entry(event)?;
        self.api
            .add_messages(std::slice::from_ref(&entry))
            .await
            .map_err(|e| ContractError::delivery(&self.name, e.to_string()))?;
        debug!(sink = %self.name, "Transcript entry stored");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "TranscriptionSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTranscriptionApi;
    use contracts::to_local_offset;

    #[tokio::test]
    async fn test_write_converts_timestamps_to_local_offset() {
        let api = FakeTranscriptionApi::new();
        let mut sink = TranscriptionSink::new(api.clone());
        let event = FusedEvent::new("A", "B", "hello", 1_700_000_000_000, 1_700_000_005_000);

        sink.write(&event).await.unwrap();

        let entries = api.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sender, "A");
        assert_eq!(entries[0].receiver, "B");
        assert_eq!(entries[0].message, "hello");
        assert_eq!(Some(entries[0].start_time), to_local_offset(1_700_000_000_000));
        assert_eq!(Some(entries[0].end_time), to_local_offset(1_700_000_005_000));
        assert_eq!(
            (entries[0].end_time - entries[0].start_time).num_milliseconds(),
            5_000
        );
    }

    #[tokio::test]
    async fn test_write_failure_is_delivery_error() {
        let api = FakeTranscriptionApi::new();
        api.set_fail(true);
        let mut sink = TranscriptionSink::new(api.clone());

        let err = sink
            .write(&FusedEvent::new("A", "B", "x", 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ContractError::Delivery { ref sink_name, .. } if sink_name == "transcription"
        ));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_never_sent() {
        let api = FakeTranscriptionApi::new();
        let mut sink = TranscriptionSink::new(api.clone());

        let result = sink.write(&FusedEvent::new("A", "B", "x", i64::MAX, i64::MAX)).await;
        assert!(result.is_err());
        assert_eq!(api.calls(), 0);
    }
}
