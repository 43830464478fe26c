//! Ingestion listener
//!
//! Routes inbound broker messages by topic. Data payloads are decoded into
//! `FusedEvent`s and enqueued; control payloads may request shutdown. The
//! listener never talks to a sink.

use std::sync::Arc;

use contracts::{ControlCommand, FusedEvent, InboundMessage, TopicConfig};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::metrics::IngestionMetrics;
use crate::queue::EventQueue;

/// Topic router feeding the event queue
pub struct IngestionListener {
    topics: TopicConfig,
    queue: EventQueue,
    exit: CancellationToken,
    metrics: Arc<IngestionMetrics>,
}

impl IngestionListener {
    /// Create a listener
    ///
    /// `exit` is cancelled when the control channel receives `exit`.
    pub fn new(topics: TopicConfig, queue: EventQueue, exit: CancellationToken) -> Self {
        Self {
            topics,
            queue,
            exit,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Handle one inbound message
    ///
    /// Returns whether the message was handled. Decode failures, data after
    /// `exit`, empty commands, a closed queue and unknown topics all yield
    /// `false`.
    pub fn handle_message(&self, message: &InboundMessage) -> bool {
        self.metrics.record_received();
        observability::record_message_received(&message.topic);

        if message.topic == self.topics.data {
            self.handle_data(message)
        } else if message.topic == self.topics.control {
            self.handle_control(message)
        } else {
            debug!(topic = %message.topic, "Message on unrouted topic ignored");
            false
        }
    }

    fn handle_data(&self, message: &InboundMessage) -> bool {
        if self.exit.is_cancelled() {
            self.metrics.record_rejected();
            debug!(topic = %message.topic, "Shutdown requested, data message rejected");
            return false;
        }

        let event = match FusedEvent::from_payload(&message.topic, &message.payload) {
            Ok(event) => event,
            Err(e) => {
                self.metrics.record_decode_error();
                observability::record_decode_error(&message.topic);
                warn!(topic = %message.topic, error = %e, "Dropping undecodable payload");
                return false;
            }
        };

        debug!(sender = %event.sender, receiver = %event.receiver, "Event received");

        match self.queue.enqueue(event) {
            Ok(()) => {
                self.metrics.record_enqueued();
                observability::record_queue_depth(self.queue.len());
                true
            }
            Err(e) => {
                self.metrics.record_rejected();
                warn!(error = %e, "Event rejected, queue closed");
                false
            }
        }
    }

    fn handle_control(&self, message: &InboundMessage) -> bool {
        let Some(command) = ControlCommand::parse(&message.payload) else {
            debug!("Empty control command ignored");
            return false;
        };

        self.metrics.record_control();
        observability::record_control_command(&command.to_string());

        match command {
            ControlCommand::Exit => {
                info!("Exit command received, requesting shutdown");
                self.exit.cancel();
            }
            ControlCommand::Unknown(cmd) => {
                warn!(command = %cmd, "Unknown control command");
            }
        }
        true
    }

    /// Run the listener until `stop` is cancelled or the transport closes
    #[instrument(name = "ingestion_listener", skip_all)]
    pub async fn run(self, mut rx: mpsc::Receiver<InboundMessage>, stop: CancellationToken) {
        info!(data = %self.topics.data, control = %self.topics.control, "Listener started");

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => {
                        self.handle_message(&message);
                    }
                    None => {
                        debug!("Inbound channel closed");
                        break;
                    }
                },
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            received = snapshot.messages_received,
            enqueued = snapshot.events_enqueued,
            decode_errors = snapshot.decode_errors,
            "Listener stopped"
        );
    }

    /// Spawn `run` on the runtime
    pub fn spawn(
        self,
        rx: mpsc::Receiver<InboundMessage>,
        stop: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(rx, stop))
    }
}
