//! In-memory transport
//!
//! Loopback broker for tests and dry runs: publishing to a subscribed topic
//! delivers the message to the inbound receiver.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use contracts::{ContractError, InboundMessage, Transport};
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug)]
struct Inner {
    tx: mpsc::Sender<InboundMessage>,
    subscriptions: Mutex<HashSet<String>>,
    connected: AtomicBool,
    disconnect_calls: AtomicU64,
}

/// Loopback transport
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

impl InMemoryTransport {
    /// Create a connected transport and its inbound receiver
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<InboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let transport = Self {
            inner: Arc::new(Inner {
                tx,
                subscriptions: Mutex::new(HashSet::new()),
                connected: AtomicBool::new(true),
                disconnect_calls: AtomicU64::new(0),
            }),
        };
        (transport, rx)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.inner
            .subscriptions
            .lock()
            .map(|subs| subs.contains(topic))
            .unwrap_or(false)
    }

    /// Number of `disconnect` calls, successful or not
    pub fn disconnect_calls(&self) -> u64 {
        self.inner.disconnect_calls.load(Ordering::SeqCst)
    }
}

impl Transport for InMemoryTransport {
    async fn subscribe(&self, topic: &str) -> Result<(), ContractError> {
        if !self.is_connected() {
            return Err(ContractError::transport("subscribe", "not connected"));
        }
        self.inner
            .subscriptions
            .lock()
            .map_err(|_| ContractError::transport("subscribe", "subscription table poisoned"))?
            .insert(topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ContractError> {
        if !self.is_connected() {
            return Err(ContractError::transport("publish", "not connected"));
        }
        if !self.is_subscribed(topic) {
            trace!(topic, "No subscriber, message discarded");
            return Ok(());
        }
        self.inner
            .tx
            .send(InboundMessage::new(topic, payload))
            .await
            .map_err(|_| ContractError::transport("publish", "inbound receiver dropped"))
    }

    async fn disconnect(&self) -> Result<(), ContractError> {
        self.inner.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.inner.connected.swap(false, Ordering::SeqCst) {
            return Err(ContractError::transport("disconnect", "already disconnected"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let (transport, mut rx) = InMemoryTransport::new(8);
        transport.subscribe("mkm/result").await.unwrap();

        transport
            .publish("mkm/result", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        transport
            .publish("other/topic", Bytes::from_static(b"ignored"))
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, "mkm/result");
        assert_eq!(msg.payload, Bytes::from_static(b"{}"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_second_disconnect_errors() {
        let (transport, _rx) = InMemoryTransport::new(1);
        assert!(transport.disconnect().await.is_ok());
        let err = transport.disconnect().await.unwrap_err();
        assert!(matches!(err, ContractError::Transport { .. }));
        assert_eq!(transport.disconnect_calls(), 2);
        assert!(transport.publish("t", Bytes::new()).await.is_err());
    }
}
