//! Event queue
//!
//! Unbounded FIFO between the ingestion listener (producer) and the
//! dispatch loop (consumer), backed by `async-channel`.

use async_channel::{unbounded, Receiver, Sender, TryRecvError};
use contracts::{ContractError, FusedEvent};

/// Entry stored in the event queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEntry {
    /// A parsed event waiting for dispatch
    Event(FusedEvent),
    /// Wakes a consumer suspended in `dequeue`; never dispatched
    WakeUp,
}

/// Concurrency-safe event queue
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: Sender<QueueEntry>,
    rx: Receiver<QueueEntry>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Append an event without blocking
    ///
    /// # Errors
    /// `ContractError::QueueClosed` once the queue has been closed.
    pub fn enqueue(&self, event: FusedEvent) -> Result<(), ContractError> {
        self.tx
            .try_send(QueueEntry::Event(event))
            .map_err(|_| ContractError::QueueClosed)
    }

    /// Push a wake-up marker
    ///
    /// Returns false when the queue is already closed.
    pub fn wake(&self) -> bool {
        self.tx.try_send(QueueEntry::WakeUp).is_ok()
    }

    /// Non-blocking poll; `None` when nothing is queued
    pub fn try_dequeue(&self) -> Option<QueueEntry> {
        match self.rx.try_recv() {
            Ok(entry) => Some(entry),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Wait for the next entry
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<QueueEntry> {
        self.rx.recv().await.ok()
    }

    /// Close the queue; further `enqueue` calls fail
    ///
    /// Returns true if this call closed it.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event(n: i64) -> FusedEvent {
        FusedEvent::new("A", "B", format!("msg {n}"), n, n + 1)
    }

    #[test]
    fn test_fifo_order() {
        let queue = EventQueue::new();
        for i in 0..3 {
            queue.enqueue(event(i)).unwrap();
        }
        assert_eq!(queue.len(), 3);

        for i in 0..3 {
            assert_eq!(queue.try_dequeue(), Some(QueueEntry::Event(event(i))));
        }
        assert_eq!(queue.try_dequeue(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_after_close_fails() {
        let queue = EventQueue::new();
        assert!(queue.close());
        assert!(!queue.close());
        assert!(matches!(
            queue.enqueue(event(1)),
            Err(ContractError::QueueClosed)
        ));
        assert!(!queue.wake());
    }

    #[tokio::test]
    async fn test_wake_unblocks_waiting_consumer() {
        let queue = EventQueue::new();
        let consumer = queue.clone();
        let waiter = tokio::spawn(async move { consumer.dequeue().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(queue.wake());

        let entry = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry, Some(QueueEntry::WakeUp));
    }

    #[tokio::test]
    async fn test_dequeue_drains_then_ends_after_close() {
        let queue = EventQueue::new();
        queue.enqueue(event(1)).unwrap();
        queue.close();

        assert_eq!(queue.dequeue().await, Some(QueueEntry::Event(event(1))));
        assert_eq!(queue.dequeue().await, None);
    }
}
