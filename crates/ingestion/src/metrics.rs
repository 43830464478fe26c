//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion counters shared between the listener task and reporting
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total messages received on any topic
    pub messages_received: AtomicU64,

    /// Events decoded and enqueued
    pub events_enqueued: AtomicU64,

    /// Data payloads that failed to decode
    pub decode_errors: AtomicU64,

    /// Events rejected after `exit` or because the queue was closed
    pub events_rejected: AtomicU64,

    /// Control commands received (recognized or not)
    pub control_commands: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_control(&self) {
        self.control_commands.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            control_commands: self.control_commands.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub events_enqueued: u64,
    pub decode_errors: u64,
    pub events_rejected: u64,
    pub control_commands: u64,
}
