//! Bridge metrics
//!
//! Thin helpers over the `metrics` facade plus an in-memory latency
//! aggregator used for the shutdown summary.

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// Record a message received from the broker
pub fn record_message_received(topic: &str) {
    counter!(
        "fusion_bridge_messages_received_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// Record a data channel payload that failed to decode
pub fn record_decode_error(topic: &str) {
    counter!(
        "fusion_bridge_decode_errors_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// Record a control channel command
pub fn record_control_command(command: &str) {
    counter!(
        "fusion_bridge_control_commands_total",
        "command" => command.to_string()
    )
    .increment(1);
}

/// Record one sink delivery attempt
pub fn record_delivery(sink_name: &str, success: bool, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "fusion_bridge_deliveries_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!(
        "fusion_bridge_delivery_latency_ms",
        "sink" => sink_name.to_string()
    )
    .record(latency_ms);
}

/// Record a session credential check
///
/// `outcome` is one of `cached`, `renewed`, `failed`.
pub fn record_token_check(outcome: &'static str) {
    counter!("fusion_bridge_token_checks_total", "outcome" => outcome).increment(1);
}

/// Record current event queue depth
pub fn record_queue_depth(depth: usize) {
    gauge!("fusion_bridge_queue_depth").set(depth as f64);
}

/// Per-sink delivery latency aggregator
#[derive(Debug, Clone, Default)]
pub struct LatencyAggregator {
    per_sink: BTreeMap<String, RunningStats>,
}

impl LatencyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one latency sample
    pub fn push(&mut self, sink_name: &str, latency_ms: f64) {
        self.per_sink
            .entry(sink_name.to_string())
            .or_default()
            .push(latency_ms);
    }

    /// Summary per sink, ordered by sink name
    pub fn summary(&self) -> BTreeMap<String, StatsSummary> {
        self.per_sink
            .iter()
            .map(|(name, stats)| (name.clone(), StatsSummary::from(stats)))
            .collect()
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_latency_aggregator_per_sink() {
        let mut agg = LatencyAggregator::new();
        agg.push("transcription", 10.0);
        agg.push("transcription", 20.0);
        agg.push("command", 5.0);

        let summary = agg.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["transcription"].count, 2);
        assert!((summary["transcription"].mean - 15.0).abs() < 1e-10);
        assert_eq!(summary["command"].count, 1);
    }

    #[test]
    fn test_empty_summary_display() {
        assert_eq!(StatsSummary::default().to_string(), "N/A");
    }

    #[test]
    fn test_recorders_without_installed_recorder() {
        // The metrics facade is a no-op until a recorder is installed.
        record_message_received("mkm/result");
        record_delivery("command", false, 1.5);
        record_token_check("cached");
        record_queue_depth(3);
    }
}
