//! Bridge statistics.

use std::fmt;
use std::time::Duration;

use contracts::MissionId;
use dispatcher::DispatchReport;
use ingestion::MetricsSnapshot;
use serde::Serialize;

/// What ended a bridge run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownReason {
    /// `exit` received on the control topic
    ExitCommand,
    /// Ctrl+C or SIGTERM
    Signal,
    /// The configured run timeout elapsed
    Timeout,
    /// `stop` called directly
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ExitCommand => "exit command",
            Self::Signal => "signal",
            Self::Timeout => "timeout",
            Self::Requested => "requested",
        };
        f.write_str(text)
    }
}

/// Statistics from a bridge run
#[derive(Debug, Clone)]
pub struct BridgeStats {
    /// Listener counters
    pub ingestion: MetricsSnapshot,

    /// Dispatch loop summary, `None` if the loop had to be aborted
    pub dispatch: Option<DispatchReport>,

    /// Mission the command sink posted to
    pub mission: Option<MissionId>,

    /// Total duration of the run
    pub duration: Duration,

    pub shutdown_reason: ShutdownReason,
}

impl BridgeStats {
    pub fn events_dispatched(&self) -> u64 {
        self.dispatch
            .as_ref()
            .map(|report| report.events_dispatched)
            .unwrap_or(0)
    }

    /// Events per second over the whole run
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.events_dispatched() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n================================================================");
        println!("                      Bridge Statistics");
        println!("================================================================\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Shutdown: {}", self.shutdown_reason);
        match self.mission {
            Some(mission) => println!("   ├─ Mission: {mission}"),
            None => println!("   ├─ Mission: unresolved"),
        }
        println!("   └─ Throughput: {:.2} events/s", self.throughput());

        println!("\nIngestion");
        println!("   ├─ Messages received: {}", self.ingestion.messages_received);
        println!("   ├─ Events enqueued: {}", self.ingestion.events_enqueued);
        println!("   ├─ Decode errors: {}", self.ingestion.decode_errors);
        println!("   ├─ Rejected after shutdown: {}", self.ingestion.events_rejected);
        println!("   └─ Control commands: {}", self.ingestion.control_commands);

        match &self.dispatch {
            Some(report) => {
                println!("\nDispatch");
                println!("   ├─ Events dispatched: {}", report.events_dispatched);
                println!("   ├─ Discarded after stop: {}", report.discarded);
                println!("   └─ Evaluation records: {}", report.evaluation_records);

                for sink in &report.sinks {
                    println!("\nSink '{}'", sink.name);
                    println!("   ├─ Delivered: {}", sink.metrics.write_count);
                    println!("   ├─ Failed: {}", sink.metrics.failure_count);
                    println!("   └─ Latency (ms): {}", sink.latency);
                }
            }
            None => println!("\nDispatch loop was aborted, no report available"),
        }

        println!();
    }
}
