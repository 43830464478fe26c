//! Dispatcher - main loop delivering queued events to both sinks

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use contracts::{BridgeBlueprint, ContractError, EventSink, FusedEvent};
use ingestion::{EventQueue, QueueEntry};
use observability::{LatencyAggregator, StatsSummary};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{CommandApi, CommandClient, TranscriptionApi, TranscriptionClient};
use crate::error::DispatcherError;
use crate::handle::DispatcherHandle;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::mission::resolve_mission;
use crate::session::SessionManager;
use crate::sinks::{CommandSink, EvaluationLog, SinkOutcome, TranscriptionSink};

/// Dispatch loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Running,
    /// Terminal
    Stopped,
}

/// Per-sink totals at the end of a run
#[derive(Debug, Clone, Default)]
pub struct SinkReport {
    pub name: String,
    pub metrics: MetricsSnapshot,
    pub latency: StatsSummary,
}

/// Summary returned when the dispatch loop stops
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Events handed to both sinks
    pub events_dispatched: u64,
    /// Wake-up markers consumed
    pub wake_ups: u64,
    /// Events dequeued after the stop signal and discarded
    pub discarded: u64,
    /// Lines written to the evaluation log
    pub evaluation_records: u64,
    pub sinks: Vec<SinkReport>,
}

impl DispatchReport {
    pub fn sink(&self, name: &str) -> Option<&SinkReport> {
        self.sinks.iter().find(|s| s.name == name)
    }
}

/// Dispatcher fed by the event queue
///
/// Every event goes to the transcription sink and the command sink
/// concurrently; a failure in one never affects the other.
pub struct Dispatcher<A, B> {
    queue: EventQueue,
    transcription: A,
    command: B,
    cancel: CancellationToken,
    state: Arc<watch::Sender<DispatchState>>,
    evaluation: Option<EvaluationLog>,
    metrics: [Arc<SinkMetrics>; 2],
    latency: LatencyAggregator,
}

impl<A: EventSink, B: EventSink> Dispatcher<A, B> {
    pub fn new(queue: EventQueue, transcription: A, command: B) -> Self {
        let (state, _) = watch::channel(DispatchState::Running);
        Self {
            queue,
            transcription,
            command,
            cancel: CancellationToken::new(),
            state: Arc::new(state),
            evaluation: None,
            metrics: [Arc::new(SinkMetrics::new()), Arc::new(SinkMetrics::new())],
            latency: LatencyAggregator::new(),
        }
    }

    /// Append each dispatched event and its outcomes to `log`
    pub fn with_evaluation_log(mut self, log: EvaluationLog) -> Self {
        self.evaluation = Some(log);
        self
    }

    /// Stop the loop when `token` is cancelled
    ///
    /// Pass a child of a shutdown token so the loop stops as soon as
    /// shutdown is requested; cancelling the child leaves the parent alone.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the loop when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> watch::Receiver<DispatchState> {
        self.state.subscribe()
    }

    pub fn transcription_sink(&self) -> &A {
        &self.transcription
    }

    pub fn command_sink(&self) -> &B {
        &self.command
    }

    /// Get metrics for both sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        vec![
            (self.transcription.name().to_string(), self.metrics[0].snapshot()),
            (self.command.name().to_string(), self.metrics[1].snapshot()),
        ]
    }

    /// Run the dispatch loop until cancelled or the queue is closed and drained
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> DispatchReport {
        info!(
            sinks = ?[self.transcription.name(), self.command.name()],
            "Dispatcher started"
        );

        let mut report = DispatchReport::default();

        loop {
            let entry = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                entry = self.queue.dequeue() => entry,
            };

            match entry {
                Some(QueueEntry::Event(event)) => {
                    if self.cancel.is_cancelled() {
                        report.discarded += 1;
                        debug!(sender = %event.sender, "Stop requested, event discarded");
                        break;
                    }
                    self.dispatch(&event).await;
                    report.events_dispatched += 1;
                    observability::record_queue_depth(self.queue.len());

                    if report.events_dispatched.is_multiple_of(100) {
                        debug!(events = report.events_dispatched, "Dispatcher progress");
                    }
                }
                Some(QueueEntry::WakeUp) => {
                    report.wake_ups += 1;
                }
                None => {
                    info!("Event queue closed and drained");
                    break;
                }
            }
        }

        info!(events = report.events_dispatched, "Dispatcher stopping");
        self.shutdown(&mut report).await;
        self.state.send_replace(DispatchState::Stopped);
        info!("Dispatcher shutdown complete");
        report
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> DispatcherHandle
    where
        A: Send + 'static,
        B: Send + 'static,
    {
        let cancel = self.cancel.clone();
        let queue = self.queue.clone();
        let state = self.state.clone();
        let task = tokio::spawn(self.run());
        DispatcherHandle::new(cancel, queue, state, task)
    }

    async fn dispatch(&mut self, event: &FusedEvent) {
        let (transcription, command) = tokio::join!(
            timed(self.transcription.write(event)),
            timed(self.command.write(event)),
        );

        let transcription_name = self.transcription.name().to_string();
        let command_name = self.command.name().to_string();
        let outcomes = BTreeMap::from([
            (
                transcription_name.clone(),
                self.settle(0, &transcription_name, transcription),
            ),
            (command_name.clone(), self.settle(1, &command_name, command)),
        ]);

        if let Some(log) = self.evaluation.as_mut() {
            if let Err(e) = log.record(event, outcomes) {
                warn!(error = %e, "Evaluation log write failed");
            }
        }
    }

    fn settle(
        &mut self,
        index: usize,
        name: &str,
        (result, latency_ms): (Result<(), ContractError>, f64),
    ) -> SinkOutcome {
        let success = result.is_ok();
        self.metrics[index].record(success);
        self.latency.push(name, latency_ms);
        observability::record_delivery(name, success, latency_ms);

        if let Err(e) = &result {
            warn!(sink = %name, error = %e, kind = e.kind(), "Delivery failed");
        }
        SinkOutcome::from_result(&result)
    }

    async fn shutdown(&mut self, report: &mut DispatchReport) {
        if let Err(e) = self.transcription.flush().await {
            error!(sink = %self.transcription.name(), error = %e, "Flush failed on shutdown");
        }
        if let Err(e) = self.transcription.close().await {
            error!(sink = %self.transcription.name(), error = %e, "Close failed on shutdown");
        }
        if let Err(e) = self.command.flush().await {
            error!(sink = %self.command.name(), error = %e, "Flush failed on shutdown");
        }
        if let Err(e) = self.command.close().await {
            error!(sink = %self.command.name(), error = %e, "Close failed on shutdown");
        }

        if let Some(mut log) = self.evaluation.take() {
            report.evaluation_records = log.records();
            if let Err(e) = log.close() {
                error!(error = %e, "Evaluation log close failed");
            }
        }

        let latency = self.latency.summary();
        report.sinks = self
            .metrics()
            .into_iter()
            .map(|(name, metrics)| SinkReport {
                latency: latency.get(&name).cloned().unwrap_or_default(),
                name,
                metrics,
            })
            .collect();
    }
}

async fn timed<F>(write: F) -> (Result<(), ContractError>, f64)
where
    F: Future<Output = Result<(), ContractError>>,
{
    let started = Instant::now();
    let result = write.await;
    (result, started.elapsed().as_secs_f64() * 1000.0)
}

/// Dispatcher wired to the two REST sinks
pub type BridgeDispatcher<T, C> = Dispatcher<TranscriptionSink<T>, CommandSink<C>>;

/// Build the production REST clients from configuration
pub fn create_clients(
    blueprint: &BridgeBlueprint,
) -> Result<(TranscriptionClient, CommandClient), DispatcherError> {
    let transcription = TranscriptionClient::new(&blueprint.transcription)
        .map_err(|e| DispatcherError::sink_creation("transcription", e.to_string()))?;
    let command = CommandClient::new(&blueprint.command)
        .map_err(|e| DispatcherError::sink_creation("command", e.to_string()))?;
    Ok((transcription, command))
}

/// Assemble a dispatcher from configuration and injected API clients
///
/// Resolves the mission context (best effort) and opens the evaluation log
/// when one is configured.
#[instrument(name = "dispatcher_create", skip_all)]
pub async fn create_dispatcher<T, C>(
    queue: EventQueue,
    blueprint: &BridgeBlueprint,
    transcription_api: T,
    command_api: C,
) -> Result<BridgeDispatcher<T, C>, DispatcherError>
where
    T: TranscriptionApi + Send + Sync,
    C: CommandApi + Send + Sync,
{
    let session = SessionManager::new(command_api, &blueprint.command);
    let mission = resolve_mission(&session, blueprint.command.mission_id).await;

    let mut dispatcher = Dispatcher::new(
        queue,
        TranscriptionSink::new(transcription_api),
        CommandSink::new(session, mission),
    );

    if let Some(path) = &blueprint.dispatch.evaluation_log {
        let log = EvaluationLog::open(path)?;
        info!(path = %path.display(), "Evaluation log enabled");
        dispatcher = dispatcher.with_evaluation_log(log);
    }

    Ok(dispatcher)
}
