//! Bridge orchestrator - owns every component between start and stop.
//!
//! Start order: subscribe, event queue, listener task, sinks and session,
//! mission resolution, dispatch task. Stop runs every teardown step even when
//! an earlier one fails.

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{BridgeBlueprint, InboundMessage, MissionId, Transport};
use dispatcher::api::{CommandApi, TranscriptionApi};
use dispatcher::{create_dispatcher, DispatchState, DispatcherHandle};
use ingestion::{EventQueue, IngestionListener, IngestionMetrics};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{BridgeStats, ShutdownReason};
use crate::error::{CliError, Result};

const LISTENER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Running bridge
pub struct Bridge<T> {
    transport: T,
    queue: EventQueue,
    exit: CancellationToken,
    listener_stop: CancellationToken,
    listener_task: Option<JoinHandle<()>>,
    ingestion_metrics: Arc<IngestionMetrics>,
    dispatcher: DispatcherHandle,
    mission: Option<MissionId>,
    shutdown_timeout: Duration,
    started_at: Instant,
    stats: Option<BridgeStats>,
}

impl<T: Transport> Bridge<T> {
    /// Wire up and start every component
    ///
    /// `transport` must already be connected; `inbound` is its message
    /// stream. The API clients are moved into the sinks.
    #[instrument(name = "bridge_start", skip_all)]
    pub async fn start<A, C>(
        blueprint: &BridgeBlueprint,
        transport: T,
        inbound: mpsc::Receiver<InboundMessage>,
        transcription_api: A,
        command_api: C,
    ) -> Result<Self>
    where
        A: TranscriptionApi + Send + Sync + 'static,
        C: CommandApi + Send + Sync + 'static,
    {
        let topics = &blueprint.topics;
        for topic in [&topics.data, &topics.control] {
            if let Err(e) = transport.subscribe(topic).await {
                disconnect_quietly(&transport).await;
                return Err(CliError::broker(
                    &blueprint.broker.host,
                    blueprint.broker.port,
                    e.to_string(),
                ));
            }
        }
        info!(data = %topics.data, control = %topics.control, "Subscribed");

        let queue = EventQueue::new();
        let exit = CancellationToken::new();
        let listener = IngestionListener::new(topics.clone(), queue.clone(), exit.clone());
        let ingestion_metrics = listener.metrics();
        let listener_stop = CancellationToken::new();
        let listener_task = listener.spawn(inbound, listener_stop.clone());

        let dispatcher =
            match create_dispatcher(queue.clone(), blueprint, transcription_api, command_api).await
            {
                Ok(dispatcher) => dispatcher,
                Err(e) => {
                    listener_stop.cancel();
                    queue.close();
                    disconnect_quietly(&transport).await;
                    return Err(e.into());
                }
            };
        let mission = dispatcher.command_sink().mission();
        // `exit` stops dispatch at once; stopping the dispatcher leaves `exit` alone
        let dispatcher = dispatcher.with_cancel_token(exit.child_token()).spawn();

        info!(mission = ?mission, "Bridge started");

        Ok(Self {
            transport,
            queue,
            exit,
            listener_stop,
            listener_task: Some(listener_task),
            ingestion_metrics,
            dispatcher,
            mission,
            shutdown_timeout: blueprint.dispatch.shutdown_timeout(),
            started_at: Instant::now(),
            stats: None,
        })
    }

    /// Token cancelled when `exit` arrives on the control topic
    pub fn exit_token(&self) -> CancellationToken {
        self.exit.clone()
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn mission(&self) -> Option<MissionId> {
        self.mission
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    /// Wait for `exit`, a process signal or `timeout`, then stop
    pub async fn run_until_shutdown(&mut self, timeout: Option<Duration>) -> BridgeStats {
        let reason = tokio::select! {
            _ = self.exit.cancelled() => ShutdownReason::ExitCommand,
            _ = shutdown_signal() => ShutdownReason::Signal,
            _ = sleep_or_forever(timeout) => ShutdownReason::Timeout,
        };
        info!(reason = %reason, "Shutdown requested");
        self.shutdown(reason).await
    }

    /// Stop the bridge; later calls return the first result
    pub async fn stop(&mut self) -> BridgeStats {
        self.shutdown(ShutdownReason::Requested).await
    }

    #[instrument(name = "bridge_shutdown", skip(self))]
    async fn shutdown(&mut self, reason: ShutdownReason) -> BridgeStats {
        if let Some(stats) = &self.stats {
            debug!("Bridge already stopped");
            return stats.clone();
        }

        info!("Shutting down bridge...");

        // cancels dispatch, wakes and closes the queue, joins with a bound
        let report = self.dispatcher.stop(self.shutdown_timeout).await;

        disconnect_quietly(&self.transport).await;

        self.listener_stop.cancel();
        if let Some(mut task) = self.listener_task.take() {
            if tokio::time::timeout(LISTENER_JOIN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                warn!("Listener did not stop in time, aborting");
                task.abort();
            }
        }

        let stats = BridgeStats {
            ingestion: self.ingestion_metrics.snapshot(),
            dispatch: report,
            mission: self.mission,
            duration: self.started_at.elapsed(),
            shutdown_reason: reason,
        };

        info!(
            events = stats.events_dispatched(),
            duration_secs = stats.duration.as_secs_f64(),
            "Bridge shutdown complete"
        );

        self.stats = Some(stats.clone());
        stats
    }
}

async fn disconnect_quietly<T: Transport>(transport: &T) {
    if let Err(e) = transport.disconnect().await {
        warn!(error = %e, "Transport disconnect failed");
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{CommandConfig, TranscriptionConfig};
    use dispatcher::api::MissionResource;
    use dispatcher::testing::{FakeCommandApi, FakeTranscriptionApi};
    use ingestion::InMemoryTransport;

    fn blueprint(mission: Option<MissionId>) -> BridgeBlueprint {
        let mut command = CommandConfig::new("http://localhost:8081", "bridge", "pw", "key");
        command.mission_id = mission;
        let mut blueprint = BridgeBlueprint::new(
            TranscriptionConfig::new("http://localhost:8080", "dev", "pw"),
            command,
        );
        blueprint.dispatch.shutdown_timeout_secs = 2;
        blueprint
    }

    struct Fixture {
        bridge: Bridge<InMemoryTransport>,
        transport: InMemoryTransport,
        transcription: FakeTranscriptionApi,
        command: FakeCommandApi,
    }

    async fn start(mission: Option<MissionId>) -> Fixture {
        let (transport, inbound) = InMemoryTransport::new(16);
        let transcription = FakeTranscriptionApi::new();
        let command = FakeCommandApi::new();
        if let Some(mission) = mission {
            command.set_mission_resources(vec![MissionResource {
                id: None,
                mission_id: *mission.as_uuid(),
                resource_id: None,
            }]);
        }

        let bridge = Bridge::start(
            &blueprint(mission),
            transport.clone(),
            inbound,
            transcription.clone(),
            command.clone(),
        )
        .await
        .unwrap();

        Fixture {
            bridge,
            transport,
            transcription,
            command,
        }
    }

    fn payload(text: &str) -> Bytes {
        Bytes::from(format!(
            r#"{{"sender":"A","addressee":"B","text":"{text}","fromTime":1700000000000,"toTime":1700000005000}}"#
        ))
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_exit_command_stops_bridge() {
        let mission = MissionId::random();
        let mut f = start(Some(mission)).await;
        assert!(f.transport.is_subscribed("mkm/result"));
        assert!(f.transport.is_subscribed("mkm/control"));
        assert_eq!(f.bridge.mission(), Some(mission));

        f.transport.publish("mkm/result", payload("hello")).await.unwrap();
        let transcription = f.transcription.clone();
        wait_for(|| transcription.entries().len() == 1).await;

        f.transport
            .publish("mkm/control", Bytes::from_static(b"exit"))
            .await
            .unwrap();
        let stats = f.bridge.run_until_shutdown(Some(Duration::from_secs(10))).await;

        assert_eq!(stats.shutdown_reason, ShutdownReason::ExitCommand);
        assert_eq!(stats.events_dispatched(), 1);
        assert_eq!(stats.ingestion.control_commands, 1);
        assert!(!f.transport.is_connected());
        assert_eq!(f.bridge.dispatch_state(), DispatchState::Stopped);

        let sent = f.command.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, *mission.as_uuid());
        assert_eq!(sent[0].1.text, "hello");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_data_right_after_exit_is_never_dispatched() {
        let f = start(Some(MissionId::random())).await;
        let mut bridge = f.bridge;
        let running = tokio::spawn(async move {
            bridge
                .run_until_shutdown(Some(Duration::from_secs(10)))
                .await
        });

        f.transport
            .publish("mkm/control", Bytes::from_static(b"exit"))
            .await
            .unwrap();
        // may race with the shutdown disconnect
        let _ = f.transport.publish("mkm/result", payload("late")).await;

        let stats = running.await.unwrap();
        assert_eq!(stats.shutdown_reason, ShutdownReason::ExitCommand);
        assert_eq!(stats.events_dispatched(), 0);
        assert!(f.transcription.entries().is_empty());
        assert!(f.command.sent().is_empty());
    }

    #[tokio::test]
    async fn test_start_failure_disconnects_transport() {
        let (transport, inbound) = InMemoryTransport::new(4);
        transport.disconnect().await.unwrap();

        let result = Bridge::start(
            &blueprint(None),
            transport.clone(),
            inbound,
            FakeTranscriptionApi::new(),
            FakeCommandApi::new(),
        )
        .await;

        assert!(matches!(result, Err(CliError::Broker { .. })));
        assert_eq!(transport.disconnect_calls(), 2);
    }

    #[tokio::test]
    async fn test_stop_twice_is_harmless() {
        let mut f = start(None).await;

        let first = f.bridge.stop().await;
        let second = f.bridge.stop().await;

        assert_eq!(first.shutdown_reason, ShutdownReason::Requested);
        assert_eq!(second.duration, first.duration);
        assert_eq!(f.transport.disconnect_calls(), 1);
        assert!(f.bridge.queue().is_closed());
    }

    #[tokio::test]
    async fn test_stop_survives_already_disconnected_transport() {
        let mut f = start(None).await;
        f.transport.disconnect().await.unwrap();

        let stats = f.bridge.stop().await;
        assert!(stats.dispatch.is_some());
        assert_eq!(f.transport.disconnect_calls(), 2);
        assert_eq!(f.bridge.dispatch_state(), DispatchState::Stopped);
    }

    #[tokio::test]
    async fn test_unresolved_mission_only_skips_command_sink() {
        let mut f = start(None).await;
        assert_eq!(f.bridge.mission(), None);
        let auth_after_start = f.command.auth_calls();

        f.transport.publish("mkm/result", payload("hi")).await.unwrap();
        let transcription = f.transcription.clone();
        wait_for(|| transcription.entries().len() == 1).await;

        let stats = f.bridge.stop().await;
        let report = stats.dispatch.unwrap();
        assert_eq!(report.sink("command").unwrap().metrics.failure_count, 1);
        assert_eq!(report.sink("transcription").unwrap().metrics.write_count, 1);
        assert_eq!(f.command.auth_calls(), auth_after_start);
        assert!(f.command.sent().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_does_not_stop_dispatch() {
        let mut f = start(Some(MissionId::random())).await;

        f.transport
            .publish("mkm/result", Bytes::from_static(b"{not json"))
            .await
            .unwrap();
        f.transport.publish("mkm/result", payload("after")).await.unwrap();

        let command = f.command.clone();
        wait_for(|| command.sent().len() == 1).await;

        let stats = f.bridge.stop().await;
        assert_eq!(stats.ingestion.decode_errors, 1);
        assert_eq!(stats.events_dispatched(), 1);
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let mut f = start(None).await;
        let stats = f
            .bridge
            .run_until_shutdown(Some(Duration::from_millis(20)))
            .await;
        assert_eq!(stats.shutdown_reason, ShutdownReason::Timeout);
        assert!(!f.bridge.exit_token().is_cancelled());
    }
}
