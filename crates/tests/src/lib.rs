//! # Integration Tests
//!
//! End-to-end tests over the in-memory transport and the service fakes:
//! topic routing, queueing, dispatch to both sinks and shutdown.

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use bytes::Bytes;
    use contracts::{
        to_local_offset, BridgeBlueprint, CommandConfig, MissionId, Transport, TranscriptionConfig,
    };
    use dispatcher::api::{MissionResource, MESSAGE_STATUS_SENT};
    use dispatcher::testing::{FakeCommandApi, FakeTranscriptionApi};
    use dispatcher::{create_dispatcher, DispatchState, DispatcherHandle};
    use ingestion::{EventQueue, InMemoryTransport, IngestionListener, IngestionMetrics};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    const DATA: &str = "mkm/result";
    const CONTROL: &str = "mkm/control";
    const HELLO: &str = r#"{"sender":"A","addressee":"B","text":"hello","fromTime":1700000000000,"toTime":1700000005000}"#;

    struct Harness {
        transport: InMemoryTransport,
        queue: EventQueue,
        exit: CancellationToken,
        listener_stop: CancellationToken,
        ingestion: Arc<IngestionMetrics>,
        dispatcher: DispatcherHandle,
        transcription: FakeTranscriptionApi,
        command: FakeCommandApi,
    }

    fn blueprint(mission: Option<MissionId>) -> BridgeBlueprint {
        let mut command = CommandConfig::new("http://localhost:8081", "bridge", "changeme", "key");
        command.mission_id = mission;
        BridgeBlueprint::new(
            TranscriptionConfig::new("http://localhost:8080", "dev", "changeme"),
            command,
        )
    }

    async fn harness(mission: Option<MissionId>) -> Harness {
        let (transport, inbound) = InMemoryTransport::new(32);
        transport.subscribe(DATA).await.unwrap();
        transport.subscribe(CONTROL).await.unwrap();

        let transcription = FakeTranscriptionApi::new();
        let command = FakeCommandApi::new();
        if let Some(mission) = mission {
            command.set_mission_resources(vec![MissionResource {
                id: None,
                mission_id: *mission.as_uuid(),
                resource_id: None,
            }]);
        }

        let bp = blueprint(mission);
        let queue = EventQueue::new();
        let exit = CancellationToken::new();
        let listener_stop = CancellationToken::new();
        let listener = IngestionListener::new(bp.topics.clone(), queue.clone(), exit.clone());
        let ingestion = listener.metrics();
        listener.spawn(inbound, listener_stop.clone());

        let dispatcher =
            create_dispatcher(queue.clone(), &bp, transcription.clone(), command.clone())
                .await
                .unwrap()
                .with_cancel_token(exit.child_token())
                .spawn();

        Harness {
            transport,
            queue,
            exit,
            listener_stop,
            ingestion,
            dispatcher,
            transcription,
            command,
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_hello_reaches_both_services() {
        let mission = MissionId::random();
        let mut h = harness(Some(mission)).await;

        h.transport
            .publish(DATA, Bytes::from_static(HELLO.as_bytes()))
            .await
            .unwrap();

        let command = h.command.clone();
        let transcription = h.transcription.clone();
        wait_for(|| command.sent().len() == 1 && transcription.entries().len() == 1).await;

        let entries = h.transcription.entries();
        assert_eq!(entries[0].sender, "A");
        assert_eq!(entries[0].receiver, "B");
        assert_eq!(entries[0].message, "hello");
        assert_eq!(entries[0].start_time, to_local_offset(1700000000000).unwrap());
        assert_eq!(entries[0].end_time, to_local_offset(1700000005000).unwrap());

        let (mission_id, message) = h.command.sent().remove(0);
        assert_eq!(mission_id, *mission.as_uuid());
        assert_eq!(message.text, "hello");
        assert_eq!(message.sender_name, "A");
        assert_eq!(message.receiver_name, "B");
        assert_eq!(message.message_status, MESSAGE_STATUS_SENT);

        let report = h.dispatcher.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(report.events_dispatched, 1);
        assert_eq!(report.sink("transcription").unwrap().metrics.write_count, 1);
        assert_eq!(report.sink("command").unwrap().metrics.write_count, 1);
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let mut h = harness(Some(MissionId::random())).await;

        for i in 0..5 {
            let payload = format!(
                r#"{{"sender":"A","addressee":"B","text":"m{i}","fromTime":{i},"toTime":{i}}}"#
            );
            h.transport.publish(DATA, Bytes::from(payload)).await.unwrap();
        }

        let command = h.command.clone();
        wait_for(|| command.sent().len() == 5).await;

        let texts: Vec<String> = h.command.sent().into_iter().map(|(_, m)| m.text).collect();
        assert_eq!(texts, ["m0", "m1", "m2", "m3", "m4"]);
        let messages: Vec<String> = h
            .transcription
            .entries()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, texts);

        h.dispatcher.stop(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_malformed_payload_is_skipped() {
        let mut h = harness(Some(MissionId::random())).await;

        h.transport
            .publish(DATA, Bytes::from_static(b"\xff\xfe not json"))
            .await
            .unwrap();
        h.transport
            .publish(DATA, Bytes::from_static(br#"{"sender":"A"}"#))
            .await
            .unwrap();
        h.transport
            .publish(DATA, Bytes::from_static(HELLO.as_bytes()))
            .await
            .unwrap();

        let transcription = h.transcription.clone();
        wait_for(|| transcription.entries().len() == 1).await;

        let report = h.dispatcher.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(report.events_dispatched, 1);
    }

    #[tokio::test]
    async fn test_one_service_down_does_not_block_the_other() {
        let mut h = harness(Some(MissionId::random())).await;
        h.transcription.set_fail(true);

        h.transport
            .publish(DATA, Bytes::from_static(HELLO.as_bytes()))
            .await
            .unwrap();

        let command = h.command.clone();
        wait_for(|| command.sent().len() == 1).await;

        let report = h.dispatcher.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(report.sink("transcription").unwrap().metrics.failure_count, 1);
        assert_eq!(report.sink("command").unwrap().metrics.write_count, 1);
    }

    #[tokio::test]
    async fn test_exit_command_then_shutdown() {
        let mut h = harness(None).await;

        h.transport
            .publish(CONTROL, Bytes::from_static(b"exit"))
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), h.exit.cancelled())
            .await
            .unwrap();

        let report = h.dispatcher.stop(Duration::from_secs(2)).await;
        assert!(report.is_some());
        assert_eq!(h.dispatcher.state(), DispatchState::Stopped);
        assert!(h.queue.is_closed());

        // nothing published after stop reaches a sink
        h.transport
            .publish(DATA, Bytes::from_static(HELLO.as_bytes()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.transcription.entries().is_empty());

        h.listener_stop.cancel();
        h.transport.disconnect().await.unwrap();
        assert!(!h.transport.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_data_published_right_after_exit_is_dropped() {
        let mut h = harness(Some(MissionId::random())).await;

        h.transport
            .publish(CONTROL, Bytes::from_static(b"exit"))
            .await
            .unwrap();
        h.transport
            .publish(DATA, Bytes::from_static(HELLO.as_bytes()))
            .await
            .unwrap();

        let ingestion = h.ingestion.clone();
        wait_for(|| ingestion.snapshot().events_rejected == 1).await;
        assert!(h.exit.is_cancelled());

        let report = h.dispatcher.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(report.events_dispatched, 0);
        assert_eq!(h.ingestion.snapshot().events_enqueued, 0);
        assert!(h.transcription.entries().is_empty());
        assert!(h.command.sent().is_empty());
    }

    #[tokio::test]
    async fn test_exit_stops_dispatch_without_explicit_stop() {
        let h = harness(None).await;

        h.transport
            .publish(CONTROL, Bytes::from_static(b"exit"))
            .await
            .unwrap();

        let dispatcher = &h.dispatcher;
        wait_for(|| dispatcher.is_stopped()).await;
        h.listener_stop.cancel();
    }

    #[tokio::test]
    async fn test_unknown_control_command_keeps_running() {
        let mut h = harness(Some(MissionId::random())).await;

        h.transport
            .publish(CONTROL, Bytes::from_static(b"pause"))
            .await
            .unwrap();
        h.transport
            .publish(DATA, Bytes::from_static(HELLO.as_bytes()))
            .await
            .unwrap();

        let transcription = h.transcription.clone();
        wait_for(|| transcription.entries().len() == 1).await;
        assert!(!h.exit.is_cancelled());
        assert_eq!(h.dispatcher.state(), DispatchState::Running);

        h.dispatcher.stop(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_drain_before_stop() {
        let mut h = harness(Some(MissionId::random())).await;

        for _ in 0..3 {
            h.transport
                .publish(DATA, Bytes::from_static(HELLO.as_bytes()))
                .await
                .unwrap();
        }
        let ingestion = h.ingestion.clone();
        wait_for(|| ingestion.snapshot().events_enqueued == 3).await;

        h.queue.close();
        let report = h
            .dispatcher
            .stop_when_drained(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(report.events_dispatched, 3);
        assert_eq!(h.command.sent().len(), 3);
    }
}

#[cfg(test)]
mod config_tests {
    use std::io::Write;
    use std::time::Duration;

    use config_loader::ConfigLoader;

    const FULL: &str = r#"
[broker]
host = "broker.local"
port = 1884
client_id = "bridge-test"
username = "bridge"
password = "changeme"

[topics]
data = "fusion/result"
control = "fusion/control"

[transcription]
base_url = "http://localhost:8080/radio-transcription"
username = "dev"
password = "changeme"

[command]
base_url = "https://command.example.org"
username = "bridge"
password = "changeme"
api_key = "placeholder-key"
mission_id = "5b2f6f0e-8e0a-4d4e-9a43-2f7c1c2f0a11"
token_ttl_secs = 600
token_margin_secs = 30

[dispatch]
shutdown_timeout_secs = 3
evaluation_log = "out/eval.jsonl"
"#;

    #[test]
    fn test_load_full_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let bp = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(bp.broker.host, "broker.local");
        assert_eq!(bp.broker.port, 1884);
        assert_eq!(bp.topics.data, "fusion/result");
        assert_eq!(bp.topics.control, "fusion/control");
        assert_eq!(
            bp.command.mission_id.map(|m| m.to_string()).as_deref(),
            Some("5b2f6f0e-8e0a-4d4e-9a43-2f7c1c2f0a11")
        );
        assert_eq!(bp.command.token_ttl(), Duration::from_secs(600));
        assert_eq!(bp.dispatch.shutdown_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_redacted_config_hides_secrets() {
        let bp = ConfigLoader::load_from_str(FULL, config_loader::ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp.redacted()).unwrap();
        assert!(!json.contains("changeme"));
        assert!(!json.contains("placeholder-key"));
        assert!(json.contains("broker.local"));
    }

    #[test]
    fn test_margin_not_below_ttl_is_rejected() {
        let bad = FULL.replace("token_margin_secs = 30", "token_margin_secs = 600");
        let err = ConfigLoader::load_from_str(&bad, config_loader::ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, contracts::ContractError::ConfigValidation { .. }));
    }
}
