//! MQTT transport over `rumqttc`
//!
//! Connecting spawns a task that drives the rumqttc event loop and forwards
//! every incoming publish as an `InboundMessage`. Subscriptions are replayed
//! after a reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use contracts::{BrokerConfig, ContractError, InboundMessage, Transport};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// MQTT broker connection
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    cancel: CancellationToken,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Connect to the broker described by `config`
    ///
    /// The returned receiver yields every publish on a subscribed topic.
    #[instrument(
        name = "mqtt_transport_connect",
        skip(config),
        fields(host = %config.host, port = config.port, client_id = %config.client_id)
    )]
    pub fn connect(config: &BrokerConfig) -> (Self, mpsc::Receiver<InboundMessage>) {
        let mut opts = MqttOptions::new(&config.client_id, &config.host, config.port);
        opts.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        if let Some(username) = config.username.clone() {
            opts.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        let (client, event_loop) = AsyncClient::new(opts, config.channel_capacity);
        let (tx, rx) = mpsc::channel(config.channel_capacity);

        let connected = Arc::new(AtomicBool::new(true));
        let subscriptions = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();

        let event_task = tokio::spawn(drive_event_loop(
            event_loop,
            client.clone(),
            tx,
            connected.clone(),
            subscriptions.clone(),
            cancel.clone(),
        ));

        info!("MQTT transport started");

        (
            Self {
                client,
                connected,
                subscriptions,
                cancel,
                event_task: Mutex::new(Some(event_task)),
            },
            rx,
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn take_event_task(&self) -> Option<JoinHandle<()>> {
        self.event_task.lock().ok().and_then(|mut guard| guard.take())
    }
}

impl Transport for MqttTransport {
    #[instrument(name = "mqtt_transport_subscribe", skip(self))]
    async fn subscribe(&self, topic: &str) -> Result<(), ContractError> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| ContractError::transport("subscribe", format!("'{topic}': {e}")))?;

        if let Ok(mut subs) = self.subscriptions.lock() {
            if !subs.iter().any(|t| t == topic) {
                subs.push(topic.to_string());
            }
        }
        debug!(topic, "Subscribed");
        Ok(())
    }

    #[instrument(name = "mqtt_transport_publish", skip(self, payload), fields(bytes = payload.len()))]
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ContractError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .await
            .map_err(|e| ContractError::transport("publish", format!("'{topic}': {e}")))
    }

    #[instrument(name = "mqtt_transport_disconnect", skip(self))]
    async fn disconnect(&self) -> Result<(), ContractError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Err(ContractError::transport("disconnect", "already disconnected"));
        }

        let result = self
            .client
            .disconnect()
            .await
            .map_err(|e| ContractError::transport("disconnect", e.to_string()));

        // Give the event loop a moment to flush the DISCONNECT packet.
        if let Some(task) = self.take_event_task() {
            if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                warn!("MQTT event loop did not stop in time, cancelling");
                self.cancel.cancel();
            }
        }
        self.cancel.cancel();

        info!("Disconnected from broker");
        result
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    tx: mpsc::Sender<InboundMessage>,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    cancel: CancellationToken,
) {
    let mut sessions = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("MQTT event loop cancelled");
                break;
            }
            event = event_loop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = InboundMessage {
                            topic: publish.topic,
                            payload: publish.payload,
                        };
                        if tx.send(message).await.is_err() {
                            debug!("Inbound receiver dropped, stopping event loop");
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        sessions += 1;
                        if sessions > 1 {
                            resubscribe(&client, &subscriptions);
                        }
                        info!(sessions, "Connected to broker");
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!("DISCONNECT sent");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if !connected.load(Ordering::SeqCst) {
                            break;
                        }
                        warn!(error = %e, "MQTT poll error, retrying");
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                    }
                }
            }
        }
    }
}

fn resubscribe(client: &AsyncClient, subscriptions: &Mutex<Vec<String>>) {
    let topics = subscriptions
        .lock()
        .map(|subs| subs.clone())
        .unwrap_or_default();

    for topic in topics {
        if let Err(e) = client.try_subscribe(&topic, QoS::AtLeastOnce) {
            warn!(topic = %topic, error = %e, "Resubscribe failed");
        }
    }
}
