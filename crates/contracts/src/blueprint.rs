//! BridgeBlueprint - Config Loader output
//!
//! Describes the complete bridge configuration: broker connection, topics,
//! both downstream services and dispatch settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::MissionId;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Pub/sub broker connection
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Topic names
    #[serde(default)]
    pub topics: TopicConfig,

    /// Radio transcription service (unauthenticated sink)
    pub transcription: TranscriptionConfig,

    /// Mission command service (session-authenticated sink)
    pub command: CommandConfig,

    /// Dispatch loop settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Capacity of the transport's internal request/inbound channels
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "fusion-bridge".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_channel_capacity() -> usize {
    100
}

/// Topic names for the two inbound channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    #[serde(default = "default_data_topic")]
    pub data: String,

    #[serde(default = "default_control_topic")]
    pub control: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            data: default_data_topic(),
            control: default_control_topic(),
        }
    }
}

fn default_data_topic() -> String {
    "mkm/result".to_string()
}

fn default_control_topic() -> String {
    "mkm/control".to_string()
}

/// Radio transcription service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl TranscriptionConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Mission command service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,

    /// Static API key sent with every call
    pub api_key: String,

    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Seed for mission resolution (optional)
    #[serde(default)]
    pub mission_id: Option<MissionId>,

    /// Bearer token lifetime
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Renew this long before the token actually expires
    #[serde(default = "default_token_margin_secs")]
    pub token_margin_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl CommandConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            api_key: api_key.into(),
            api_key_header: default_api_key_header(),
            mission_id: None,
            token_ttl_secs: default_token_ttl_secs(),
            token_margin_secs: default_token_margin_secs(),
            timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn token_margin(&self) -> Duration {
        Duration::from_secs(self.token_margin_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_key_header() -> String {
    "CX5SecurityToken".to_string()
}

fn default_token_ttl_secs() -> u64 {
    15 * 60
}

fn default_token_margin_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Dispatch loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Bound for joining the dispatch task on shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Optional JSON-lines log of every dispatched event
    #[serde(default)]
    pub evaluation_log: Option<PathBuf>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            evaluation_log: None,
        }
    }
}

impl DispatchConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

const REDACTED: &str = "***";

impl BridgeBlueprint {
    /// Blueprint with default broker, topic and dispatch settings
    pub fn new(transcription: TranscriptionConfig, command: CommandConfig) -> Self {
        Self {
            version: ConfigVersion::default(),
            broker: BrokerConfig::default(),
            topics: TopicConfig::default(),
            transcription,
            command,
            dispatch: DispatchConfig::default(),
        }
    }

    /// Copy with every secret replaced, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.broker.password.is_some() {
            copy.broker.password = Some(REDACTED.to_string());
        }
        copy.transcription.password = REDACTED.to_string();
        copy.command.password = REDACTED.to_string();
        copy.command.api_key = REDACTED.to_string();
        copy
    }
}
