//! REST clients for the two downstream services
//!
//! Each service sits behind a trait so sinks and the session manager can be
//! driven by test doubles. The `reqwest` implementations live in the
//! submodules.

mod command;
mod transcription;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use command::CommandClient;
pub use transcription::TranscriptionClient;

/// REST client error
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be sent or the response could not be read
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("bad response body: {0}")]
    Body(String),

    /// Client could not be built from its configuration
    #[error("client configuration: {0}")]
    Config(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Transcription service
// ============================================================================

/// One transcript line as stored by the transcription service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub sender: String,
    pub receiver: String,
    pub message: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
}

/// Transcription service operations
#[trait_variant::make(TranscriptionApi: Send)]
pub trait LocalTranscriptionApi {
    /// Append transcript entries
    async fn add_messages(&self, entries: &[TranscriptEntry]) -> ApiResult<()>;
}

// ============================================================================
// Command service
// ============================================================================

/// Health status reported by the command service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(i64),
}

impl HealthStatus {
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            Self::Healthy
        } else {
            Self::Unhealthy(code)
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Mission summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
}

/// Resource assigned to a mission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionResource {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub mission_id: Uuid,
    #[serde(default)]
    pub resource_id: Option<Uuid>,
}

/// Resource known to the command service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: Uuid,
    #[serde(default)]
    pub radio_call: Option<String>,
}

/// Message status code for a message that has been sent
pub const MESSAGE_STATUS_SENT: i32 = 1;

/// Mission message, as posted and as listed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionMessage {
    pub date: DateTime<FixedOffset>,
    pub text: String,
    pub message_status: i32,
    pub sender_name: String,
    pub receiver_name: String,
}

/// Command service operations
///
/// Every call except `authenticate` and `health` needs a bearer token
/// obtained from `authenticate`.
#[trait_variant::make(CommandApi: Send)]
pub trait LocalCommandApi {
    /// Exchange user name and password for a bearer token
    async fn authenticate(&self, username: &str, password: &str) -> ApiResult<String>;

    async fn health(&self) -> ApiResult<HealthStatus>;

    async fn missions(&self, token: &str) -> ApiResult<Vec<Mission>>;

    async fn mission_resources(
        &self,
        token: &str,
        mission_id: Uuid,
    ) -> ApiResult<Vec<MissionResource>>;

    /// List resources, optionally filtered by radio call
    async fn resources(&self, token: &str, radio_call: Option<&str>) -> ApiResult<Vec<Resource>>;

    async fn send_message(
        &self,
        token: &str,
        mission_id: Uuid,
        message: &MissionMessage,
    ) -> ApiResult<()>;

    async fn messages(&self, token: &str, mission_id: Uuid) -> ApiResult<Vec<MissionMessage>>;
}
