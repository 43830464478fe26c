//! Layered error definitions
//!
//! Categorized by source: config / decode / auth / delivery / transport

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Ingestion Errors =====
    /// Inbound payload could not be decoded
    #[error("decode error on topic '{topic}': {message}")]
    Decode { topic: String, message: String },

    /// Event queue no longer accepts entries
    #[error("event queue closed")]
    QueueClosed,

    // ===== Sink Errors =====
    /// Session credential could not be obtained
    #[error("auth error for '{service}': {message}")]
    Auth { service: String, message: String },

    /// Sink request failed
    #[error("sink '{sink_name}' delivery error: {message}")]
    Delivery { sink_name: String, message: String },

    // ===== Transport Errors =====
    /// Subscribe / publish / disconnect failure
    #[error("transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create decode error
    pub fn decode(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create auth error
    pub fn auth(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create sink delivery error
    pub fn delivery(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } => "config_parse",
            Self::ConfigValidation { .. } => "config_validation",
            Self::Decode { .. } => "decode",
            Self::QueueClosed => "queue_closed",
            Self::Auth { .. } => "auth",
            Self::Delivery { .. } => "delivery",
            Self::Transport { .. } => "transport",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}
