//! Error types for CLI operations.

use dispatcher::DispatcherError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Broker connection or subscription error
    #[error("Broker error at {host}:{port}: {message}")]
    Broker {
        host: String,
        port: u16,
        message: String,
    },

    /// Bridge could not be assembled
    #[error("Bridge startup failed: {0}")]
    Startup(#[from] DispatcherError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn broker(host: impl Into<String>, port: u16, message: impl Into<String>) -> Self {
        Self::Broker {
            host: host.into(),
            port,
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
