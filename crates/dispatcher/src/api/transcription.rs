//! Transcription service client

use std::time::Duration;

use contracts::TranscriptionConfig;
use reqwest::Client;
use tracing::{debug, instrument};

use super::{ApiError, ApiResult, TranscriptEntry, TranscriptionApi};

/// `reqwest` client for the transcription service
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl TranscriptionClient {
    pub fn new(config: &TranscriptionConfig) -> ApiResult<Self> {
        Self::with_timeout(
            &config.base_url,
            &config.username,
            &config.password,
            config.timeout(),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl TranscriptionApi for TranscriptionClient {
    #[instrument(name = "transcription_add_messages", skip_all, fields(count = entries.len()))]
    async fn add_messages(&self, entries: &[TranscriptEntry]) -> ApiResult<()> {
        let url = format!("{}/add_messages", self.base_url);
        debug!(url = %url, "Sending transcript entries");

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(entries)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
