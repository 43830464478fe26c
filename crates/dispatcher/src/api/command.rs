//! Command service client
//!
//! Every request carries the configured API-key header. Authenticated calls
//! additionally send `Authorization: Bearer <token>`.

use std::time::Duration;

use contracts::CommandConfig;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    ApiError, ApiResult, CommandApi, HealthStatus, Mission, MissionMessage, MissionResource,
    Resource,
};

const AUTHENTICATE_PATH: &str = "/api/v1/Authenticate";
const HEALTH_PATH: &str = "/api/v1/HealthCheck";
const REST_API_PATH: &str = "/internal/api/v1/RestApi";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateRequest<'a> {
    user_name: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthenticateResponse {
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    cimgate_status_enum: i64,
}

/// `reqwest` client for the command service
#[derive(Debug, Clone)]
pub struct CommandClient {
    client: Client,
    base_url: String,
    api_key_header: String,
    api_key: String,
}

impl CommandClient {
    pub fn new(config: &CommandConfig) -> ApiResult<Self> {
        Self::with_timeout(
            &config.base_url,
            &config.api_key_header,
            &config.api_key,
            config.timeout(),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        api_key_header: &str,
        api_key: &str,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key_header: api_key_header.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, url = %url, "Command service request");

        let builder = self
            .client
            .request(method, url)
            .header(self.api_key_header.as_str(), self.api_key.as_str());
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Body(e.to_string()))
}

fn mission_path(mission_id: Uuid, tail: &str) -> String {
    format!("{REST_API_PATH}/Mission/{mission_id}/{tail}")
}

impl CommandApi for CommandClient {
    #[instrument(name = "command_authenticate", skip(self, password))]
    async fn authenticate(&self, username: &str, password: &str) -> ApiResult<String> {
        let response = self
            .request(Method::POST, AUTHENTICATE_PATH, None)
            .json(&AuthenticateRequest {
                user_name: username,
                password,
            })
            .send()
            .await?;

        let body: AuthenticateResponse = read_json(response).await?;
        match body.result {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ApiError::Body("authentication response has no token".into())),
        }
    }

    #[instrument(name = "command_health", skip(self))]
    async fn health(&self) -> ApiResult<HealthStatus> {
        let response = self.request(Method::GET, HEALTH_PATH, None).send().await?;
        let body: HealthResponse = read_json(response).await?;
        Ok(HealthStatus::from_code(body.cimgate_status_enum))
    }

    #[instrument(name = "command_missions", skip_all)]
    async fn missions(&self, token: &str) -> ApiResult<Vec<Mission>> {
        let path = format!("{REST_API_PATH}/Mission");
        let response = self.request(Method::GET, &path, Some(token)).send().await?;
        read_json(response).await
    }

    #[instrument(name = "command_mission_resources", skip(self, token))]
    async fn mission_resources(
        &self,
        token: &str,
        mission_id: Uuid,
    ) -> ApiResult<Vec<MissionResource>> {
        let path = mission_path(mission_id, "MissionResource");
        let response = self.request(Method::GET, &path, Some(token)).send().await?;
        read_json(response).await
    }

    #[instrument(name = "command_resources", skip(self, token))]
    async fn resources(&self, token: &str, radio_call: Option<&str>) -> ApiResult<Vec<Resource>> {
        let path = format!("{REST_API_PATH}/Resource");
        let mut request = self.request(Method::GET, &path, Some(token));
        if let Some(radio_call) = radio_call {
            request = request.query(&[("radioCall", radio_call)]);
        }
        let response = request.send().await?;
        read_json(response).await
    }

    #[instrument(name = "command_send_message", skip(self, token, message))]
    async fn send_message(
        &self,
        token: &str,
        mission_id: Uuid,
        message: &MissionMessage,
    ) -> ApiResult<()> {
        let path = mission_path(mission_id, "Message");
        let response = self
            .request(Method::POST, &path, Some(token))
            .json(message)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    #[instrument(name = "command_messages", skip(self, token))]
    async fn messages(&self, token: &str, mission_id: Uuid) -> ApiResult<Vec<MissionMessage>> {
        let path = mission_path(mission_id, "Message");
        let response = self.request(Method::GET, &path, Some(token)).send().await?;
        read_json(response).await
    }
}
