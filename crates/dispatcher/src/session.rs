//! Session manager for the command service
//!
//! Caches a bearer token and renews it before expiry. The cached credential
//! sits behind a `tokio::sync::Mutex` held across the authentication call,
//! so concurrent callers wait for a single renewal instead of racing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{CommandConfig, ContractError, MissionId};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::api::{CommandApi, HealthStatus, Mission, MissionMessage, MissionResource, Resource};

/// Service name used in auth and delivery errors
pub const COMMAND_SERVICE: &str = "command";

/// Bearer token with its local expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    token: String,
    valid_until: Instant,
}

impl SessionCredential {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn valid_until(&self) -> Instant {
        self.valid_until
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.valid_until
    }
}

/// Owner of the command-service session
pub struct SessionManager<A> {
    api: A,
    username: String,
    password: String,
    ttl: Duration,
    margin: Duration,
    credential: Mutex<Option<SessionCredential>>,
    authentications: AtomicU64,
}

impl<A: CommandApi + Sync> SessionManager<A> {
    pub fn new(api: A, config: &CommandConfig) -> Self {
        Self::with_timing(
            api,
            &config.username,
            &config.password,
            config.token_ttl(),
            config.token_margin(),
        )
    }

    pub fn with_timing(
        api: A,
        username: &str,
        password: &str,
        ttl: Duration,
        margin: Duration,
    ) -> Self {
        Self {
            api,
            username: username.to_string(),
            password: password.to_string(),
            ttl,
            margin,
            credential: Mutex::new(None),
            authentications: AtomicU64::new(0),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Usable lifetime of a fresh token
    pub fn lifetime(&self) -> Duration {
        self.ttl.saturating_sub(self.margin)
    }

    /// Number of authentication calls made so far
    pub fn authentications(&self) -> u64 {
        self.authentications.load(Ordering::Relaxed)
    }

    /// Return a credential that is valid now, authenticating if needed
    ///
    /// A failed renewal leaves the previous credential cached; it is still
    /// never handed out past `valid_until`.
    #[instrument(name = "session_ensure_credential", skip(self))]
    pub async fn ensure_valid_credential(&self) -> Result<SessionCredential, ContractError> {
        let mut cached = self.credential.lock().await;
        let now = Instant::now();

        if let Some(credential) = cached.as_ref().filter(|c| c.is_valid_at(now)) {
            debug!(
                remaining_secs = (credential.valid_until - now).as_secs(),
                "Session token still valid"
            );
            observability::record_token_check("cached");
            return Ok(credential.clone());
        }

        self.authentications.fetch_add(1, Ordering::Relaxed);
        match self.api.authenticate(&self.username, &self.password).await {
            Ok(token) => {
                let credential = SessionCredential {
                    token,
                    valid_until: Instant::now() + self.lifetime(),
                };
                info!(
                    lifetime_secs = self.lifetime().as_secs(),
                    "Session token renewed"
                );
                observability::record_token_check("renewed");
                *cached = Some(credential.clone());
                Ok(credential)
            }
            Err(e) => {
                warn!(error = %e, "Session authentication failed");
                observability::record_token_check("failed");
                Err(ContractError::auth(COMMAND_SERVICE, e.to_string()))
            }
        }
    }

    /// Drop the cached credential
    pub async fn invalidate(&self) {
        if self.credential.lock().await.take().is_some() {
            debug!("Session token invalidated");
        }
    }

    /// Unauthenticated health probe
    pub async fn health(&self) -> Result<HealthStatus, ContractError> {
        self.api.health().await.map_err(delivery_error)
    }

    pub async fn missions(&self) -> Result<Vec<Mission>, ContractError> {
        let credential = self.ensure_valid_credential().await?;
        self.api
            .missions(credential.token())
            .await
            .map_err(delivery_error)
    }

    pub async fn mission_resources(
        &self,
        mission_id: MissionId,
    ) -> Result<Vec<MissionResource>, ContractError> {
        let credential = self.ensure_valid_credential().await?;
        self.api
            .mission_resources(credential.token(), *mission_id.as_uuid())
            .await
            .map_err(delivery_error)
    }

    pub async fn resources(
        &self,
        radio_call: Option<&str>,
    ) -> Result<Vec<Resource>, ContractError> {
        let credential = self.ensure_valid_credential().await?;
        self.api
            .resources(credential.token(), radio_call)
            .await
            .map_err(delivery_error)
    }

    pub async fn send_message(
        &self,
        mission_id: MissionId,
        message: &MissionMessage,
    ) -> Result<(), ContractError> {
        let credential = self.ensure_valid_credential().await?;
        self.api
            .send_message(credential.token(), *mission_id.as_uuid(), message)
            .await
            .map_err(delivery_error)
    }

    pub async fn messages(
        &self,
        mission_id: MissionId,
    ) -> Result<Vec<MissionMessage>, ContractError> {
        let credential = self.ensure_valid_credential().await?;
        self.api
            .messages(credential.token(), *mission_id.as_uuid())
            .await
            .map_err(delivery_error)
    }
}

fn delivery_error(e: crate::api::ApiError) -> ContractError {
    ContractError::delivery(COMMAND_SERVICE, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCommandApi;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(15 * 60);
    const MARGIN: Duration = Duration::from_secs(60);

    fn manager(api: FakeCommandApi) -> SessionManager<FakeCommandApi> {
        SessionManager::with_timing(api, "user", "pw", TTL, MARGIN)
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_reused_within_lifetime() {
        let api = FakeCommandApi::new();
        let session = manager(api.clone());

        let first = session.ensure_valid_credential().await.unwrap();
        for _ in 0..13 {
            tokio::time::advance(Duration::from_secs(60)).await;
            let again = session.ensure_valid_credential().await.unwrap();
            assert_eq!(again.token(), first.token());
        }
        // 13 minutes in, still one authentication
        assert_eq!(api.auth_calls(), 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        session.ensure_valid_credential().await.unwrap();
        assert_eq!(api.auth_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_renewed_after_lifetime() {
        let api = FakeCommandApi::new();
        let session = manager(api.clone());

        let first = session.ensure_valid_credential().await.unwrap();
        tokio::time::advance(Duration::from_secs(14 * 60)).await;

        let renewed = session.ensure_valid_credential().await.unwrap();
        assert_ne!(renewed.token(), first.token());
        assert_eq!(api.auth_calls(), 2);
        assert_eq!(session.authentications(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_renewal_keeps_old_token_unused() {
        let api = FakeCommandApi::new();
        let session = manager(api.clone());

        session.ensure_valid_credential().await.unwrap();
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        api.set_fail_auth(true);
        let err = session.ensure_valid_credential().await.unwrap_err();
        assert!(matches!(err, ContractError::Auth { .. }));

        // the expired token is never handed out, even after another failure
        assert!(session.ensure_valid_credential().await.is_err());
        assert_eq!(api.auth_calls(), 3);

        api.set_fail_auth(false);
        assert!(session.ensure_valid_credential().await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_authentication() {
        let api = FakeCommandApi::new();
        let session = Arc::new(manager(api.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move { session.ensure_valid_credential().await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().token(), "token-1");
        }
        assert_eq!(api.auth_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_renewal() {
        let api = FakeCommandApi::new();
        let session = manager(api.clone());

        session.ensure_valid_credential().await.unwrap();
        session.invalidate().await;
        let credential = session.ensure_valid_credential().await.unwrap();

        assert_eq!(credential.token(), "token-2");
        assert_eq!(api.auth_calls(), 2);
    }

    #[tokio::test]
    async fn test_authenticated_calls_use_current_token() {
        let api = FakeCommandApi::new();
        let mission = MissionId::random();
        api.set_missions(vec![Mission {
            id: *mission.as_uuid(),
            name: None,
        }]);
        let session = manager(api.clone());

        let missions = session.missions().await.unwrap();
        assert_eq!(missions.len(), 1);
        assert!(session.health().await.unwrap().is_healthy());
        assert_eq!(api.tokens_seen(), vec!["token-1".to_string()]);
    }
}
