//! In-process doubles for the REST clients and sinks
//!
//! Used by unit tests here and by the lifecycle and end-to-end tests in
//! other crates. Every double is cheap to clone; clones share state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{ContractError, EventSink, FusedEvent};
use uuid::Uuid;

use crate::api::{
    ApiError, ApiResult, CommandApi, HealthStatus, Mission, MissionMessage, MissionResource,
    Resource, TranscriptEntry, TranscriptionApi,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(what: &str) -> ApiError {
    ApiError::Status {
        status: 503,
        body: format!("injected {what} failure"),
    }
}

// ============================================================================
// FakeTranscriptionApi
// ============================================================================

#[derive(Debug, Default)]
struct TranscriptionState {
    entries: Mutex<Vec<TranscriptEntry>>,
    calls: AtomicU64,
    fail: AtomicBool,
}

/// Records every `add_messages` call
#[derive(Debug, Clone, Default)]
pub struct FakeTranscriptionApi {
    state: Arc<TranscriptionState>,
}

impl FakeTranscriptionApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Entries received by successful calls
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        lock(&self.state.entries).clone()
    }
}

impl TranscriptionApi for FakeTranscriptionApi {
    async fn add_messages(&self, entries: &[TranscriptEntry]) -> ApiResult<()> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail.load(Ordering::SeqCst) {
            return Err(injected("transcription"));
        }
        lock(&self.state.entries).extend_from_slice(entries);
        Ok(())
    }
}

// ============================================================================
// FakeCommandApi
// ============================================================================

#[derive(Debug, Default)]
struct CommandState {
    auth_calls: AtomicU64,
    send_calls: AtomicU64,
    resource_calls: AtomicU64,
    fail_auth: AtomicBool,
    fail_send: AtomicBool,
    fail_listing: AtomicBool,
    missions: Mutex<Vec<Mission>>,
    mission_resources: Mutex<Vec<MissionResource>>,
    sent: Mutex<Vec<(Uuid, MissionMessage)>>,
    tokens_seen: Mutex<Vec<String>>,
}

/// Command service double issuing tokens `token-1`, `token-2`, …
#[derive(Debug, Clone, Default)]
pub struct FakeCommandApi {
    state: Arc<CommandState>,
}

impl FakeCommandApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_auth(&self, fail: bool) {
        self.state.fail_auth.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.state.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Make mission and resource listings fail
    pub fn set_fail_listing(&self, fail: bool) {
        self.state.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn set_missions(&self, missions: Vec<Mission>) {
        *lock(&self.state.missions) = missions;
    }

    pub fn set_mission_resources(&self, resources: Vec<MissionResource>) {
        *lock(&self.state.mission_resources) = resources;
    }

    pub fn auth_calls(&self) -> u64 {
        self.state.auth_calls.load(Ordering::SeqCst)
    }

    /// Number of `send_message` calls, successful or not
    pub fn send_calls(&self) -> u64 {
        self.state.send_calls.load(Ordering::SeqCst)
    }

    /// Number of unfiltered `resources` listings
    pub fn resource_calls(&self) -> u64 {
        self.state.resource_calls.load(Ordering::SeqCst)
    }

    /// Messages accepted by `send_message`
    pub fn sent(&self) -> Vec<(Uuid, MissionMessage)> {
        lock(&self.state.sent).clone()
    }

    /// Distinct bearer tokens presented on authenticated calls, in order
    pub fn tokens_seen(&self) -> Vec<String> {
        lock(&self.state.tokens_seen).clone()
    }

    fn see_token(&self, token: &str) {
        let mut seen = lock(&self.state.tokens_seen);
        if !seen.iter().any(|t| t == token) {
            seen.push(token.to_string());
        }
    }

    fn check_listing(&self, token: &str) -> ApiResult<()> {
        self.see_token(token);
        if self.state.fail_listing.load(Ordering::SeqCst) {
            return Err(injected("listing"));
        }
        Ok(())
    }
}

impl CommandApi for FakeCommandApi {
    async fn authenticate(&self, _username: &str, _password: &str) -> ApiResult<String> {
        let n = self.state.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.state.fail_auth.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 401,
                body: "invalid credentials".into(),
            });
        }
        Ok(format!("token-{n}"))
    }

    async fn health(&self) -> ApiResult<HealthStatus> {
        Ok(HealthStatus::Healthy)
    }

    async fn missions(&self, token: &str) -> ApiResult<Vec<Mission>> {
        self.check_listing(token)?;
        Ok(lock(&self.state.missions).clone())
    }

    async fn mission_resources(
        &self,
        token: &str,
        mission_id: Uuid,
    ) -> ApiResult<Vec<MissionResource>> {
        self.check_listing(token)?;
        Ok(lock(&self.state.mission_resources)
            .iter()
            .filter(|r| r.mission_id == mission_id)
            .cloned()
            .collect())
    }

    async fn resources(&self, token: &str, _radio_call: Option<&str>) -> ApiResult<Vec<Resource>> {
        self.state.resource_calls.fetch_add(1, Ordering::SeqCst);
        self.check_listing(token)?;
        Ok(Vec::new())
    }

    async fn send_message(
        &self,
        token: &str,
        mission_id: Uuid,
        message: &MissionMessage,
    ) -> ApiResult<()> {
        self.see_token(token);
        self.state.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_send.load(Ordering::SeqCst) {
            return Err(injected("send"));
        }
        lock(&self.state.sent).push((mission_id, message.clone()));
        Ok(())
    }

    async fn messages(&self, token: &str, mission_id: Uuid) -> ApiResult<Vec<MissionMessage>> {
        self.check_listing(token)?;
        Ok(lock(&self.state.sent)
            .iter()
            .filter(|(id, _)| *id == mission_id)
            .map(|(_, m)| m.clone())
            .collect())
    }
}

// ============================================================================
// RecordingSink
// ============================================================================

#[derive(Debug, Default)]
struct SinkState {
    events: Mutex<Vec<FusedEvent>>,
    fail: AtomicBool,
    flushed: AtomicBool,
    closed: AtomicBool,
}

/// Sink that records every event written to it
#[derive(Debug, Clone)]
pub struct RecordingSink {
    name: String,
    state: Arc<SinkState>,
}

impl RecordingSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<FusedEvent> {
        lock(&self.state.events).clone()
    }

    pub fn is_flushed(&self) -> bool {
        self.state.flushed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl EventSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, event: &FusedEvent) -> Result<(), ContractError> {
        if self.state.fail.load(Ordering::SeqCst) {
            return Err(ContractError::delivery(&self.name, "injected failure"));
        }
        lock(&self.state.events).push(event.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.state.flushed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
