use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::api::SessionApi;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::models::{AnalysisRequest, SessionConfig, SessionStatus, SignalAction, SignalEvent, SignalOutcome};

pub fn make_signal(pair: &str, ts: f64) -> SignalEvent {
    SignalEvent {
        pair: pair.to_string(),
        action: SignalAction::Call,
        confidence: 75.0,
        timestamp: ts,
        status: SignalOutcome::Pending,
    }
}

pub fn make_status(active: bool) -> SessionStatus {
    SessionStatus {
        active,
        ..SessionStatus::default()
    }
}

/// Scripted in-memory backend for unit tests: serves a programmable status
/// and counts calls.
#[derive(Default)]
pub struct ScriptedApi {
    pub status: Mutex<SessionStatus>,
    pub fail_fetch: Mutex<bool>,
    pub fetch_calls: AtomicUsize,
    pub token_failures_left: Mutex<u32>,
    pub token_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn with_status(status: SessionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            ..Self::default()
        }
    }

    pub fn set_status(&self, status: SessionStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        *self.fail_fetch.lock().unwrap() = fail;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn token_count(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionApi for ScriptedApi {
    async fn fetch_status(&self, _identity: &Identity) -> Result<SessionStatus, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_fetch.lock().unwrap() {
            return Err(ApiError::Backend {
                status: 503,
                detail: "backend unavailable".to_string(),
            });
        }
        Ok(self.status.lock().unwrap().clone())
    }

    async fn start_session(&self, _config: &SessionConfig) -> Result<(), ApiError> {
        self.status.lock().unwrap().active = true;
        Ok(())
    }

    async fn stop_session(&self, _identity: &Identity) -> Result<(), ApiError> {
        self.status.lock().unwrap().active = false;
        Ok(())
    }

    async fn sync_token(&self, _identity: &Identity, _token: &str) -> Result<(), ApiError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        let mut left = self.token_failures_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Err(ApiError::Backend {
                status: 500,
                detail: "token store unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<SignalEvent, ApiError> {
        Ok(make_signal(&request.pair, 1712345678.0))
    }
}
