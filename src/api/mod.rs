pub mod http;

pub use http::HttpSessionApi;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::identity::Identity;
use crate::models::{AnalysisRequest, SessionConfig, SessionStatus, SignalEvent};

/// The backend contract surface. Behind a trait so tests and alternative
/// transports can stand in for the HTTP client.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn fetch_status(&self, identity: &Identity) -> Result<SessionStatus, ApiError>;
    async fn start_session(&self, config: &SessionConfig) -> Result<(), ApiError>;
    async fn stop_session(&self, identity: &Identity) -> Result<(), ApiError>;
    async fn sync_token(&self, identity: &Identity, token: &str) -> Result<(), ApiError>;
    async fn analyze(&self, request: &AnalysisRequest) -> Result<SignalEvent, ApiError>;
}
