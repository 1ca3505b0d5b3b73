use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;

use crate::api::SessionApi;
use crate::config::Config;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::models::{AnalysisRequest, SessionConfig, SessionStatus, SignalEvent};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

pub struct HttpSessionApi {
    client: Client,
    base_url: String,
}

impl HttpSessionApi {
    pub fn new(cfg: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(cfg.timing.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Maps a non-2xx response to the backend's `detail` message; falls back
    /// to the raw body, then the status line.
    async fn check(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(extract_detail(status.as_u16(), &body))
    }
}

fn extract_detail(status: u16, body: &str) -> ApiError {
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.detail,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => format!("backend returned HTTP {}", status),
    };
    ApiError::Backend { status, detail }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn fetch_status(&self, identity: &Identity) -> Result<SessionStatus, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/status/{}", identity.id())))
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }

    async fn start_session(&self, config: &SessionConfig) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.url("/start"))
            .json(config)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn stop_session(&self, identity: &Identity) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.url(&format!("/stop/{}", identity.id())))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn sync_token(&self, identity: &Identity, token: &str) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.url("/token"))
            .json(&json!({ "email": identity.id(), "token": token }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<SignalEvent, ApiError> {
        let resp = self
            .client
            .post(self.url("/analyze"))
            .json(request)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_field_is_surfaced_verbatim() {
        let err = extract_detail(400, r#"{"detail": "Invalid broker credentials"}"#);
        assert_eq!(err.to_string(), "Invalid broker credentials");
        assert!(matches!(err, ApiError::Backend { status: 400, .. }));
    }

    #[test]
    fn non_json_body_falls_back_to_raw_text() {
        let err = extract_detail(502, "Bad Gateway");
        assert_eq!(err.to_string(), "Bad Gateway");
        assert!(err.is_transient());
    }

    #[test]
    fn empty_body_falls_back_to_status_line() {
        let err = extract_detail(404, "");
        assert_eq!(err.to_string(), "backend returned HTTP 404");
        assert!(!err.is_transient());
    }
}
