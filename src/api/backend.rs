//! REST collaborator used by the orchestration core.
//!
//! Only three calls matter here: loading saved onboarding progress on
//! mount, and creating/updating the case a legal-form submission belongs
//! to. Everything else the backend does is out of reach of this crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::ApiError;
use crate::config::BackendConfig;
use crate::steps::EligibilityResult;

const PROGRESS_ENDPOINT: &str = "onboarding/progress";
const CASES_ENDPOINT: &str = "cases";

/// Previously saved onboarding progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProgress {
    /// Step name as the backend stored it (may be a legacy alias)
    #[serde(default)]
    pub step: Option<String>,
    /// Prior answer sets, keyed by screen
    #[serde(default)]
    pub answers: Option<serde_json::Value>,
    #[serde(default)]
    pub eligibility: Option<EligibilityResult>,
}

/// Minimal view of a case record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Backend calls consumed by the step controller and the legal form
#[async_trait]
pub trait IntakeBackend: Send + Sync {
    /// Load saved onboarding progress for the signed-in user.
    /// `Ok(None)` means the user has none.
    async fn load_progress(&self, token: &str) -> Result<Option<SavedProgress>, ApiError>;

    /// Create a case from a draft payload
    async fn create_case(
        &self,
        token: Option<&str>,
        draft: &serde_json::Value,
    ) -> Result<CaseRecord, ApiError>;

    /// Patch an existing case
    async fn update_case(
        &self,
        token: Option<&str>,
        case_id: &str,
        patch: &serde_json::Value,
    ) -> Result<CaseRecord, ApiError>;
}

/// Build the backend described by configuration
pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn IntakeBackend>, ApiError> {
    match config.base_url.as_deref().map(str::trim) {
        Some(base_url) if !base_url.is_empty() => Ok(Arc::new(HttpBackend::new(
            base_url,
            Duration::from_secs(config.timeout_secs),
        )?)),
        _ => Ok(Arc::new(OfflineBackend)),
    }
}

/// JSON-over-HTTP backend
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::network("client", e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Absolute URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(endpoint, e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(endpoint, status.as_u16(), body));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| ApiError::decode(endpoint, e.to_string()))
    }
}

#[async_trait]
impl IntakeBackend for HttpBackend {
    #[instrument(skip_all)]
    async fn load_progress(&self, token: &str) -> Result<Option<SavedProgress>, ApiError> {
        let request = self.client.get(self.url(PROGRESS_ENDPOINT)).bearer_auth(token);
        match self
            .send_json::<SavedProgress>(PROGRESS_ENDPOINT, request)
            .await
        {
            Ok(progress) => {
                debug!(has_progress = progress.is_some(), "Loaded onboarding progress");
                Ok(progress)
            }
            // No progress saved yet
            Err(ApiError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all)]
    async fn create_case(
        &self,
        token: Option<&str>,
        draft: &serde_json::Value,
    ) -> Result<CaseRecord, ApiError> {
        let request =
            Self::authorize(self.client.post(self.url(CASES_ENDPOINT)), token).json(draft);
        self.send_json(CASES_ENDPOINT, request)
            .await?
            .ok_or_else(|| ApiError::decode(CASES_ENDPOINT, "empty response body"))
    }

    #[instrument(skip_all, fields(case_id = %case_id))]
    async fn update_case(
        &self,
        token: Option<&str>,
        case_id: &str,
        patch: &serde_json::Value,
    ) -> Result<CaseRecord, ApiError> {
        let path = format!("{}/{}", CASES_ENDPOINT, case_id);
        let request = Self::authorize(self.client.patch(self.url(&path)), token).json(patch);
        self.send_json(CASES_ENDPOINT, request)
            .await?
            .ok_or_else(|| ApiError::decode(CASES_ENDPOINT, "empty response body"))
    }
}

/// Backend used when no base URL is configured; every call fails with
/// [`ApiError::NotConfigured`].
pub struct OfflineBackend;

#[async_trait]
impl IntakeBackend for OfflineBackend {
    async fn load_progress(&self, _token: &str) -> Result<Option<SavedProgress>, ApiError> {
        Err(ApiError::NotConfigured)
    }

    async fn create_case(
        &self,
        _token: Option<&str>,
        _draft: &serde_json::Value,
    ) -> Result<CaseRecord, ApiError> {
        Err(ApiError::NotConfigured)
    }

    async fn update_case(
        &self,
        _token: Option<&str>,
        _case_id: &str,
        _patch: &serde_json::Value,
    ) -> Result<CaseRecord, ApiError> {
        Err(ApiError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_cleanly() {
        let backend =
            HttpBackend::new("https://api.example.test/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            backend.url("/onboarding/progress"),
            "https://api.example.test/v1/onboarding/progress"
        );
        assert_eq!(backend.url("cases/7"), "https://api.example.test/v1/cases/7");
    }

    #[test]
    fn test_saved_progress_decodes_partial_body() {
        let progress: SavedProgress =
            serde_json::from_str(r#"{"step":"checkout","answers":{"questionnaire":{"q1":"yes"}}}"#)
                .unwrap();
        assert_eq!(progress.step.as_deref(), Some("checkout"));
        assert!(progress.answers.is_some());
        assert_eq!(progress.eligibility, None);
    }

    #[tokio::test]
    async fn test_offline_backend_is_not_configured() {
        let backend = OfflineBackend;
        assert_eq!(
            backend.load_progress("tok").await,
            Err(ApiError::NotConfigured)
        );
    }

    #[test]
    fn test_from_config_without_url_is_offline() {
        let config = BackendConfig::default();
        assert!(from_config(&config).is_ok());
    }
}
