//! Mock backend for testing

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::backend::{CaseRecord, IntakeBackend, SavedProgress};
use super::error::ApiError;

/// Record of a call made against the mock
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: String,
    pub token: Option<String>,
    pub case_id: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Scriptable in-process backend
#[derive(Clone)]
pub struct MockBackend {
    /// Response returned by `load_progress`
    pub progress: Arc<Mutex<Result<Option<SavedProgress>, ApiError>>>,
    /// Id handed out by `create_case`; `None` makes creation fail
    pub next_case_id: Arc<Mutex<Option<String>>>,
    /// Whether `update_case` fails
    pub fail_updates: Arc<Mutex<bool>>,
    /// Record of calls executed
    pub call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Backend with no saved progress that creates case `case-1`
    pub fn new() -> Self {
        Self {
            progress: Arc::new(Mutex::new(Ok(None))),
            next_case_id: Arc::new(Mutex::new(Some("case-1".to_string()))),
            fail_updates: Arc::new(Mutex::new(false)),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Backend that returns the given saved progress
    pub fn with_progress(progress: SavedProgress) -> Self {
        let mock = Self::new();
        *mock.progress.lock().unwrap() = Ok(Some(progress));
        mock
    }

    /// Backend whose every call fails with the given error
    pub fn failing(error: ApiError) -> Self {
        let mock = Self::new();
        *mock.progress.lock().unwrap() = Err(error);
        *mock.next_case_id.lock().unwrap() = None;
        *mock.fail_updates.lock().unwrap() = true;
        mock
    }

    /// Get the call log
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Count calls of one operation
    pub fn call_count(&self, operation: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn log_call(
        &self,
        operation: &str,
        token: Option<&str>,
        case_id: Option<&str>,
        body: Option<&serde_json::Value>,
    ) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            token: token.map(str::to_string),
            case_id: case_id.map(str::to_string),
            body: body.cloned(),
        });
    }
}

#[async_trait]
impl IntakeBackend for MockBackend {
    async fn load_progress(&self, token: &str) -> Result<Option<SavedProgress>, ApiError> {
        self.log_call("load_progress", Some(token), None, None);
        self.progress.lock().unwrap().clone()
    }

    async fn create_case(
        &self,
        token: Option<&str>,
        draft: &serde_json::Value,
    ) -> Result<CaseRecord, ApiError> {
        self.log_call("create_case", token, None, Some(draft));
        match self.next_case_id.lock().unwrap().clone() {
            Some(id) => Ok(CaseRecord {
                id,
                status: Some("draft".to_string()),
            }),
            None => Err(ApiError::HttpError {
                endpoint: "cases".to_string(),
                status: 500,
                message: "mock failure".to_string(),
            }),
        }
    }

    async fn update_case(
        &self,
        token: Option<&str>,
        case_id: &str,
        patch: &serde_json::Value,
    ) -> Result<CaseRecord, ApiError> {
        self.log_call("update_case", token, Some(case_id), Some(patch));
        if *self.fail_updates.lock().unwrap() {
            return Err(ApiError::network("cases", "mock failure"));
        }
        Ok(CaseRecord {
            id: case_id.to_string(),
            status: Some("updated".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_logs_calls() {
        let backend = MockBackend::new();
        backend.load_progress("tok").await.unwrap();
        let record = backend
            .create_case(None, &serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(record.id, "case-1");

        assert_eq!(backend.call_count("load_progress"), 1);
        assert_eq!(backend.call_count("create_case"), 1);
        assert_eq!(backend.calls()[0].token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = MockBackend::failing(ApiError::NotConfigured);
        assert!(backend.load_progress("tok").await.is_err());
        assert!(backend.create_case(None, &serde_json::Value::Null).await.is_err());
        assert!(backend
            .update_case(None, "c", &serde_json::Value::Null)
            .await
            .is_err());
    }
}
