//! The payload handed across the context boundary.

use serde_json::{Map, Value};

use super::error::BridgeError;
use crate::store::Session;

/// Business form fields plus the session ids the agent needs.
/// Immutable once sent.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationRequest {
    fields: Map<String, Value>,
    user_id: Option<String>,
    case_id: Option<String>,
}

impl AutomationRequest {
    /// Wrap form data; it must be a JSON object
    pub fn new(fields: Value) -> Result<Self, BridgeError> {
        match fields {
            Value::Object(fields) => Ok(Self {
                fields,
                user_id: None,
                case_id: None,
            }),
            _ => Err(BridgeError::InvalidPayload),
        }
    }

    /// Attach the session's user and case ids
    pub fn with_session(mut self, session: &Session) -> Self {
        self.user_id = session.user_id.clone();
        self.case_id = session.case_id.clone();
        self
    }

    pub fn with_case_id(mut self, case_id: Option<String>) -> Self {
        self.case_id = case_id;
        self
    }

    pub fn case_id(&self) -> Option<&str> {
        self.case_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Flattened wire payload; attached ids win over same-named fields
    pub fn to_payload(&self) -> Value {
        let mut payload = self.fields.clone();
        payload.insert("user_id".to_string(), json_opt(self.user_id.as_deref()));
        payload.insert("case_id".to_string(), json_opt(self.case_id.as_deref()));
        Value::Object(payload)
    }
}

fn json_opt(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |v| Value::String(v.to_string()))
}
