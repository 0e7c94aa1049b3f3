//! Typed messages exchanged with the automation agent.
//!
//! The transport is an un-addressed broadcast bus carrying arbitrary JSON,
//! so every frame is decoded defensively: anything that is not one of
//! these three message types is somebody else's traffic.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Hands the form data to the agent (app → agent)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StorePayload {
    /// Correlation id echoed back by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub request_id: Option<String>,
    /// Business fields plus `user_id` and `case_id`
    #[ts(type = "Record<string, unknown>")]
    pub payload: serde_json::Value,
}

/// Acknowledges receipt of a payload (agent → app)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PayloadStored {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub request_id: Option<String>,
    pub success: bool,
    /// Agent-side reason when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
}

/// Progress or terminal signal from the agent (agent → app).
///
/// Each message is self-contained and replaces the previous status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FillingStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub request_id: Option<String>,
    pub stage: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub requires_manual_action: bool,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub success: bool,
}

/// Every message type on the bridge, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, JsonSchema)]
#[serde(tag = "type")]
#[ts(export)]
pub enum BridgeMessage {
    #[serde(rename = "STORE_PAYLOAD")]
    StorePayload(StorePayload),
    #[serde(rename = "PAYLOAD_STORED")]
    PayloadStored(PayloadStored),
    #[serde(rename = "FILLING_STATUS")]
    FillingStatus(FillingStatus),
}

impl BridgeMessage {
    /// Decode a raw frame; `None` for unrelated or malformed traffic
    pub fn from_frame(frame: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(frame.clone()).ok()
    }

    /// Encode as a raw frame
    pub fn to_frame(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeMessage::StorePayload(_) => "STORE_PAYLOAD",
            BridgeMessage::PayloadStored(_) => "PAYLOAD_STORED",
            BridgeMessage::FillingStatus(_) => "FILLING_STATUS",
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            BridgeMessage::StorePayload(m) => m.request_id.as_deref(),
            BridgeMessage::PayloadStored(m) => m.request_id.as_deref(),
            BridgeMessage::FillingStatus(m) => m.request_id.as_deref(),
        }
    }
}
