//! The bridge's single piece of mutable state during a run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::messages::FillingStatus;

/// Stage names produced by the bridge itself. Agent progress messages may
/// carry any other stage name.
pub mod stage {
    pub const IDLE: &str = "idle";
    pub const AWAITING_ACK: &str = "awaiting_ack";
    pub const OPENING_FORM: &str = "opening_form";
    pub const FILLING_FORM: &str = "filling_form";
    pub const ERROR: &str = "error";
    pub const TIMEOUT: &str = "timeout";
    pub const DISCONNECTED: &str = "disconnected";
}

/// Status of one automation run as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AutomationStatus {
    pub stage: String,
    pub message: String,
    pub is_error: bool,
    pub requires_manual_action: bool,
    pub is_complete: bool,
    /// Only meaningful once `is_complete` is true
    pub success: bool,
    /// Set when the status came from an agent progress message rather
    /// than from the bridge itself
    #[serde(default)]
    pub agent_reported: bool,
}

impl Default for AutomationStatus {
    fn default() -> Self {
        Self::idle()
    }
}

impl AutomationStatus {
    fn working(stage: &str, message: &str) -> Self {
        Self {
            stage: stage.to_string(),
            message: message.to_string(),
            is_error: false,
            requires_manual_action: false,
            is_complete: false,
            success: false,
            agent_reported: false,
        }
    }

    fn failed(stage: &str, message: String) -> Self {
        Self {
            stage: stage.to_string(),
            message,
            is_error: true,
            requires_manual_action: false,
            is_complete: true,
            success: false,
            agent_reported: false,
        }
    }

    pub fn idle() -> Self {
        Self::working(stage::IDLE, "")
    }

    pub fn awaiting_ack() -> Self {
        Self::working(
            stage::AWAITING_ACK,
            "Sending your information to the browser extension...",
        )
    }

    pub fn opening_form() -> Self {
        Self::working(stage::OPENING_FORM, "Opening the official form...")
    }

    pub fn filling_form() -> Self {
        Self::working(stage::FILLING_FORM, "Filling in the form...")
    }

    /// The agent refused or failed to store the payload
    pub fn ack_rejected(reason: Option<&str>) -> Self {
        let message = match reason {
            Some(reason) if !reason.trim().is_empty() => {
                format!("The browser extension could not store your information: {}", reason)
            }
            _ => "The browser extension could not store your information.".to_string(),
        };
        Self::failed(stage::ERROR, message)
    }

    /// The form could not be opened after a successful acknowledgement
    pub fn form_open_failed(reason: &str) -> Self {
        Self::failed(stage::ERROR, format!("Could not open the form: {}", reason))
    }

    /// No acknowledgement arrived in time
    pub fn timeout() -> Self {
        Self::failed(
            stage::TIMEOUT,
            "The browser extension did not respond. \
             Make sure it is installed and enabled, then try again."
                .to_string(),
        )
    }

    /// The message channel went away mid-run
    pub fn disconnected() -> Self {
        Self::failed(
            stage::DISCONNECTED,
            "Lost contact with the browser extension.".to_string(),
        )
    }

    /// Status carried by an agent progress message
    pub fn from_progress(progress: &FillingStatus) -> Self {
        Self {
            stage: progress.stage.clone(),
            message: progress.message.clone(),
            is_error: progress.is_complete && !progress.success,
            requires_manual_action: progress.requires_manual_action,
            is_complete: progress.is_complete,
            success: progress.is_complete && progress.success,
            agent_reported: true,
        }
    }

    /// Whether the run has ended successfully
    pub fn succeeded(&self) -> bool {
        self.is_complete && self.success
    }

    /// A fill failure the agent itself reported
    pub fn is_agent_failure(&self) -> bool {
        self.agent_reported && self.is_error
    }
}
