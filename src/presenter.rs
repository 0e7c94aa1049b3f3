//! User-facing projection of an [`AutomationStatus`].
//!
//! Pure: the view is derived from the status alone.

use serde::Serialize;

use crate::bridge::{stage, AutomationStatus};

const MANUAL_HINT: &str =
    "Some fields need your attention. Please complete them yourself in the form window.";
const RETRY_HINT: &str = "You can try submitting again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Idle,
    Working,
    Success,
    Error,
}

/// What the status panel shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub tone: Tone,
    pub headline: String,
    pub detail: String,
    pub show_spinner: bool,
    pub show_retry: bool,
    /// "Please complete this field yourself" affordance
    pub manual_hint: Option<&'static str>,
}

impl StatusView {
    /// Render as plain terminal lines
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.headline.clone()];
        if !self.detail.is_empty() {
            lines.push(self.detail.clone());
        }
        if let Some(hint) = self.manual_hint {
            lines.push(hint.to_string());
        }
        if self.show_retry {
            lines.push(RETRY_HINT.to_string());
        }
        lines
    }
}

pub fn present(status: &AutomationStatus) -> StatusView {
    let tone = if status.is_error {
        Tone::Error
    } else if status.succeeded() {
        Tone::Success
    } else if status.stage == stage::IDLE {
        Tone::Idle
    } else {
        Tone::Working
    };

    let headline = match (tone, status.stage.as_str()) {
        (Tone::Error, stage::TIMEOUT) => "Browser extension not responding",
        (Tone::Error, stage::DISCONNECTED) => "Connection lost",
        (Tone::Error, _) => "Form filling failed",
        (Tone::Success, _) => "Form submitted",
        (Tone::Idle, _) => "Ready to submit",
        (Tone::Working, _) => "Filling your form",
    }
    .to_string();

    StatusView {
        tone,
        headline,
        detail: status.message.clone(),
        show_spinner: tone == Tone::Working,
        show_retry: tone == Tone::Error,
        manual_hint: (status.requires_manual_action || status.is_agent_failure())
            .then_some(MANUAL_HINT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::FillingStatus;

    fn progress(requires_manual_action: bool) -> AutomationStatus {
        AutomationStatus {
            stage: "filling_form".to_string(),
            message: "Section 3".to_string(),
            is_error: false,
            requires_manual_action,
            is_complete: false,
            success: false,
            agent_reported: true,
        }
    }

    #[test]
    fn test_idle() {
        let view = present(&AutomationStatus::idle());
        assert_eq!(view.tone, Tone::Idle);
        assert!(!view.show_spinner);
        assert!(!view.show_retry);
    }

    #[test]
    fn test_working_with_manual_action() {
        let view = present(&progress(true));
        assert_eq!(view.tone, Tone::Working);
        assert!(view.show_spinner);
        assert_eq!(view.manual_hint, Some(MANUAL_HINT));
        assert_eq!(view.detail, "Section 3");
        assert!(present(&progress(false)).manual_hint.is_none());
    }

    #[test]
    fn test_timeout_offers_retry() {
        let view = present(&AutomationStatus::timeout());
        assert_eq!(view.tone, Tone::Error);
        assert_eq!(view.headline, "Browser extension not responding");
        assert!(view.show_retry);
        assert!(view.manual_hint.is_none());
    }

    #[test]
    fn test_agent_failure_surfaces_message() {
        let status = AutomationStatus {
            stage: "filling_form".to_string(),
            message: "X".to_string(),
            is_error: true,
            requires_manual_action: false,
            is_complete: true,
            success: false,
            agent_reported: true,
        };
        let view = present(&status);
        assert_eq!(view.tone, Tone::Error);
        assert_eq!(view.detail, "X");
        assert_eq!(view.manual_hint, Some(MANUAL_HINT));
        let lines = view.lines();
        assert!(lines.contains(&"X".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some(RETRY_HINT));
    }

    #[test]
    fn test_agent_error_stage_gets_manual_hint() {
        let status = AutomationStatus::from_progress(&FillingStatus {
            request_id: None,
            stage: stage::ERROR.to_string(),
            message: "Captcha required".to_string(),
            requires_manual_action: false,
            is_complete: true,
            success: false,
        });
        let view = present(&status);
        assert_eq!(view.tone, Tone::Error);
        assert_eq!(view.manual_hint, Some(MANUAL_HINT));

        // Same stage raised by the bridge itself
        let rejected = present(&AutomationStatus::ack_rejected(None));
        assert!(rejected.manual_hint.is_none());
    }

    #[test]
    fn test_success() {
        let status = AutomationStatus {
            stage: "done".to_string(),
            message: String::new(),
            is_error: false,
            requires_manual_action: false,
            is_complete: true,
            success: true,
            agent_reported: true,
        };
        let view = present(&status);
        assert_eq!(view.tone, Tone::Success);
        assert!(!view.show_spinner && !view.show_retry);
        assert_eq!(view.lines(), vec!["Form submitted".to_string()]);
    }
}
