//! The request/ack/progress handshake as a pure state machine.
//!
//! The machine never touches a clock or a channel. The driver in
//! [`super::run`] feeds it frames and timer expiry and carries out the
//! [`Directive`] it returns.

use tracing::debug;

use super::messages::{BridgeMessage, FillingStatus, PayloadStored};
use super::status::AutomationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingAck,
    OpeningForm,
    FillingForm,
    Finished,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The agent reported a successful fill
    Succeeded { case_id: Option<String> },
    /// The agent, the browser or the channel reported a failure
    Failed { stage: String, message: String },
    /// No acknowledgement arrived in time
    TimedOut,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }
}

/// What the driver should do after an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Nothing changed
    Ignore,
    /// The status changed; publish it
    Publish,
    /// Publish the status, then open the form and report back
    OpenForm,
    /// Publish the terminal status and stop listening
    Finish(RunOutcome),
}

pub struct Handshake {
    request_id: String,
    case_id: Option<String>,
    phase: Phase,
    status: AutomationStatus,
}

impl Handshake {
    pub fn new(request_id: impl Into<String>, case_id: Option<String>) -> Self {
        Self {
            request_id: request_id.into(),
            case_id,
            phase: Phase::Idle,
            status: AutomationStatus::idle(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &AutomationStatus {
        &self.status
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The payload has been posted
    pub fn start(&mut self) -> Directive {
        if self.phase != Phase::Idle {
            return Directive::Ignore;
        }
        self.phase = Phase::AwaitingAck;
        self.status = AutomationStatus::awaiting_ack();
        Directive::Publish
    }

    /// Feed a raw frame from the channel
    pub fn on_frame(&mut self, frame: &serde_json::Value) -> Directive {
        match BridgeMessage::from_frame(frame) {
            Some(message) => self.on_message(message),
            None => Directive::Ignore,
        }
    }

    pub fn on_message(&mut self, message: BridgeMessage) -> Directive {
        if self.phase == Phase::Finished {
            return Directive::Ignore;
        }
        if !self.correlates(&message) {
            debug!(
                kind = message.kind(),
                request_id = ?message.request_id(),
                "Ignoring message for another request"
            );
            return Directive::Ignore;
        }
        match message {
            // Our own broadcast coming back around
            BridgeMessage::StorePayload(_) => Directive::Ignore,
            BridgeMessage::PayloadStored(ack) => self.on_ack(&ack),
            BridgeMessage::FillingStatus(progress) => self.on_progress(&progress),
        }
    }

    /// Agents that predate correlation ids send none; accept those
    fn correlates(&self, message: &BridgeMessage) -> bool {
        message
            .request_id()
            .map_or(true, |id| id == self.request_id)
    }

    fn on_ack(&mut self, ack: &PayloadStored) -> Directive {
        if self.phase != Phase::AwaitingAck {
            return Directive::Ignore;
        }
        if ack.success {
            self.phase = Phase::OpeningForm;
            self.status = AutomationStatus::opening_form();
            Directive::OpenForm
        } else {
            self.finish(AutomationStatus::ack_rejected(ack.error.as_deref()))
        }
    }

    fn on_progress(&mut self, progress: &FillingStatus) -> Directive {
        if !matches!(self.phase, Phase::OpeningForm | Phase::FillingForm) {
            return Directive::Ignore;
        }
        let status = AutomationStatus::from_progress(progress);
        if status.is_complete {
            self.finish(status)
        } else {
            self.phase = Phase::FillingForm;
            self.status = status;
            Directive::Publish
        }
    }

    /// The form was opened after a successful ack
    pub fn form_opened(&mut self) -> Directive {
        if self.phase != Phase::OpeningForm {
            return Directive::Ignore;
        }
        self.phase = Phase::FillingForm;
        self.status = AutomationStatus::filling_form();
        Directive::Publish
    }

    pub fn form_open_failed(&mut self, reason: &str) -> Directive {
        if self.phase != Phase::OpeningForm {
            return Directive::Ignore;
        }
        self.finish(AutomationStatus::form_open_failed(reason))
    }

    /// The ack timer expired; only meaningful while still waiting
    pub fn on_ack_timeout(&mut self) -> Directive {
        if self.phase != Phase::AwaitingAck {
            return Directive::Ignore;
        }
        self.finish(AutomationStatus::timeout())
    }

    /// The channel closed under us
    pub fn on_disconnect(&mut self) -> Directive {
        if matches!(self.phase, Phase::Idle | Phase::Finished) {
            return Directive::Ignore;
        }
        self.finish(AutomationStatus::disconnected())
    }

    fn finish(&mut self, status: AutomationStatus) -> Directive {
        let outcome = if status.succeeded() {
            RunOutcome::Succeeded {
                case_id: self.case_id.clone(),
            }
        } else if status.stage == super::status::stage::TIMEOUT {
            RunOutcome::TimedOut
        } else {
            RunOutcome::Failed {
                stage: status.stage.clone(),
                message: status.message.clone(),
            }
        };
        self.phase = Phase::Finished;
        self.status = status;
        Directive::Finish(outcome)
    }
}
