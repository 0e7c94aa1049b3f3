//! Drives one automation run: posts the payload, listens on the channel,
//! enforces the ack timeout and performs the final navigation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::channel::MessageChannel;
use super::error::BridgeError;
use super::handshake::{Directive, Handshake, Phase, RunOutcome};
use super::messages::{BridgeMessage, StorePayload};
use super::navigator::Navigator;
use super::request::AutomationRequest;
use super::status::AutomationStatus;
use crate::config::BridgeConfig;

/// Timing and target for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub ack_timeout: Duration,
    pub redirect_delay: Duration,
    pub form_url: String,
}

impl From<&BridgeConfig> for BridgeSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            ack_timeout: config.ack_timeout(),
            redirect_delay: config.redirect_delay(),
            form_url: config.form_url.clone(),
        }
    }
}

/// Hands form data to the automation agent and tracks the result
pub struct AutomationBridge {
    channel: Arc<dyn MessageChannel>,
    navigator: Arc<dyn Navigator>,
    settings: BridgeSettings,
}

impl AutomationBridge {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        navigator: Arc<dyn Navigator>,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            channel,
            navigator,
            settings,
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Post the payload and start listening for the agent.
    ///
    /// Must be called from within a tokio runtime. Each call is an
    /// independent run with its own listener and timer.
    #[instrument(skip_all, fields(case_id = ?request.case_id()))]
    pub fn submit(&self, request: AutomationRequest) -> Result<BridgeRun, BridgeError> {
        let request_id = Uuid::new_v4().to_string();
        let mut handshake = Handshake::new(&request_id, request.case_id().map(str::to_string));

        // Subscribe before posting so an instant ack is not missed
        let listener = self.channel.subscribe();
        let frame = BridgeMessage::StorePayload(StorePayload {
            request_id: Some(request_id.clone()),
            payload: request.to_payload(),
        })
        .to_frame()
        .map_err(|e| BridgeError::Channel(e.into()))?;
        self.channel.post(frame)?;

        let ack_deadline = Instant::now() + self.settings.ack_timeout;
        handshake.start();
        info!(request_id = %request_id, "Payload sent, awaiting acknowledgement");

        let (status_tx, status_rx) = watch::channel(handshake.status().clone());
        let driver = RunDriver {
            handshake,
            status_tx,
            navigator: self.navigator.clone(),
            settings: self.settings.clone(),
        };
        let task = tokio::spawn(driver.run(listener, ack_deadline));

        Ok(BridgeRun {
            request_id,
            status: status_rx,
            task: Some(task),
        })
    }
}

/// Handle to an in-flight run.
///
/// Dropping the handle cancels the run: its listener and timer are
/// released and no navigation happens afterwards.
pub struct BridgeRun {
    request_id: String,
    status: watch::Receiver<AutomationStatus>,
    task: Option<JoinHandle<RunOutcome>>,
}

impl BridgeRun {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Subscribe to status changes
    pub fn status(&self) -> watch::Receiver<AutomationStatus> {
        self.status.clone()
    }

    pub fn current_status(&self) -> AutomationStatus {
        self.status.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the run to end, including any final navigation.
    ///
    /// Dropping the returned future before it resolves cancels the run,
    /// the same as dropping the handle.
    pub async fn wait(mut self) -> Result<RunOutcome, BridgeError> {
        let task = self.task.as_mut().ok_or(BridgeError::Detached)?;
        let joined = task.await;
        // Finished; nothing left for Drop to abort
        self.task = None;
        joined.map_err(|e| {
            if e.is_cancelled() {
                BridgeError::Detached
            } else {
                BridgeError::Task(e.to_string())
            }
        })
    }
}

impl Drop for BridgeRun {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                debug!(request_id = %self.request_id, "Cancelling automation run");
            }
            task.abort();
        }
    }
}

struct RunDriver {
    handshake: Handshake,
    status_tx: watch::Sender<AutomationStatus>,
    navigator: Arc<dyn Navigator>,
    settings: BridgeSettings,
}

impl RunDriver {
    async fn run(
        mut self,
        mut listener: broadcast::Receiver<Value>,
        ack_deadline: Instant,
    ) -> RunOutcome {
        let ack_timer = tokio::time::sleep_until(ack_deadline);
        tokio::pin!(ack_timer);

        let outcome = loop {
            let awaiting_ack = self.handshake.phase() == Phase::AwaitingAck;
            let directive = tokio::select! {
                frame = listener.recv() => match frame {
                    Ok(frame) => self.handshake.on_frame(&frame),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Bridge listener lagged, messages dropped");
                        Directive::Ignore
                    }
                    Err(RecvError::Closed) => self.handshake.on_disconnect(),
                },
                () = &mut ack_timer, if awaiting_ack => self.handshake.on_ack_timeout(),
            };
            if let Some(outcome) = self.apply(directive) {
                break outcome;
            }
        };
        // Nothing after the first terminal event reaches this run
        drop(listener);

        match &outcome {
            RunOutcome::Succeeded { case_id } => {
                info!(case_id = ?case_id, "Form filled, showing the waiting screen shortly");
                tokio::time::sleep(self.settings.redirect_delay).await;
                self.navigator.show_awaiting_decision(case_id.as_deref());
            }
            RunOutcome::Failed { stage, message } => {
                warn!(stage = %stage, message = %message, "Automation run failed");
            }
            RunOutcome::TimedOut => {
                warn!(
                    timeout = ?self.settings.ack_timeout,
                    "No acknowledgement from the automation agent"
                );
            }
        }
        outcome
    }

    fn apply(&mut self, mut directive: Directive) -> Option<RunOutcome> {
        loop {
            match directive {
                Directive::Ignore => return None,
                Directive::Publish => {
                    self.publish();
                    return None;
                }
                Directive::OpenForm => {
                    self.publish();
                    directive = match self.navigator.open_form(&self.settings.form_url) {
                        Ok(()) => self.handshake.form_opened(),
                        Err(e) => self.handshake.form_open_failed(&e.to_string()),
                    };
                }
                Directive::Finish(outcome) => {
                    self.publish();
                    return Some(outcome);
                }
            }
        }
    }

    fn publish(&self) {
        let status = self.handshake.status().clone();
        debug!(stage = %status.stage, "Automation status changed");
        self.status_tx.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channel::BroadcastChannel;
    use crate::bridge::navigator::{NavigationEvent, RecordingNavigator};
    use crate::bridge::status::stage;
    use serde_json::json;

    fn settings() -> BridgeSettings {
        BridgeSettings {
            ack_timeout: Duration::from_secs(10),
            redirect_delay: Duration::from_secs(2),
            form_url: "https://forms.example.gov/claim".to_string(),
        }
    }

    fn bridge(
        channel: &Arc<BroadcastChannel>,
        navigator: &Arc<RecordingNavigator>,
    ) -> AutomationBridge {
        AutomationBridge::new(channel.clone(), navigator.clone(), settings())
    }

    #[test]
    fn test_settings_from_config() {
        let config = BridgeConfig::default();
        let settings = BridgeSettings::from(&config);
        assert_eq!(settings.ack_timeout, Duration::from_secs(10));
        assert_eq!(settings.redirect_delay, Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_posts_payload_and_awaits_ack() {
        let channel = Arc::new(BroadcastChannel::new());
        let navigator = Arc::new(RecordingNavigator::new());
        let mut agent = channel.subscribe();

        let request = AutomationRequest::new(json!({"claimant": "Ada"}))
            .unwrap()
            .with_case_id(Some("c-1".to_string()));
        let run = bridge(&channel, &navigator).submit(request).unwrap();

        let frame = agent.recv().await.unwrap();
        assert_eq!(frame["type"], "STORE_PAYLOAD");
        assert_eq!(frame["requestId"], run.request_id());
        assert_eq!(frame["payload"]["case_id"], "c-1");
        assert_eq!(run.current_status().stage, stage::AWAITING_ACK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_ack() {
        let channel = Arc::new(BroadcastChannel::new());
        let navigator = Arc::new(RecordingNavigator::new());
        let run = bridge(&channel, &navigator)
            .submit(AutomationRequest::new(json!({})).unwrap())
            .unwrap();
        let status = run.status();

        assert_eq!(run.wait().await.unwrap(), RunOutcome::TimedOut);
        assert_eq!(status.borrow().stage, stage::TIMEOUT);
        assert!(navigator.events().is_empty());
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_ends_run() {
        let channel = Arc::new(BroadcastChannel::new());
        let navigator = Arc::new(RecordingNavigator::failing_open());
        let run = AutomationBridge::new(channel.clone(), navigator.clone(), settings())
            .submit(AutomationRequest::new(json!({})).unwrap())
            .unwrap();

        channel
            .post(json!({"type": "PAYLOAD_STORED", "success": true}))
            .unwrap();
        let outcome = run.wait().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Failed { ref stage, .. } if stage == "error"));
        assert_eq!(navigator.awaiting_decision_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_disconnects() {
        let channel = Arc::new(BroadcastChannel::new());
        let navigator = Arc::new(RecordingNavigator::new());
        let run = bridge(&channel, &navigator)
            .submit(AutomationRequest::new(json!({})).unwrap())
            .unwrap();
        channel.close();

        let outcome = run.wait().await.unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::Failed { stage: ref s, .. } if s == stage::DISCONNECTED
        ));
    }

    #[tokio::test]
    async fn test_submit_on_closed_channel_fails() {
        let channel = Arc::new(BroadcastChannel::new());
        channel.close();
        let navigator = Arc::new(RecordingNavigator::new());
        let result =
            bridge(&channel, &navigator).submit(AutomationRequest::new(json!({})).unwrap());
        assert!(matches!(result, Err(BridgeError::Channel(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_opens_form_then_waiting_screen() {
        let channel = Arc::new(BroadcastChannel::new());
        let navigator = Arc::new(RecordingNavigator::new());
        let run = bridge(&channel, &navigator)
            .submit(
                AutomationRequest::new(json!({}))
                    .unwrap()
                    .with_case_id(Some("c-9".to_string())),
            )
            .unwrap();

        channel
            .post(json!({"type": "PAYLOAD_STORED", "success": true}))
            .unwrap();
        channel
            .post(json!({
                "type": "FILLING_STATUS",
                "stage": "done",
                "isComplete": true,
                "success": true
            }))
            .unwrap();

        assert_eq!(
            run.wait().await.unwrap(),
            RunOutcome::Succeeded {
                case_id: Some("c-9".to_string())
            }
        );
        assert_eq!(
            navigator.events(),
            vec![
                NavigationEvent::OpenedForm("https://forms.example.gov/claim".to_string()),
                NavigationEvent::AwaitingDecision(Some("c-9".to_string())),
            ]
        );
    }
}
