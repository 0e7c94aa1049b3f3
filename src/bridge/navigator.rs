//! Where the bridge sends the user: the third-party form and the
//! waiting screen.

use std::sync::Mutex;

use tokio::time::Instant;
use tracing::{info, warn};

use super::error::NavigationError;

const CASE_ID_PLACEHOLDER: &str = "{case_id}";

pub trait Navigator: Send + Sync {
    /// Open the third-party form in the user's browser
    fn open_form(&self, url: &str) -> Result<(), NavigationError>;

    /// Move to the "waiting for external decision" screen
    fn show_awaiting_decision(&self, case_id: Option<&str>);
}

/// Expand the waiting-screen route template.
///
/// Without a case id the `{case_id}` path segment is dropped.
pub fn waiting_route(template: &str, case_id: Option<&str>) -> String {
    match case_id {
        Some(id) => template.replace(CASE_ID_PLACEHOLDER, id),
        None => template
            .replace(&format!("/{}", CASE_ID_PLACEHOLDER), "")
            .replace(CASE_ID_PLACEHOLDER, ""),
    }
}

/// Opens the form with the platform's URL handler and logs the waiting route
pub struct SystemNavigator {
    open_browser: bool,
    waiting_route: String,
    last_route: Mutex<Option<String>>,
}

impl SystemNavigator {
    pub fn new(open_browser: bool, waiting_route: impl Into<String>) -> Self {
        Self {
            open_browser,
            waiting_route: waiting_route.into(),
            last_route: Mutex::new(None),
        }
    }

    /// The waiting route most recently shown, if any
    pub fn last_route(&self) -> Option<String> {
        self.last_route.lock().ok().and_then(|route| route.clone())
    }
}

impl Navigator for SystemNavigator {
    fn open_form(&self, url: &str) -> Result<(), NavigationError> {
        if url.trim().is_empty() {
            return Err(NavigationError::MissingUrl);
        }
        if !self.open_browser {
            info!(url, "Browser launch disabled; open the form manually");
            return Ok(());
        }

        info!("Opening browser: {}", url);

        #[cfg(target_os = "macos")]
        {
            std::process::Command::new("open").arg(url).spawn()?;
        }

        #[cfg(target_os = "linux")]
        {
            std::process::Command::new("xdg-open").arg(url).spawn()?;
        }

        #[cfg(target_os = "windows")]
        {
            std::process::Command::new("cmd")
                .args(["/C", "start", url])
                .spawn()?;
        }

        Ok(())
    }

    fn show_awaiting_decision(&self, case_id: Option<&str>) {
        let route = waiting_route(&self.waiting_route, case_id);
        info!(route = %route, "Navigating to the awaiting-decision screen");
        match self.last_route.lock() {
            Ok(mut last) => *last = Some(route),
            Err(_) => warn!("Navigator state lock poisoned"),
        }
    }
}

/// A navigation performed through a [`RecordingNavigator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    OpenedForm(String),
    AwaitingDecision(Option<String>),
}

/// Navigator that records what it was asked to do, with timestamps from the
/// tokio clock so paused-time tests can check delays.
#[derive(Default)]
pub struct RecordingNavigator {
    events: Mutex<Vec<(Instant, NavigationEvent)>>,
    fail_open: bool,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A navigator whose `open_form` always fails
    pub fn failing_open() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_open: true,
        }
    }

    pub fn events(&self) -> Vec<NavigationEvent> {
        self.timed_events().into_iter().map(|(_, e)| e).collect()
    }

    pub fn timed_events(&self) -> Vec<(Instant, NavigationEvent)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of waiting-screen navigations
    pub fn awaiting_decision_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, NavigationEvent::AwaitingDecision(_)))
            .count()
    }

    fn record(&self, event: NavigationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((Instant::now(), event));
        }
    }
}

impl Navigator for RecordingNavigator {
    fn open_form(&self, url: &str) -> Result<(), NavigationError> {
        if self.fail_open {
            return Err(NavigationError::Launch(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no browser available",
            )));
        }
        self.record(NavigationEvent::OpenedForm(url.to_string()));
        Ok(())
    }

    fn show_awaiting_decision(&self, case_id: Option<&str>) {
        self.record(NavigationEvent::AwaitingDecision(case_id.map(str::to_string)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiting_route_with_case() {
        assert_eq!(
            waiting_route("/cases/{case_id}/awaiting-decision", Some("c-7")),
            "/cases/c-7/awaiting-decision"
        );
    }

    #[test]
    fn test_waiting_route_without_case() {
        assert_eq!(
            waiting_route("/cases/{case_id}/awaiting-decision", None),
            "/cases/awaiting-decision"
        );
        assert_eq!(waiting_route("/waiting", None), "/waiting");
    }

    #[test]
    fn test_system_navigator_requires_url() {
        let navigator = SystemNavigator::new(false, "/waiting");
        assert!(matches!(
            navigator.open_form("  "),
            Err(NavigationError::MissingUrl)
        ));
        assert!(navigator.open_form("https://forms.example.gov/claim").is_ok());
    }

    #[test]
    fn test_system_navigator_remembers_route() {
        let navigator = SystemNavigator::new(false, "/cases/{case_id}/awaiting-decision");
        assert_eq!(navigator.last_route(), None);
        navigator.show_awaiting_decision(Some("c-1"));
        assert_eq!(
            navigator.last_route().as_deref(),
            Some("/cases/c-1/awaiting-decision")
        );
    }

    #[tokio::test]
    async fn test_recording_navigator() {
        let navigator = RecordingNavigator::new();
        navigator.open_form("https://x").unwrap();
        navigator.show_awaiting_decision(None);
        assert_eq!(
            navigator.events(),
            vec![
                NavigationEvent::OpenedForm("https://x".to_string()),
                NavigationEvent::AwaitingDecision(None),
            ]
        );
        assert_eq!(navigator.awaiting_decision_count(), 1);

        let failing = RecordingNavigator::failing_open();
        assert!(failing.open_form("https://x").is_err());
        assert!(failing.events().is_empty());
    }
}
