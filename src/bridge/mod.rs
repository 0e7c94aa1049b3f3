//! Automation bridge: hands intake data to the browser-extension agent
//! that fills the official form, and tracks its progress.

pub mod channel;
pub mod error;
pub mod handshake;
pub mod messages;
pub mod navigator;
pub mod request;
pub mod run;
pub mod status;

pub use channel::{BroadcastChannel, LineChannel, MessageChannel};
pub use error::{BridgeError, ChannelError, NavigationError};
pub use handshake::{Directive, Handshake, Phase, RunOutcome};
pub use messages::{BridgeMessage, FillingStatus, PayloadStored, StorePayload};
pub use navigator::{
    waiting_route, NavigationEvent, Navigator, RecordingNavigator, SystemNavigator,
};
pub use request::AutomationRequest;
pub use run::{AutomationBridge, BridgeRun, BridgeSettings};
pub use status::{stage, AutomationStatus};
