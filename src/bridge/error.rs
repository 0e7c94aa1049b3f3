//! Bridge error types

use thiserror::Error;

/// Errors from a message transport
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("message channel is closed")]
    Closed,

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write message: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors opening the third-party form
#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("no form URL configured")]
    MissingUrl,

    #[error("failed to launch browser: {0}")]
    Launch(#[from] std::io::Error),
}

/// Errors starting or awaiting an automation run
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("form data must be a JSON object")]
    InvalidPayload,

    #[error("failed to send payload: {0}")]
    Channel(#[from] ChannelError),

    #[error("automation run was detached before it finished")]
    Detached,

    #[error("automation run task failed: {0}")]
    Task(String),
}
