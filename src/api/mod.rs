//! Backend client for the intake REST service.
//!
//! This module provides:
//! - The `IntakeBackend` trait the orchestration core calls through
//! - An HTTP implementation, an offline stand-in and a scriptable mock
//! - Error classification for backend failures

pub mod backend;
pub mod error;
pub mod mock;

pub use backend::{
    from_config, CaseRecord, HttpBackend, IntakeBackend, OfflineBackend, SavedProgress,
};
pub use error::ApiError;
pub use mock::MockBackend;
