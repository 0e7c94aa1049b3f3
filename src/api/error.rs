//! Backend error types

use std::fmt;

/// Errors that can occur when calling the intake backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401 Unauthorized - token invalid or expired
    Unauthorized { endpoint: String },
    /// 403 Forbidden - token lacks access to the resource
    Forbidden { endpoint: String },
    /// 404 Not Found
    NotFound { endpoint: String },
    /// Network or timeout error
    NetworkError { endpoint: String, message: String },
    /// Other HTTP errors
    HttpError {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// Response body did not match the expected shape
    DecodeError { endpoint: String, message: String },
    /// No backend base URL configured
    NotConfigured,
}

impl ApiError {
    /// Check if this is an authentication error (401 or 403)
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. }
        )
    }

    /// Check if the request never produced an HTTP response
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkError { .. } | ApiError::NotConfigured
        )
    }

    /// Endpoint the failing request targeted, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { endpoint }
            | ApiError::Forbidden { endpoint }
            | ApiError::NotFound { endpoint }
            | ApiError::NetworkError { endpoint, .. }
            | ApiError::HttpError { endpoint, .. }
            | ApiError::DecodeError { endpoint, .. } => Some(endpoint),
            ApiError::NotConfigured => None,
        }
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(endpoint: impl Into<String>, status: u16, body: String) -> Self {
        let endpoint = endpoint.into();
        match status {
            401 => ApiError::Unauthorized { endpoint },
            403 => ApiError::Forbidden { endpoint },
            404 => ApiError::NotFound { endpoint },
            _ => ApiError::HttpError {
                endpoint,
                status,
                message: body,
            },
        }
    }

    /// Create a network error
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::NetworkError {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::DecodeError {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized { endpoint } => {
                write!(f, "{}: Unauthorized (401) - sign in again", endpoint)
            }
            ApiError::Forbidden { endpoint } => {
                write!(f, "{}: Forbidden (403) - insufficient permissions", endpoint)
            }
            ApiError::NotFound { endpoint } => write!(f, "{}: Not found (404)", endpoint),
            ApiError::NetworkError { endpoint, message } => {
                write!(f, "{}: Network error - {}", endpoint, message)
            }
            ApiError::HttpError {
                endpoint,
                status,
                message,
            } => {
                write!(f, "{}: HTTP {} - {}", endpoint, status, message)
            }
            ApiError::DecodeError { endpoint, message } => {
                write!(f, "{}: Unexpected response - {}", endpoint, message)
            }
            ApiError::NotConfigured => write!(f, "backend: Not configured (no base URL)"),
        }
    }
}

impl std::error::Error for ApiError {}
