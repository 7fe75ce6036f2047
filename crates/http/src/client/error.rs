//! Client error types

use crate::types::ErrorResponse;
use std::collections::HashMap;
use thiserror::Error;

const UNAUTHORIZED_MESSAGE: &str = "Unauthorized - please log in again";
const NETWORK_MESSAGE: &str = "Network error - please check your connection";
const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";

/// Field name to validation message
pub type ErrorDetails = HashMap<String, String>;

/// Client error types
///
/// Every failure is classified once, at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// 401, or the credentials could not be refreshed
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    NotFound { message: String },

    /// 422, or 400 carrying field-level details
    #[error("{message}")]
    Validation {
        status: u16,
        message: String,
        details: ErrorDetails,
    },

    /// The request was aborted by the client-side deadline
    #[error("Request timeout - please try again")]
    Timeout,

    /// The request never reached the server
    #[error("{message}")]
    Network { message: String },

    /// 5xx
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Any other non-2xx status
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        details: Option<ErrorDetails>,
    },

    /// Unclassified failure, such as an undecodable response body
    #[error("{message}")]
    Unexpected { message: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Classify a non-2xx response from its status and raw body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
        let (message, details) = match parsed {
            Some(ErrorResponse { error, details }) if !error.is_empty() => (error, details),
            Some(ErrorResponse { details, .. }) => (fallback_message(status), details),
            None => (fallback_message(status), None),
        };

        match status {
            401 => Self::Unauthorized { message },
            403 => Self::Forbidden { message },
            404 => Self::NotFound { message },
            422 => Self::Validation {
                status,
                message,
                details: details.unwrap_or_default(),
            },
            400 if details.as_ref().is_some_and(|d| !d.is_empty()) => Self::Validation {
                status,
                message,
                details: details.unwrap_or_default(),
            },
            500..=599 => Self::Server { status, message },
            _ => Self::Http {
                status,
                message,
                details,
            },
        }
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized {
            message: UNAUTHORIZED_MESSAGE.to_string(),
        }
    }

    pub fn network() -> Self {
        Self::Network {
            message: NETWORK_MESSAGE.to_string(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// HTTP-like status of the failure: 408 for timeouts, 0 for network
    /// failures, 500 for anything unclassified.
    pub const fn status(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Validation { status, .. }
            | Self::Server { status, .. }
            | Self::Http { status, .. } => *status,
            Self::Timeout => 408,
            Self::Network { .. } => 0,
            Self::Unexpected { .. } | Self::Configuration(_) => 500,
        }
    }

    /// Field-level details sent by the server, if any.
    pub const fn details(&self) -> Option<&ErrorDetails> {
        match self {
            Self::Validation { details, .. } => Some(details),
            Self::Http { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Timeouts and network failures; the server never answered.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network { .. })
    }

    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

fn fallback_message(status: u16) -> String {
    format!("Request failed with status {status}")
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }

        #[cfg(not(target_arch = "wasm32"))]
        if err.is_connect() {
            return Self::network();
        }

        if err.is_request() {
            Self::network()
        } else if err.is_decode() || err.is_body() {
            Self::unexpected(format!("{UNEXPECTED_MESSAGE}: {err}"))
        } else {
            Self::unexpected(UNEXPECTED_MESSAGE)
        }
    }
}

impl From<pos_core::rt::Elapsed> for ClientError {
    fn from(_: pos_core::rt::Elapsed) -> Self {
        Self::Timeout
    }
}
