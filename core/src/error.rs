//! Error types for the InoCore client.
//!
//! # Design
//! Every failure a caller can act on lands in one of three variants:
//! a malformed URL, rejected credentials, or anything else that went wrong
//! after the request left the process. `Serialization` is the exception: a
//! request body that cannot be turned into JSON is a bug in the caller, so the
//! `serde_json` error is passed through untouched.

use thiserror::Error;

/// Errors returned by `ApiClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The base URL or the composed endpoint URL is not a valid absolute URL.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The server rejected the credentials (401) or denied access (403).
    #[error("authorization failed with HTTP {status}{}", detail(.message))]
    Authorization { status: u16, message: Option<String> },

    /// Non-2xx status, undecodable body, or a transport failure.
    #[error("invalid response from {url}{}{}", status_line(.status, .reason), detail(.message))]
    InvalidResponse {
        url: String,
        status: Option<u16>,
        reason: Option<String>,
        message: Option<String>,
    },

    /// The request body could not be serialized to JSON.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status code carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authorization { status, .. } => Some(*status),
            ApiError::InvalidResponse { status, .. } => *status,
            ApiError::InvalidUrl { .. } | ApiError::Serialization(_) => None,
        }
    }

    /// Server-supplied or transport-supplied diagnostic message.
    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::Authorization { message, .. } | ApiError::InvalidResponse { message, .. } => {
                message.as_deref()
            }
            ApiError::InvalidUrl { .. } | ApiError::Serialization(_) => None,
        }
    }

    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(url: &str, message: impl Into<String>) -> Self {
        ApiError::InvalidResponse {
            url: url.to_string(),
            status: None,
            reason: None,
            message: Some(message.into()),
        }
    }
}

fn status_line(status: &Option<u16>, reason: &Option<String>) -> String {
    match (status, reason) {
        (Some(status), Some(reason)) => format!(": HTTP {status} {reason}"),
        (Some(status), None) => format!(": HTTP {status}"),
        (None, _) => String::new(),
    }
}

fn detail(message: &Option<String>) -> String {
    message.as_ref().map(|m| format!(" ({m})")).unwrap_or_default()
}
