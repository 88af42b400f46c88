//! Error types for the request dispatcher.
//!
//! # Design
//! Callers see a single failure kind, `RequestError::RequestFailed`. It wraps
//! whatever sank the last attempt (`AttemptError`) and appends the method,
//! URL and serialized call options so a log line alone is enough to replay
//! the request. Status codes are carried for debugging only; the dispatcher
//! never branches on them.

use thiserror::Error;

use crate::http::HttpMethod;

/// A failure reported by a `Transport`: the exchange itself did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response transform rejected a 2xx response.
    #[error("response transform failed: {0}")]
    Transform(String),
}

/// Errors surfaced by `Requester` calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("{cause}\nmethod: {method}\nurl: {url}\nopts: {options}")]
    RequestFailed {
        method: HttpMethod,
        url: String,
        /// The merged call options, serialized as JSON.
        options: String,
        #[source]
        cause: AttemptError,
    },
}

impl RequestError {
    pub fn method(&self) -> HttpMethod {
        match self {
            RequestError::RequestFailed { method, .. } => *method,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            RequestError::RequestFailed { url, .. } => url,
        }
    }

    pub fn cause(&self) -> &AttemptError {
        match self {
            RequestError::RequestFailed { cause, .. } => cause,
        }
    }
}

/// Invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: baseUrl")]
    MissingBaseUrl,

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
