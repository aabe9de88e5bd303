//! Error types for the platform transport foundation.
//!
//! # Design
//! The status taxonomy is deliberately coarse: every status outside the
//! success set lands in `NonSuccessStatus`, which carries the unconsumed
//! `Response` so the calling service can inspect status, headers and body.
//! Refining "not found" versus "forbidden" is left to the service modules.

use thiserror::Error;

use crate::response::Response;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by `Client::new_request` and `Client::execute`.
#[derive(Debug, Error)]
pub enum Error {
    /// The base store URL is absent or could not be parsed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A request option rejected the request; it was never sent.
    #[error("request option failed: {0}")]
    Option(#[from] OptionError),

    /// Connection, DNS, TLS or timeout failure. No response is available.
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A response arrived with a status outside the success set.
    #[error("non-success HTTP status {}", .0.status())]
    NonSuccessStatus(Box<Response>),

    /// The response body could not be decoded into the destination.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// A resource handed to a service module lacks a required field.
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// The response body could not be copied into a raw sink.
    #[error("failed to copy response body: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The response attached to a `NonSuccessStatus` error.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::NonSuccessStatus(response) => Some(response),
            _ => None,
        }
    }

    /// Take ownership of the attached response, e.g. to read its body.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Error::NonSuccessStatus(response) => Some(*response),
            _ => None,
        }
    }

    /// HTTP status of the attached response, if any.
    pub fn status(&self) -> Option<u16> {
        self.response().map(Response::status)
    }
}

/// Failure reported by a request option.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct OptionError {
    message: String,
}

impl OptionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
