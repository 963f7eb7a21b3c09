//! Error types for the webservice client.
//!
//! # Design
//! Every failed call ends in exactly one `ApiError`; nothing is retried or
//! recovered locally. Transport failures keep their original source error
//! so callers can inspect it, and `Http` errors display only the message the
//! server produced.

use std::error::Error as StdError;

use thiserror::Error;

/// Errors returned by `RestClient`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A caller-supplied argument was rejected before any I/O took place.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request never produced a complete response (DNS, refused
    /// connection, reset, TLS, timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a status of 400 or above.
    ///
    /// `message` is the response body, or `"<status> - <status text>"` when
    /// the body was empty.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The response body was not valid JSON, or did not match the requested
    /// type.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status code for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Transport(err) if err.is_timeout())
    }
}

/// A failure reported by a `Transport`, surfaced unchanged.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct TransportError {
    source: Box<dyn StdError + Send + Sync + 'static>,
    timeout: bool,
}

impl TransportError {
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            source: source.into(),
            timeout: false,
        }
    }

    pub fn timeout<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            source: source.into(),
            timeout: true,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.timeout
    }

    /// The underlying transport error.
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.source
    }
}
