//! Masstransit error types

use thiserror::Error;

/// Errors that can occur while talking to the getStopInfo endpoint
#[derive(Debug, Error)]
pub enum MasstransitError {
    /// Network or I/O failure while sending the request or reading the body
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Server answered with an unexpected HTTP status
    #[error("Wrong status code, got {code}")]
    WrongStatusCode {
        /// Observed HTTP status
        code: u16,
    },

    /// Token refresh succeeded at the HTTP level but handed back no token
    #[error("Empty token from server")]
    EmptyToken,

    /// Body could not be decoded into any recognised shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A timestamp field is present but cannot be parsed
    #[error("Malformed time: {0}")]
    MalformedTime(String),

    /// Error reported by the service itself
    #[error("Application error: code {code} and message: {message}")]
    ApplicationError {
        /// Service error code
        code: i64,
        /// Service error message
        message: String,
    },

    /// Server kept renewing the token until the attempt budget ran out
    #[error("Gave up after {attempts} attempts")]
    RetriesExhausted {
        /// Number of requests issued
        attempts: u8,
    },

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl MasstransitError {
    /// HTTP status carried by this error, if any
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::WrongStatusCode { code } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if repeating the whole call later may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::TransportError(_) | Self::RetriesExhausted { .. } => true,
            Self::WrongStatusCode { code } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for MasstransitError {
    fn from(err: reqwest::Error) -> Self {
        Self::TransportError(err.to_string())
    }
}
