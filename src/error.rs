//! Error types for inbox-dl
//!
//! This module provides the error handling for the library, including:
//! - Domain-specific error variants (mailbox, rendering, transfer, configuration)
//! - A coarse [`ErrorCategory`] used for structured log fields
//! - Context information (configuration key, selector, timeout)
//!
//! Every variant except [`Error::Config`] is recoverable: the poll loop logs it
//! and moves on to the next message or the next cycle.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for inbox-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for inbox-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The environment variable or setting that caused the error (e.g., "IMAP_PORT")
        key: Option<String>,
    },

    /// Mailbox unreachable, TLS handshake failed, or login rejected
    #[error("mailbox connection error: {0}")]
    Connection(String),

    /// IMAP command failed after a session was established
    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    /// A fetched message could not be parsed as MIME
    #[error("message parse error: {0}")]
    MessageParse(String),

    /// Browser automation failed (WebDriver transport or protocol error)
    #[error("render error: {0}")]
    Render(String),

    /// No clickable element appeared within the wait bound
    #[error("timed out after {timeout:?} waiting for clickable element matching {selector:?}")]
    RenderTimeout {
        /// The locator value that was waited on
        selector: String,
        /// How long the wait lasted
        timeout: Duration,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of failures, used as a structured log field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Mailbox unreachable or authentication failure
    ConnectionError,
    /// Missing or malformed input (href, MIME structure)
    ParseAnomaly,
    /// No clickable download element within the wait bound
    RenderTimeout,
    /// Fetched body was not the expected archive type
    ContentTypeMismatch,
    /// Non-200 status, network failure, or local write failure
    TransferError,
    /// Invalid startup configuration
    Configuration,
    /// Anything else
    Internal,
}

impl ErrorCategory {
    /// Stable snake_case name for log output
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ConnectionError => "connection_error",
            ErrorCategory::ParseAnomaly => "parse_anomaly",
            ErrorCategory::RenderTimeout => "render_timeout",
            ErrorCategory::ContentTypeMismatch => "content_type_mismatch",
            ErrorCategory::TransferError => "transfer_error",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Classify this error for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config { .. } => ErrorCategory::Configuration,
            Error::Connection(_) | Error::Protocol(_) => ErrorCategory::ConnectionError,
            Error::MessageParse(_) => ErrorCategory::ParseAnomaly,
            Error::RenderTimeout { .. } => ErrorCategory::RenderTimeout,
            Error::Io(_) | Error::Network(_) => ErrorCategory::TransferError,
            Error::Render(_) | Error::Serialization(_) | Error::Other(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Whether this error should end the current poll cycle early.
    ///
    /// Connection-level failures leave no usable session, so the cycle stops
    /// and the next one reconnects from scratch.
    pub fn ends_cycle(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Protocol(_))
    }
}

impl From<async_imap::error::Error> for Error {
    fn from(e: async_imap::error::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

impl From<mailparse::MailParseError> for Error {
    fn from(e: mailparse::MailParseError) -> Self {
        Error::MessageParse(e.to_string())
    }
}
