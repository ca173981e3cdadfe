// src/error.rs

//! Unified error handling for the forwarder.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for forwarder operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Origin unreachable, bad status, or unparseable document
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// A single entry could not be turned into an item
    #[error("Extraction error for {context}: {message}")]
    Extraction { context: String, message: String },

    /// Destination asked us to slow down
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Transient delivery failures exhausted the retry budget
    #[error("Delivery failed after {attempts} attempt(s): {message}")]
    DeliveryExhausted { attempts: u32, message: String },

    /// Destination refused the message; retrying will not help
    #[error("Delivery rejected with status {status}: {message}")]
    DeliveryRejected { status: u16, message: String },

    /// Seen-store could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create an extraction error with context.
    pub fn extraction(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error.
    pub fn persistence(message: impl fmt::Display) -> Self {
        Self::Persistence(message.to_string())
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Io(_)
            | Self::Fetch { .. }
            | Self::RateLimited { .. }
            | Self::DeliveryExhausted { .. }
            | Self::Persistence(_) => true,
            _ => false,
        }
    }

    /// Whether this error is a permanent refusal by the destination.
    pub fn is_permanent_rejection(&self) -> bool {
        matches!(self, Self::DeliveryRejected { .. })
    }
}
