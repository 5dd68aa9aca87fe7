// src/error.rs

//! Unified error handling for the stock watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
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

    /// Fetching or parsing the remote listing page failed.
    /// Aborts the current cycle; snapshot and ledger stay untouched.
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// Sending a notification message failed.
    /// The delta for that cycle is not recorded in the ledger.
    #[error("Send error: {0}")]
    Send(String),

    /// Editing an existing notification message failed.
    /// Non-fatal: logged and skipped, ledger state stays mutated.
    #[error("Edit error: {0}")]
    Edit(String),
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

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a send error.
    pub fn send(message: impl fmt::Display) -> Self {
        Self::Send(message.to_string())
    }

    /// Create an edit error.
    pub fn edit(message: impl fmt::Display) -> Self {
        Self::Edit(message.to_string())
    }
}
