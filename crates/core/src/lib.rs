//! Shared primitives for all Rust crates in allowgate.

#![forbid(unsafe_code)]

/// Session identity primitives shared across crates.
pub mod auth;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::Identity;

/// Result type used across allowgate crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Backend configuration is missing or still holds placeholder values.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The caller identity could not be established.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// The live allow-list listener could not be opened or was dropped.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// A remote add or remove did not go through.
    #[error("write error: {0}")]
    Write(String),

    /// The operation is not available in the current access state.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the message without the category prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(message)
            | Self::Authentication(message)
            | Self::Subscription(message)
            | Self::Validation(message)
            | Self::Write(message)
            | Self::Forbidden(message)
            | Self::Internal(message) => message.as_str(),
        }
    }

    /// Returns whether the error leaves the session unable to continue.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Authentication(_))
    }
}
