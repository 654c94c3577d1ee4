//! Shared primitives for all Rust crates in FluxGate.

#![forbid(unsafe_code)]

use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across FluxGate crates.
pub type AppResult<T> = Result<T, AppError>;

/// Boxed source error carried by storage failures.
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string for the named field.
    pub fn new(field: &str, value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::validation(
                field,
                "must not be empty or whitespace",
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
#[derive(Debug, Error)]
pub enum AppError {
    /// Input rejected before any storage access.
    #[error("invalid field '{field}': {reason}")]
    Validation {
        /// Offending field path.
        field: String,
        /// Human readable rejection reason.
        reason: String,
    },

    /// Requested rule does not exist.
    #[error("rule not found: {0}")]
    NotFound(String),

    /// Rule identifier is already taken.
    #[error("rule already exists: {0}")]
    AlreadyExists(String),

    /// Repository or timeout fault wrapped with the failing operation.
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// Service operation name, e.g. `toggle`.
        operation: &'static str,
        /// Original backend fault.
        #[source]
        cause: BoxedCause,
    },

    /// Caller did not present valid administrative credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal unexpected error, including adapter faults before wrapping.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Builds a validation failure for the named field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Wraps any error as a storage failure of the given operation.
    #[must_use]
    pub fn storage(operation: &'static str, cause: impl Into<BoxedCause>) -> Self {
        Self::Storage {
            operation,
            cause: cause.into(),
        }
    }

    /// Returns whether the caller may retry the failed operation unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}
