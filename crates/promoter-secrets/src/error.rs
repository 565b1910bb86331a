//! Error types for store adapters.

use std::fmt;

use thiserror::Error;

use crate::types::BackendKind;

/// Errors that can occur while talking to a secret store.
///
/// Messages carry paths, engine names and backend status text only. Secret
/// values never appear in an error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist.
    #[error("document not found: {path}")]
    NotFound {
        /// The path that was looked up.
        path: String,
    },

    /// The engine (mount) holding documents does not exist.
    #[error("engine not found: {engine}")]
    EngineNotFound {
        /// The engine name.
        engine: String,
    },

    /// A create-only write found an existing document.
    #[error("document already exists: {path}")]
    AlreadyExists {
        /// The path that was written.
        path: String,
    },

    /// The backend rejected the credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The backend call failed for a reason other than absence.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The document shape does not fit the operation.
    #[error("incompatible format: {0}")]
    IncompatibleFormat(String),

    /// Operation not supported by this backend.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unsupported backend type.
    #[error("unsupported store backend: {0}")]
    UnsupportedBackend(BackendKind),

    /// Response or request body could not be (de)serialised.
    #[error("serialisation error: {0}")]
    Serialisation(String),
}

impl StoreError {
    /// Returns true when the error means "nothing stored there".
    ///
    /// Both a missing document and a missing engine qualify.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::EngineNotFound { .. })
    }

    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }
}

#[cfg(any(feature = "vault", feature = "secretsmanager"))]
impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Serialisation(err.to_string())
        } else {
            Self::Transport(err.without_url().to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialisation(err.to_string())
    }
}

/// A redacted wrapper for error contexts that might contain sensitive data.
///
/// Implements `Debug` and `Display` to show only `[REDACTED]`, preventing
/// accidental logging of sensitive information.
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
    /// Creates a new redacted wrapper around a value.
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Consumes the wrapper and returns the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
