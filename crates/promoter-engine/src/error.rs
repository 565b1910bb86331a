//! Error types for engine operations.

use std::fmt;

use promoter_secrets::{Location, StoreError};
use thiserror::Error;

/// The store call an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Fetch,
    Write,
    Exists,
    EnsureEngine,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Write => "write",
            Self::Exists => "existence check",
            Self::EnsureEngine => "engine creation",
        })
    }
}

/// Errors returned by compare, copy and split.
///
/// Messages name locations and keys, never values.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A backend call failed.
    #[error("{operation} of {location} failed: {source}")]
    Store {
        operation: StoreOperation,
        location: Location,
        source: StoreError,
    },

    /// Neither side of a comparison exists.
    #[error("neither {source_location} nor {target_location} exists")]
    BothMissing {
        source_location: Location,
        target_location: Location,
    },

    /// A document shape does not fit the operation.
    #[error("incompatible format: {0}")]
    IncompatibleFormat(String),

    /// Source and target address the same document.
    #[error("source and target are the same document: {location}")]
    NoOpCopy { location: Location },

    /// Split target is already populated.
    #[error("target already exists: {location}")]
    TargetAlreadyExists { location: Location },

    /// Split source holds no keys.
    #[error("source is empty: {location}")]
    EmptySource { location: Location },

    /// Split was asked to run with an empty pattern list.
    #[error("no sensitive key patterns are configured")]
    NoSensitiveKeysConfigured,

    /// No key in the split source matches a pattern.
    #[error("no key in {location} matches a sensitive pattern")]
    NoSensitiveKeysMatched { location: Location },

    /// Split wrote the target but could not update the source.
    ///
    /// Both locations now hold the moved keys. Nothing is rolled back; an
    /// operator has to remove them from the source by hand.
    #[error(
        "split incomplete: {} key(s) were written to {target_location} but {source_location} \
         was not updated and still holds them: {cause}",
        .moved_keys.len()
    )]
    PartialFailure {
        source_location: Location,
        target_location: Location,
        moved_keys: Vec<String>,
        #[source]
        cause: StoreError,
    },
}

/// Flat classification of [`EngineError`] for callers that branch on the
/// failure without matching on text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    EngineNotFound,
    BothMissing,
    Unauthenticated,
    TransportFailure,
    IncompatibleFormat,
    NoOpCopy,
    TargetAlreadyExists,
    EmptySource,
    NoSensitiveKeysConfigured,
    NoSensitiveKeysMatched,
    PartialFailure,
}

impl EngineError {
    pub(crate) fn store(
        operation: StoreOperation,
        location: &Location,
        source: StoreError,
    ) -> Self {
        Self::Store {
            operation,
            location: location.clone(),
            source,
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store { source, .. } => match source {
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::EngineNotFound { .. } => ErrorKind::EngineNotFound,
                StoreError::AlreadyExists { .. } => ErrorKind::TargetAlreadyExists,
                StoreError::Unauthenticated(_) => ErrorKind::Unauthenticated,
                StoreError::IncompatibleFormat(_) => ErrorKind::IncompatibleFormat,
                _ => ErrorKind::TransportFailure,
            },
            Self::BothMissing { .. } => ErrorKind::BothMissing,
            Self::IncompatibleFormat(_) => ErrorKind::IncompatibleFormat,
            Self::NoOpCopy { .. } => ErrorKind::NoOpCopy,
            Self::TargetAlreadyExists { .. } => ErrorKind::TargetAlreadyExists,
            Self::EmptySource { .. } => ErrorKind::EmptySource,
            Self::NoSensitiveKeysConfigured => ErrorKind::NoSensitiveKeysConfigured,
            Self::NoSensitiveKeysMatched { .. } => ErrorKind::NoSensitiveKeysMatched,
            Self::PartialFailure { .. } => ErrorKind::PartialFailure,
        }
    }

    /// Returns true if the error left stores in a state needing manual repair.
    #[must_use]
    pub fn is_partial_failure(&self) -> bool {
        matches!(self, Self::PartialFailure { .. })
    }
}
