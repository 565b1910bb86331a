//! Traits for store adapter implementations.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{BackendKind, KeyValueDocument, StoreFamily};

/// Uniform interface over one backend instance.
///
/// An adapter is bound to one backend instance and, for hierarchical
/// stores, to one engine. Paths passed to the methods are relative to that
/// engine.
///
/// # Absence
///
/// A missing document is always reported as [`StoreError::NotFound`] and a
/// missing engine as [`StoreError::EngineNotFound`], whatever the backend's
/// native status code is. Callers branch on the variant, never on text.
///
/// # Retries
///
/// Adapters perform no retries. A failed call surfaces immediately.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the concrete backend kind.
    fn kind(&self) -> BackendKind;

    /// Returns the storage model of this backend.
    fn family(&self) -> StoreFamily;

    /// Returns an identifier of the backend instance (address, region).
    ///
    /// Two adapters with the same instance id, engine and path address the
    /// same document.
    fn instance_id(&self) -> &str;

    /// Returns the engine this adapter is bound to, if any.
    fn engine(&self) -> Option<&str>;

    /// Fetches the document at `path`.
    ///
    /// The returned document reports through
    /// [`KeyValueDocument::is_structured`] whether it is a key-value map or
    /// a single opaque string.
    async fn fetch(&self, path: &str) -> Result<KeyValueDocument, StoreError>;

    /// Writes `document` to `path` in a single call.
    ///
    /// When `overwrite_existing` is false the write must not replace an
    /// existing document; the adapter returns [`StoreError::AlreadyExists`]
    /// instead.
    async fn write(
        &self,
        path: &str,
        document: &KeyValueDocument,
        overwrite_existing: bool,
    ) -> Result<(), StoreError>;

    /// Checks whether a document exists at `path`.
    ///
    /// A missing engine counts as "does not exist".
    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        match self.fetch(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_absent() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Creates the bound engine if the backend needs one and it is absent.
    ///
    /// The default implementation does nothing.
    async fn ensure_engine(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
