//! A location paired with the store that serves it.

use std::fmt;
use std::sync::Arc;

use promoter_secrets::{KeyValueDocument, Location, SecretStore, StoreFamily};
use tracing::debug;

use crate::error::{EngineError, StoreOperation};

/// One side of a compare, copy or split.
///
/// The store is bound to the location's engine; `location` is what reports
/// and logs show.
#[derive(Clone)]
pub struct Endpoint {
    pub location: Location,
    pub store: Arc<dyn SecretStore>,
}

impl Endpoint {
    #[must_use]
    pub fn new(location: Location, store: Arc<dyn SecretStore>) -> Self {
        Self { location, store }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.location.path
    }

    #[must_use]
    pub fn family(&self) -> StoreFamily {
        self.store.family()
    }

    /// True if both endpoints address the same document.
    #[must_use]
    pub fn same_document(&self, other: &Self) -> bool {
        self.location == other.location
            || (self.store.instance_id() == other.store.instance_id()
                && self.store.engine() == other.store.engine()
                && self.path() == other.path())
    }

    /// Fetches the document, mapping absence to `None`.
    pub(crate) async fn fetch_optional(&self) -> Result<Option<KeyValueDocument>, EngineError> {
        match self.store.fetch(self.path()).await {
            Ok(document) => Ok(Some(document)),
            Err(err) if err.is_absent() => {
                debug!(location = %self.location, reason = %err, "Document absent");
                Ok(None)
            }
            Err(err) => Err(self.error(StoreOperation::Fetch, err)),
        }
    }

    /// Fetches the document; absence is an error.
    pub(crate) async fn fetch_required(&self) -> Result<KeyValueDocument, EngineError> {
        self.store
            .fetch(self.path())
            .await
            .map_err(|err| self.error(StoreOperation::Fetch, err))
    }

    pub(crate) async fn exists(&self) -> Result<bool, EngineError> {
        self.store
            .exists(self.path())
            .await
            .map_err(|err| self.error(StoreOperation::Exists, err))
    }

    pub(crate) async fn ensure_engine(&self) -> Result<(), EngineError> {
        self.store
            .ensure_engine()
            .await
            .map_err(|err| self.error(StoreOperation::EnsureEngine, err))
    }

    pub(crate) async fn write(
        &self,
        document: &KeyValueDocument,
        overwrite_existing: bool,
    ) -> Result<(), EngineError> {
        self.store
            .write(self.path(), document, overwrite_existing)
            .await
            .map_err(|err| self.error(StoreOperation::Write, err))
    }

    /// Rejects an unstructured `document` from this side when the other
    /// side is a hierarchical store.
    pub(crate) fn check_counterpart(
        &self,
        document: &KeyValueDocument,
        counterpart: &Self,
    ) -> Result<(), EngineError> {
        if !document.is_structured() && counterpart.family() == StoreFamily::Hierarchical {
            return Err(EngineError::IncompatibleFormat(format!(
                "{} holds an unstructured secret but {} only stores key-value documents",
                self.location, counterpart.location
            )));
        }
        Ok(())
    }

    fn error(&self, operation: StoreOperation, err: promoter_secrets::StoreError) -> EngineError {
        EngineError::store(operation, &self.location, err)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("location", &self.location)
            .field("store", &self.store.kind())
            .finish()
    }
}
