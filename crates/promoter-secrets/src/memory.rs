//! In-memory store adapter for testing and dry runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::traits::SecretStore;
use crate::types::{BackendKind, KeyValueDocument, StoreFamily};

const DEFAULT_ENGINE: &str = "secret";

/// In-memory store adapter.
///
/// Emulates either store family:
/// - Hierarchical: documents live in one engine that can be absent until
///   [`ensure_engine`](SecretStore::ensure_engine) creates it, and only
///   structured documents are accepted.
/// - Flat: no engine, unstructured documents allowed.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another. Every successful or failed write attempt is counted, and writes
/// to selected paths can be made to fail.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    family: StoreFamily,
    instance_id: Arc<str>,
    engine: Option<Arc<str>>,
    engine_present: Arc<AtomicBool>,
    data: Arc<RwLock<HashMap<String, KeyValueDocument>>>,
    failing_paths: Arc<RwLock<HashSet<String>>>,
    writes: Arc<AtomicUsize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates a hierarchical store with the default engine present.
    pub fn new() -> Self {
        Self::hierarchical(DEFAULT_ENGINE)
    }

    /// Creates a hierarchical store bound to `engine`.
    pub fn hierarchical(engine: impl Into<String>) -> Self {
        Self::build(StoreFamily::Hierarchical, Some(engine.into()))
    }

    /// Creates a flat store.
    pub fn flat() -> Self {
        Self::build(StoreFamily::Flat, None)
    }

    fn build(family: StoreFamily, engine: Option<String>) -> Self {
        Self {
            family,
            instance_id: Arc::from("memory"),
            engine: engine.map(Arc::from),
            engine_present: Arc::new(AtomicBool::new(true)),
            data: Arc::default(),
            failing_paths: Arc::default(),
            writes: Arc::default(),
        }
    }

    /// Sets the instance identifier.
    #[must_use]
    pub fn with_instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Arc::from(id.into());
        self
    }

    /// Marks the engine as absent until `ensure_engine` is called.
    #[must_use]
    pub fn without_engine(self) -> Self {
        self.engine_present.store(false, Ordering::SeqCst);
        self
    }

    /// Stores a document directly, bypassing write counting.
    pub async fn insert(&self, path: impl Into<String>, document: KeyValueDocument) {
        self.data.write().await.insert(path.into(), document);
    }

    /// Returns a copy of the document at `path`.
    pub async fn document(&self, path: &str) -> Option<KeyValueDocument> {
        self.data.read().await.get(path).cloned()
    }

    /// Makes every later write to `path` fail with a transport error.
    pub async fn fail_writes_to(&self, path: impl Into<String>) {
        self.failing_paths.write().await.insert(path.into());
    }

    /// Returns the number of write attempts so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns true if the bound engine exists.
    pub fn engine_present(&self) -> bool {
        self.engine_present.load(Ordering::SeqCst)
    }

    fn check_engine(&self) -> Result<(), StoreError> {
        match &self.engine {
            Some(engine) if !self.engine_present() => Err(StoreError::EngineNotFound {
                engine: engine.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn family(&self) -> StoreFamily {
        self.family
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    async fn fetch(&self, path: &str) -> Result<KeyValueDocument, StoreError> {
        self.check_engine()?;

        self.data
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::not_found(path))
    }

    async fn write(
        &self,
        path: &str,
        document: &KeyValueDocument,
        overwrite_existing: bool,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_engine()?;

        if self.family == StoreFamily::Hierarchical && !document.is_structured() {
            return Err(StoreError::IncompatibleFormat(format!(
                "hierarchical store cannot hold an unstructured document at {path}"
            )));
        }

        if self.failing_paths.read().await.contains(path) {
            return Err(StoreError::Transport(format!("injected write failure for {path}")));
        }

        let mut data = self.data.write().await;
        if !overwrite_existing && data.contains_key(path) {
            return Err(StoreError::AlreadyExists {
                path: path.to_owned(),
            });
        }
        data.insert(path.to_owned(), document.clone());

        tracing::info!(
            store.kind = "memory",
            store.path = path,
            store.keys = document.len(),
            store.operation = "write",
            "Document stored"
        );

        Ok(())
    }

    async fn ensure_engine(&self) -> Result<(), StoreError> {
        if let Some(engine) = &self.engine {
            if !self.engine_present.swap(true, Ordering::SeqCst) {
                tracing::info!(store.kind = "memory", store.engine = %engine, "Engine created");
            }
        }
        Ok(())
    }
}
