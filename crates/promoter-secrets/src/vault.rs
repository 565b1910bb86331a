//! HashiCorp Vault KV version 2 adapter.
//!
//! Talks to the Vault HTTP API directly:
//!
//! | operation | request |
//! |---|---|
//! | list engines | `GET /v1/sys/mounts` |
//! | create engine | `POST /v1/sys/mounts/{engine}` |
//! | fetch | `GET /v1/{engine}/data/{path}` |
//! | write | `POST /v1/{engine}/data/{path}` |
//! | exists | `GET /v1/{engine}/metadata/{path}` |
//!
//! The engine list is fetched at most once per adapter and then kept up to
//! date by [`ensure_engine`](SecretStore::ensure_engine).
//!
//! A path whose current version is deleted or destroyed does not exist as
//! far as the adapter is concerned, even though Vault keeps its metadata.
//! Create-only writes to such a path check-and-set against that version.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::traits::SecretStore;
use crate::types::{BackendKind, KeyValueDocument, StoreFamily};

const TOKEN_HEADER: &str = "X-Vault-Token";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct KvReadResponse {
    data: Option<KvReadData>,
}

#[derive(Deserialize)]
struct KvReadData {
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct MetadataResponse {
    data: Metadata,
}

#[derive(Deserialize)]
struct Metadata {
    current_version: u64,
    #[serde(default)]
    versions: HashMap<String, VersionMetadata>,
}

#[derive(Deserialize, Default)]
struct VersionMetadata {
    #[serde(default)]
    deletion_time: String,
    #[serde(default)]
    destroyed: bool,
}

impl Metadata {
    /// Returns true if the current version can still be read.
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        if self.current_version == 0 {
            return false;
        }
        let Some(version) = self.versions.get(&self.current_version.to_string()) else {
            return true;
        };
        if version.destroyed {
            return false;
        }
        // Deletion may be scheduled in the future; unparseable times count as live.
        match DateTime::parse_from_rfc3339(&version.deletion_time) {
            Ok(at) => at > now,
            Err(_) => true,
        }
    }
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Adapter for one KV v2 engine on one Vault server.
pub struct VaultStore {
    client: Client,
    address: String,
    token: SecretString,
    engine: String,
    mounts: RwLock<Option<HashSet<String>>>,
}

impl VaultStore {
    /// Creates an adapter with a default HTTP client.
    pub fn new(
        address: impl Into<String>,
        token: SecretString,
        engine: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, address, token, engine))
    }

    /// Creates an adapter around an existing HTTP client.
    pub fn with_client(
        client: Client,
        address: impl Into<String>,
        token: SecretString,
        engine: impl Into<String>,
    ) -> Self {
        Self {
            client,
            address: address.into().trim_end_matches('/').to_owned(),
            token,
            engine: engine.into().trim_matches('/').to_owned(),
            mounts: RwLock::new(None),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/v1/{}", self.address, suffix)
    }

    fn document_url(&self, kind: &str, path: &str) -> String {
        self.url(&format!("{}/{kind}/{}", self.engine, path.trim_start_matches('/')))
    }

    fn mount_key(&self) -> String {
        format!("{}/", self.engine)
    }

    async fn engine_exists(&self) -> Result<bool, StoreError> {
        if let Some(mounts) = self.mounts.read().await.as_ref() {
            return Ok(mounts.contains(&self.mount_key()));
        }

        let mut cached = self.mounts.write().await;
        if cached.is_none() {
            *cached = Some(self.list_mounts().await?);
        }
        Ok(cached
            .as_ref()
            .is_some_and(|mounts| mounts.contains(&self.mount_key())))
    }

    async fn list_mounts(&self) -> Result<HashSet<String>, StoreError> {
        let response = self
            .client
            .get(self.url("sys/mounts"))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "sys/mounts").await);
        }

        let body: serde_json::Value = response.json().await?;
        // Newer servers nest the table under "data"; older ones return it
        // at the top level next to request metadata.
        let table = body
            .get("data")
            .and_then(serde_json::Value::as_object)
            .or_else(|| body.as_object());

        let mounts: HashSet<String> = table
            .map(|t| {
                t.keys()
                    .filter(|k| k.ends_with('/'))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        debug!(store.kind = "vault", mounts = mounts.len(), "Loaded engine list");
        Ok(mounts)
    }

    async fn require_engine(&self) -> Result<(), StoreError> {
        if self.engine_exists().await? {
            Ok(())
        } else {
            Err(StoreError::EngineNotFound {
                engine: self.engine.clone(),
            })
        }
    }
}

impl VaultStore {
    /// Reads the metadata of `path`; `None` if Vault has never seen it.
    async fn metadata(&self, path: &str) -> Result<Option<Metadata>, StoreError> {
        let response = self
            .client
            .get(self.document_url("metadata", path))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body: MetadataResponse = response.json().await?;
                Ok(Some(body.data))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(error_from_response(response, path).await),
        }
    }
}

#[async_trait]
impl SecretStore for VaultStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Vault
    }

    fn family(&self) -> StoreFamily {
        StoreFamily::Hierarchical
    }

    fn instance_id(&self) -> &str {
        &self.address
    }

    fn engine(&self) -> Option<&str> {
        Some(&self.engine)
    }

    #[instrument(skip(self), fields(store.engine = %self.engine))]
    async fn fetch(&self, path: &str) -> Result<KeyValueDocument, StoreError> {
        self.require_engine().await?;

        let response = self
            .client
            .get(self.document_url("data", path))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, path).await);
        }

        let body: KvReadResponse = response.json().await?;
        // A soft-deleted latest version comes back with `data: null`.
        let Some(data) = body.data.and_then(|d| d.data) else {
            return Err(StoreError::not_found(path));
        };

        KeyValueDocument::from_json_object(&data).ok_or_else(|| {
            StoreError::Serialisation(format!("vault document at {path} is not an object"))
        })
    }

    #[instrument(skip(self, document), fields(store.engine = %self.engine))]
    async fn write(
        &self,
        path: &str,
        document: &KeyValueDocument,
        overwrite_existing: bool,
    ) -> Result<(), StoreError> {
        if !document.is_structured() {
            return Err(StoreError::IncompatibleFormat(format!(
                "vault cannot store an unstructured document at {path}"
            )));
        }
        self.require_engine().await?;

        let mut body = json!({ "data": document.to_json_object() });
        if !overwrite_existing {
            let cas = match self.metadata(path).await? {
                Some(meta) if meta.is_live(Utc::now()) => {
                    return Err(StoreError::AlreadyExists {
                        path: path.to_owned(),
                    });
                }
                // Deleted or destroyed current version: write the next one.
                Some(meta) => meta.current_version,
                None => 0,
            };
            debug!(store.path = path, cas, "Create-only write");
            body["options"] = json!({ "cas": cas });
        }

        let response = self
            .client
            .post(self.document_url("data", path))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST
            && !overwrite_existing
            && self.exists(path).await?
        {
            return Err(StoreError::AlreadyExists {
                path: path.to_owned(),
            });
        }
        if !response.status().is_success() {
            return Err(error_from_response(response, path).await);
        }

        info!(
            store.kind = "vault",
            store.path = path,
            store.keys = document.len(),
            store.operation = "write",
            "Document stored"
        );
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        if !self.engine_exists().await? {
            return Ok(false);
        }

        Ok(self
            .metadata(path)
            .await?
            .is_some_and(|meta| meta.is_live(Utc::now())))
    }

    async fn ensure_engine(&self) -> Result<(), StoreError> {
        if self.engine_exists().await? {
            return Ok(());
        }

        let response = self
            .client
            .post(self.url(&format!("sys/mounts/{}", self.engine)))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .json(&json!({ "type": "kv", "options": { "version": "2" } }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &self.engine).await);
        }

        if let Some(mounts) = self.mounts.write().await.as_mut() {
            mounts.insert(self.mount_key());
        }

        info!(store.kind = "vault", store.engine = %self.engine, "Created KV v2 engine");
        Ok(())
    }
}

impl std::fmt::Debug for VaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStore")
            .field("address", &self.address)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

async fn error_from_response(response: Response, path: &str) -> StoreError {
    let status = response.status();
    let body: ErrorBody = response.json().await.unwrap_or_default();
    let detail = body.errors.join("; ");

    match status {
        StatusCode::NOT_FOUND => StoreError::not_found(path),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Unauthenticated(format!("vault returned {status} for {path}: {detail}"))
        }
        _ => StoreError::Transport(format!("vault returned {status} for {path}: {detail}")),
    }
}
