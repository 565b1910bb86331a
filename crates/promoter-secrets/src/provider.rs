//! Factory turning environment settings into store adapters.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::EnvironmentConfig;
use crate::error::StoreError;
use crate::traits::SecretStore;
use crate::types::BackendKind;

#[cfg(feature = "memory")]
use crate::memory::MemoryStore;

#[cfg(feature = "vault")]
use crate::vault::VaultStore;

#[cfg(feature = "secretsmanager")]
use crate::secretsmanager::{AwsCredentials, SecretsManagerStore};

/// Engine used for hierarchical stores when none is named.
pub const DEFAULT_ENGINE: &str = "secret";

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builds store adapters from [`EnvironmentConfig`].
///
/// This is the only place credentials are read: Vault tokens from the
/// variable named by `token_env`, AWS keys from `AWS_ACCESS_KEY_ID`,
/// `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`. Memory stores are kept
/// per environment and engine so repeated opens see the same data.
#[derive(Clone)]
#[must_use]
pub struct StoreProvider {
    lookup: Lookup,
    #[cfg(feature = "memory")]
    memory: Arc<Mutex<HashMap<(String, Option<String>), MemoryStore>>>,
}

impl Default for StoreProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreProvider {
    /// Creates a provider reading credentials from the process environment.
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Creates a provider with a custom credential lookup.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Arc::new(lookup),
            #[cfg(feature = "memory")]
            memory: Arc::default(),
        }
    }

    /// Opens the store for `environment`, bound to `engine` where the
    /// backend has engines.
    pub async fn open(
        &self,
        environment: &str,
        config: &EnvironmentConfig,
        engine: Option<&str>,
    ) -> Result<Arc<dyn SecretStore>, StoreError> {
        config.validate(environment)?;
        debug!(
            store.environment = environment,
            store.kind = %config.store,
            store.engine = engine.unwrap_or_default(),
            "Opening store"
        );

        match config.store {
            #[cfg(feature = "vault")]
            BackendKind::Vault => {
                let token_env = config.token_env.as_deref().unwrap_or_default();
                let token = self.require(token_env)?;
                let store = VaultStore::new(
                    config.url.clone().unwrap_or_default(),
                    token.into(),
                    engine.unwrap_or(DEFAULT_ENGINE),
                )?;
                Ok(Arc::new(store))
            }

            #[cfg(feature = "secretsmanager")]
            BackendKind::SecretsManager => {
                let region = config.region.clone().unwrap_or_default();
                if let Some(role) = &config.role {
                    debug!(aws.role = %role, "Using ambient credentials for configured role");
                }

                let mut credentials = AwsCredentials::new(
                    self.require("AWS_ACCESS_KEY_ID")?,
                    self.require("AWS_SECRET_ACCESS_KEY")?.into(),
                );
                if let Some(token) = (self.lookup)("AWS_SESSION_TOKEN") {
                    credentials = credentials.with_session_token(token.into());
                }

                let store = match &config.endpoint {
                    Some(endpoint) => {
                        SecretsManagerStore::with_endpoint(region, endpoint, credentials)?
                    }
                    None => SecretsManagerStore::new(region, credentials)?,
                };
                Ok(Arc::new(store))
            }

            #[cfg(feature = "memory")]
            BackendKind::Memory => {
                let key = (environment.to_owned(), engine.map(str::to_owned));
                let mut stores = self.memory.lock().await;
                let store = stores
                    .entry(key)
                    .or_insert_with(|| {
                        let store = match engine {
                            Some(engine) => MemoryStore::hierarchical(engine),
                            None => MemoryStore::flat(),
                        };
                        store.with_instance_id(format!("memory:{environment}"))
                    })
                    .clone();
                Ok(Arc::new(store))
            }

            #[allow(unreachable_patterns)]
            kind => Err(StoreError::UnsupportedBackend(kind)),
        }
    }

    fn require(&self, variable: &str) -> Result<String, StoreError> {
        (self.lookup)(variable)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                StoreError::Configuration(format!("environment variable {variable} is not set"))
            })
    }
}

impl std::fmt::Debug for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreProvider").finish_non_exhaustive()
    }
}
