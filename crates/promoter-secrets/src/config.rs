//! Connection settings for one environment's store.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::BackendKind;

/// How to reach the store behind one environment.
///
/// ```json
/// {"store": "vault", "url": "https://vault.dev:8200", "token_env": "VAULT_DEV_TOKEN"}
/// {"store": "awssecretsmanager", "region": "eu-west-1"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Backend kind (default: `vault`).
    #[serde(default)]
    pub store: BackendKind,

    /// Vault server address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Name of the environment variable holding the Vault token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// IAM role the AWS credentials are expected to belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// AWS region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Endpoint override for Secrets Manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl EnvironmentConfig {
    /// Vault environment.
    pub fn vault(url: impl Into<String>, token_env: impl Into<String>) -> Self {
        Self {
            store: BackendKind::Vault,
            url: Some(url.into()),
            token_env: Some(token_env.into()),
            ..Self::default()
        }
    }

    /// Secrets Manager environment.
    pub fn secrets_manager(region: impl Into<String>) -> Self {
        Self {
            store: BackendKind::SecretsManager,
            region: Some(region.into()),
            ..Self::default()
        }
    }

    /// Process-local environment.
    pub fn memory() -> Self {
        Self {
            store: BackendKind::Memory,
            ..Self::default()
        }
    }

    /// Checks that every field the backend needs is set.
    pub fn validate(&self, name: &str) -> Result<(), StoreError> {
        let missing = |field: &str| {
            StoreError::Configuration(format!(
                "environment {name}: {field} is required for {} stores",
                self.store
            ))
        };

        match self.store {
            BackendKind::Vault => {
                if is_blank(self.url.as_deref()) {
                    return Err(missing("url"));
                }
                if is_blank(self.token_env.as_deref()) {
                    return Err(missing("token_env"));
                }
            }
            BackendKind::SecretsManager => {
                if is_blank(self.region.as_deref()) {
                    return Err(missing("region"));
                }
            }
            BackendKind::Memory => {}
        }
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
