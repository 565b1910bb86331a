//! Promoter configuration with layered loading.
//!
//! ```json
//! {
//!   "environments": {
//!     "dev":  {"store": "vault", "url": "https://vault.dev:8200", "token_env": "VAULT_DEV_TOKEN"},
//!     "prod": {"store": "awssecretsmanager", "region": "eu-west-1"}
//!   },
//!   "redacted_keys": ["password", "token"],
//!   "redact_secrets": true,
//!   "redact_json_values": false
//! }
//! ```
//!
//! Files ending in `.toml` are read as TOML, anything else as JSON.
//! Environment variables prefixed with `PROMOTER_` override file settings,
//! with `__` separating nested keys (`PROMOTER_ENVIRONMENTS__DEV__URL`).

use std::collections::BTreeMap;
use std::path::Path;

use figment::providers::{Env, Format, Json, Toml};
use figment::{Error as FigmentError, Figment};
use promoter_secrets::{EnvironmentConfig, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::redaction::{RedactionPolicy, DEFAULT_SENSITIVE_KEYS};

const ENV_PREFIX: &str = "PROMOTER_";

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error from the Figment configuration library.
    #[error("Configuration error: {0}")]
    Figment(Box<FigmentError>),

    /// The specified configuration file was not found.
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// An environment name is not configured.
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),
}

impl From<FigmentError> for ConfigError {
    fn from(err: FigmentError) -> Self {
        Self::Figment(Box::new(err))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoterConfig {
    /// Environment name to store settings.
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,

    /// Sensitive key patterns; empty means the builtin list.
    #[serde(default, alias = "sensitive_keys")]
    pub redacted_keys: Vec<String>,

    /// Hide every value, not only pattern-matched ones.
    #[serde(default = "default_true")]
    pub redact_secrets: bool,

    /// Show JSON values with only their sensitive fields hidden.
    #[serde(default)]
    pub redact_json_values: bool,
}

const fn default_true() -> bool {
    true
}

impl PromoterConfig {
    /// Loads configuration from `path`, with environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let figment = if is_toml {
            Figment::new().merge(Toml::file(path))
        } else {
            Figment::new().merge(Json::file(path))
        };

        Self::finish(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Parses configuration from a JSON string.
    pub fn parse_json(content: &str) -> Result<Self, ConfigError> {
        Self::finish(Figment::new().merge(Json::string(content)))
    }

    /// Parses configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        Self::finish(Figment::new().merge(Toml::string(content)))
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that at least one environment is configured and that each
    /// has the settings its store needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environments.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one environment must be configured".to_owned(),
            ));
        }

        for (name, environment) in &self.environments {
            environment.validate(name).map_err(|err| match err {
                StoreError::Configuration(message) => ConfigError::Invalid(message),
                other => ConfigError::Invalid(other.to_string()),
            })?;
        }
        Ok(())
    }

    /// Returns the settings of environment `name`.
    pub fn environment(&self, name: &str) -> Result<&EnvironmentConfig, ConfigError> {
        self.environments
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEnvironment(name.to_owned()))
    }

    /// Builds the redaction policy described by this configuration.
    #[must_use]
    pub fn redaction_policy(&self) -> RedactionPolicy {
        if self.redacted_keys.iter().all(|k| k.trim().is_empty()) {
            RedactionPolicy::new(
                DEFAULT_SENSITIVE_KEYS.iter().copied(),
                self.redact_secrets,
                self.redact_json_values,
            )
        } else {
            RedactionPolicy::new(
                &self.redacted_keys,
                self.redact_secrets,
                self.redact_json_values,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use promoter_secrets::BackendKind;

    use super::*;

    const JSON: &str = r#"{
        "environments": {
            "dev": {"url": "http://vault.dev:8200", "token_env": "VAULT_DEV_TOKEN"},
            "prod": {
                "store": "awssecretsmanager",
                "region": "eu-west-1",
                "role": "arn:aws:iam::1:role/x"
            }
        },
        "redacted_keys": ["Password", "token"]
    }"#;

    #[test]
    fn parses_json_with_defaults() {
        let config = PromoterConfig::parse_json(JSON).unwrap();

        assert_eq!(config.environments.len(), 2);
        assert_eq!(config.environment("dev").unwrap().store, BackendKind::Vault);
        assert_eq!(
            config.environment("prod").unwrap().store,
            BackendKind::SecretsManager
        );
        assert!(config.redact_secrets);
        assert!(!config.redact_json_values);

        let policy = config.redaction_policy();
        assert_eq!(policy.patterns(), ["password".to_owned(), "token".to_owned()]);
        assert!(policy.redact_all_secrets());
    }

    #[test]
    fn parses_toml_and_alias() {
        let config = PromoterConfig::parse_toml(
            r#"
            sensitive_keys = ["secret"]
            redact_secrets = false
            redact_json_values = true

            [environments.local]
            store = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.redacted_keys, vec!["secret".to_owned()]);
        let policy = config.redaction_policy();
        assert!(!policy.redact_all_secrets());
        assert!(policy.redact_nested_json());
    }

    #[test]
    fn empty_key_list_means_builtin_patterns() {
        let config = PromoterConfig::parse_json(
            r#"{"environments": {"local": {"store": "memory"}}, "redacted_keys": []}"#,
        )
        .unwrap();
        assert_eq!(
            config.redaction_policy().patterns().len(),
            DEFAULT_SENSITIVE_KEYS.len()
        );
    }

    #[test]
    fn requires_an_environment() {
        let err = PromoterConfig::parse_json("{}").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn vault_environment_requires_url() {
        let err = PromoterConfig::parse_json(r#"{"environments": {"dev": {"token_env": "T"}}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("url")));
    }

    #[test]
    fn unknown_environment() {
        let config = PromoterConfig::parse_json(JSON).unwrap();
        assert!(matches!(
            config.environment("staging").unwrap_err(),
            ConfigError::UnknownEnvironment(ref name) if name == "staging"
        ));
    }

    #[test]
    fn missing_file() {
        let err = PromoterConfig::load_from("/nonexistent/promoter.json").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
