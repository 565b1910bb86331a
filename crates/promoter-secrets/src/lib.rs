//! Secret store adapters for promoter.
//!
//! This crate puts one trait, [`SecretStore`], in front of every backend a
//! document can be read from or written to. Values are carried as
//! [`SecretValue`], which is zeroised on drop and compares in constant time.
//!
//! # Backends
//!
//! - **Vault** (`vault` feature): KV version 2 engines over HTTP
//! - **Secrets Manager** (`secretsmanager` feature): AWS Secrets Manager,
//!   SigV4-signed JSON protocol
//! - **Memory** (`memory` feature): In-memory storage for tests and dry runs
//!
//! # Families
//!
//! Backends are either [`StoreFamily::Hierarchical`] (documents live in an
//! engine and are always key-value maps) or [`StoreFamily::Flat`] (documents
//! are addressed by name and may be a bare string). Callers reason about the
//! family, never the concrete backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use promoter_secrets::{EnvironmentConfig, StoreProvider};
//!
//! let provider = StoreProvider::new();
//! let store = provider
//!     .open(
//!         "dev",
//!         &EnvironmentConfig::vault("https://vault.dev:8200", "VAULT_DEV_TOKEN"),
//!         Some("secret"),
//!     )
//!     .await?;
//! let document = store.fetch("app/config").await?;
//! for key in document.keys() {
//!     println!("{key}");
//! }
//! ```

mod error;
mod traits;
mod types;

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "vault")]
mod vault;

#[cfg(feature = "secretsmanager")]
mod secretsmanager;

#[cfg(feature = "config")]
mod config;

#[cfg(feature = "config")]
mod provider;

pub use error::{Redacted, StoreError};
pub use traits::SecretStore;
pub use types::{BackendKind, KeyValueDocument, Location, SecretValue, StoreFamily, SCALAR_KEY};

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "vault")]
pub use vault::VaultStore;

#[cfg(feature = "secretsmanager")]
pub use secretsmanager::{AwsCredentials, SecretsManagerStore};

#[cfg(feature = "config")]
pub use config::EnvironmentConfig;

#[cfg(feature = "config")]
pub use provider::{StoreProvider, DEFAULT_ENGINE};
