//! Subcommand implementations and the plumbing they share.

pub mod compare;
pub mod copy;
pub mod split;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use promoter_engine::{Endpoint, OperationLog, OperationRecord, PromoterConfig, RedactionPolicy};
use promoter_secrets::{Location, StoreProvider};
use tracing::warn;

/// Default configuration file: `<config dir>/promoter/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("promoter")
        .join("config.json")
}

/// Loaded configuration plus the store factory.
pub struct Session {
    config: PromoterConfig,
    provider: StoreProvider,
}

impl Session {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = PromoterConfig::load_from(config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?;
        Ok(Self {
            config,
            provider: StoreProvider::new(),
        })
    }

    pub fn policy(&self) -> RedactionPolicy {
        self.config.redaction_policy()
    }

    /// Opens `environment` and binds `path` in it.
    ///
    /// The location only carries an engine if the opened store has one.
    pub async fn endpoint(
        &self,
        environment: &str,
        path: &str,
        engine: Option<&str>,
    ) -> Result<Endpoint> {
        let settings = self.config.environment(environment)?;
        let store = self
            .provider
            .open(environment, settings, engine)
            .await
            .with_context(|| format!("failed to open environment {environment}"))?;

        let mut location = Location::new(environment, path);
        if let Some(engine) = store.engine() {
            location = location.with_engine(engine);
        }
        Ok(Endpoint::new(location, store))
    }
}

/// Asks a yes/no question on stderr; anything but `y`/`yes` is a no.
pub fn confirm(question: &str) -> io::Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Appends `record` to `log`. The store change already happened, so a
/// logging failure is reported but does not fail the command.
pub async fn record(log: &OperationLog, record: &OperationRecord) {
    if let Err(err) = log.append(record).await {
        warn!(error = %err, "Operation was not logged");
        eprintln!("Warning: {err}");
    }
}
