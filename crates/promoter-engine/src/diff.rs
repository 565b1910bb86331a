//! Structural comparison of two documents.

use promoter_secrets::{KeyValueDocument, Location};
use serde::Serialize;
use tracing::{info, instrument};

use crate::endpoint::Endpoint;
use crate::error::EngineError;
use crate::redaction::RedactionPolicy;
use crate::textdiff;

/// How a key differs between source and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    /// Only in the source.
    Added,
    /// Only in the target.
    Removed,
    /// In both, with different values.
    Modified,
    /// Marker explaining that one side is absent; carries no key.
    Info,
}

/// One line of a comparison.
///
/// Values are display copies: sensitive ones are already replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub key: String,
    pub source_value: String,
    pub target_value: String,
    /// Line diff of the two values; empty unless the entry is a
    /// non-redacted modification.
    pub diff: String,
    pub redacted: bool,
    pub status: DiffStatus,
}

impl DiffEntry {
    fn info(message: String) -> Self {
        Self {
            key: String::new(),
            source_value: message,
            target_value: String::new(),
            diff: String::new(),
            redacted: false,
            status: DiffStatus::Info,
        }
    }
}

/// Added/removed/modified counts, excluding markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounts {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

/// Outcome of comparing two locations.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub source_location: Location,
    pub target_location: Location,
    /// Source entries in key order, then target-only entries in key order.
    /// A marker comes first when one side is absent.
    pub entries: Vec<DiffEntry>,
    pub source_missing: bool,
    pub target_missing: bool,
}

impl ComparisonResult {
    #[must_use]
    pub fn counts(&self) -> DiffCounts {
        self.entries
            .iter()
            .fold(DiffCounts::default(), |mut counts, entry| {
                match entry.status {
                    DiffStatus::Added => counts.added += 1,
                    DiffStatus::Removed => counts.removed += 1,
                    DiffStatus::Modified => counts.modified += 1,
                    DiffStatus::Info => {}
                }
                counts
            })
    }

    /// True when no key differs.
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.counts() == DiffCounts::default()
    }
}

/// Compares two already-fetched documents. `None` means absent.
pub fn diff_documents(
    source_location: &Location,
    source: Option<&KeyValueDocument>,
    target_location: &Location,
    target: Option<&KeyValueDocument>,
    policy: &RedactionPolicy,
) -> Result<ComparisonResult, EngineError> {
    let mut result = ComparisonResult {
        source_location: source_location.clone(),
        target_location: target_location.clone(),
        entries: Vec::new(),
        source_missing: source.is_none(),
        target_missing: target.is_none(),
    };

    match (source, target) {
        (None, None) => {
            return Err(EngineError::BothMissing {
                source_location: source_location.clone(),
                target_location: target_location.clone(),
            })
        }
        (Some(source), None) => {
            result.entries.push(DiffEntry::info(format!(
                "target {target_location} does not exist; every source key is new"
            )));
            result
                .entries
                .extend(source.iter().map(|(key, value)| {
                    let shown = policy.render(key, value);
                    DiffEntry {
                        key: key.to_owned(),
                        source_value: shown.text,
                        target_value: String::new(),
                        diff: String::new(),
                        redacted: shown.redacted,
                        status: DiffStatus::Added,
                    }
                }));
        }
        (None, Some(target)) => {
            result.entries.push(DiffEntry::info(format!(
                "source {source_location} does not exist; every target key would be removed"
            )));
            result.entries.extend(target.iter().map(|(key, value)| {
                let shown = policy.render(key, value);
                DiffEntry {
                    key: key.to_owned(),
                    source_value: String::new(),
                    target_value: shown.text,
                    diff: String::new(),
                    redacted: shown.redacted,
                    status: DiffStatus::Removed,
                }
            }));
        }
        (Some(source), Some(target)) => {
            if source.is_structured() != target.is_structured() {
                return Err(EngineError::IncompatibleFormat(format!(
                    "cannot compare {source_location} with {target_location}: \
                     only one of them is a key-value document"
                )));
            }
            result.entries = diff_present(source, target, policy);
        }
    }

    Ok(result)
}

fn diff_present(
    source: &KeyValueDocument,
    target: &KeyValueDocument,
    policy: &RedactionPolicy,
) -> Vec<DiffEntry> {
    let mut entries = Vec::new();

    for (key, source_value) in source.iter() {
        match target.get(key) {
            None => {
                let shown = policy.render(key, source_value);
                entries.push(DiffEntry {
                    key: key.to_owned(),
                    source_value: shown.text,
                    target_value: String::new(),
                    diff: String::new(),
                    redacted: shown.redacted,
                    status: DiffStatus::Added,
                });
            }
            // Equality on the raw values; redaction only shapes the display.
            Some(target_value) if source_value == target_value => {}
            Some(target_value) => {
                let source_shown = policy.render(key, source_value);
                let target_shown = policy.render(key, target_value);
                let redacted = source_shown.redacted || target_shown.redacted;
                let diff = if redacted {
                    String::new()
                } else {
                    textdiff::value_diff(&target_shown.text, &source_shown.text)
                };

                entries.push(DiffEntry {
                    key: key.to_owned(),
                    source_value: source_shown.text,
                    target_value: target_shown.text,
                    diff,
                    redacted,
                    status: DiffStatus::Modified,
                });
            }
        }
    }

    for (key, target_value) in target.iter() {
        if source.contains_key(key) {
            continue;
        }
        let shown = policy.render(key, target_value);
        entries.push(DiffEntry {
            key: key.to_owned(),
            source_value: String::new(),
            target_value: shown.text,
            diff: String::new(),
            redacted: shown.redacted,
            status: DiffStatus::Removed,
        });
    }

    entries
}

/// Fetches both sides and compares them.
///
/// Either side may be absent. An unstructured secret can only be compared
/// with another unstructured secret in a flat store.
#[instrument(skip_all, fields(source = %source.location, target = %target.location))]
pub async fn compare(
    source: &Endpoint,
    target: &Endpoint,
    policy: &RedactionPolicy,
) -> Result<ComparisonResult, EngineError> {
    let source_document = source.fetch_optional().await?;
    let target_document = target.fetch_optional().await?;

    if let Some(document) = &source_document {
        source.check_counterpart(document, target)?;
    }
    if let Some(document) = &target_document {
        target.check_counterpart(document, source)?;
    }

    let result = diff_documents(
        &source.location,
        source_document.as_ref(),
        &target.location,
        target_document.as_ref(),
        policy,
    )?;

    let counts = result.counts();
    info!(
        diff.added = counts.added,
        diff.removed = counts.removed,
        diff.modified = counts.modified,
        "Comparison complete"
    );
    Ok(result)
}
