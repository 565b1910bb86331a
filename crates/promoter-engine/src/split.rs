//! Moving sensitive keys out of a document into a new one.
//!
//! A split runs in two ordered writes:
//!
//! 1. the sensitive keys are written to the target, which must not exist;
//! 2. only then is the source overwritten with the remaining keys.
//!
//! If the second write fails, the target already holds the moved keys and
//! the source still holds everything. That state is reported as
//! [`EngineError::PartialFailure`] and is never rolled back.
//!
//! Nothing guards the window between the two writes. Concurrent splits or
//! edits of the same source or target have to be serialised by the caller.

use promoter_secrets::{KeyValueDocument, Location};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::endpoint::Endpoint;
use crate::error::EngineError;
use crate::redaction::RedactionPolicy;

/// The partition a split would apply.
#[derive(Debug, Clone)]
pub struct SplitPlan {
    /// Keys to move, with their values.
    pub sensitive: KeyValueDocument,
    /// Keys that stay in the source.
    pub retained: KeyValueDocument,
}

impl SplitPlan {
    #[must_use]
    pub fn moved_keys(&self) -> Vec<String> {
        self.sensitive.keys().map(str::to_owned).collect()
    }

    #[must_use]
    pub fn retained_keys(&self) -> Vec<String> {
        self.retained.keys().map(str::to_owned).collect()
    }
}

/// Result of a completed split.
#[derive(Debug, Clone, Serialize)]
pub struct SplitOutcome {
    pub source_location: Location,
    pub target_location: Location,
    /// Moved key names, in key order.
    pub moved_keys: Vec<String>,
    pub retained_keys: Vec<String>,
}

/// Splits `document` by the policy's patterns.
#[must_use]
pub fn partition(document: &KeyValueDocument, policy: &RedactionPolicy) -> SplitPlan {
    let mut sensitive = KeyValueDocument::new();
    let mut retained = KeyValueDocument::new();

    for key in document.keys() {
        if policy.matches_pattern(key) {
            sensitive.insert_from(document, key);
        } else {
            retained.insert_from(document, key);
        }
    }

    SplitPlan {
        sensitive,
        retained,
    }
}

/// Checks every precondition and computes the partition without writing.
///
/// Checks, in order: the target does not exist; the source exists, is a
/// key-value document and is not empty; the policy has patterns; at least
/// one source key matches.
#[instrument(skip_all, fields(source = %source.location, target = %target.location))]
pub async fn plan_split(
    source: &Endpoint,
    target: &Endpoint,
    policy: &RedactionPolicy,
) -> Result<SplitPlan, EngineError> {
    if target.exists().await? {
        return Err(EngineError::TargetAlreadyExists {
            location: target.location.clone(),
        });
    }

    let document = source.fetch_required().await?;
    if !document.is_structured() {
        return Err(EngineError::IncompatibleFormat(format!(
            "{} holds an unstructured secret, which cannot be split",
            source.location
        )));
    }
    if document.is_empty() {
        return Err(EngineError::EmptySource {
            location: source.location.clone(),
        });
    }
    if policy.patterns().is_empty() {
        return Err(EngineError::NoSensitiveKeysConfigured);
    }

    let plan = partition(&document, policy);
    if plan.sensitive.is_empty() {
        return Err(EngineError::NoSensitiveKeysMatched {
            location: source.location.clone(),
        });
    }
    Ok(plan)
}

/// Moves the sensitive keys of `source` to the new document `target`.
pub async fn split(
    source: &Endpoint,
    target: &Endpoint,
    policy: &RedactionPolicy,
) -> Result<SplitOutcome, EngineError> {
    let plan = plan_split(source, target, policy).await?;
    let moved_keys = plan.moved_keys();

    target.ensure_engine().await?;
    target.write(&plan.sensitive, false).await?;
    info!(
        target = %target.location,
        split.moved = ?moved_keys,
        "Sensitive keys written to target"
    );

    if let Err(cause) = source
        .store
        .write(source.path(), &plan.retained, true)
        .await
    {
        error!(
            source = %source.location,
            target = %target.location,
            split.moved = ?moved_keys,
            error = %cause,
            "Source update failed after target was written; manual cleanup required"
        );
        return Err(EngineError::PartialFailure {
            source_location: source.location.clone(),
            target_location: target.location.clone(),
            moved_keys,
            cause,
        });
    }

    info!(
        source = %source.location,
        split.retained = plan.retained.len(),
        "Source updated with remaining keys"
    );

    Ok(SplitOutcome {
        source_location: source.location.clone(),
        target_location: target.location.clone(),
        retained_keys: plan.retained_keys(),
        moved_keys,
    })
}
