//! Merge-copy of selected keys from one location into another.

use std::collections::BTreeMap;

use promoter_secrets::{KeyValueDocument, Location, SecretValue};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::endpoint::Endpoint;
use crate::error::EngineError;
use crate::redaction::{parse_json_like, RedactionPolicy};

/// Which source keys to copy and how.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace keys the target already has.
    pub overwrite: bool,
    /// Copy only keys that do not match a sensitive pattern.
    pub copy_config_only: bool,
    /// Copy only keys that match a sensitive pattern.
    pub copy_secrets_only: bool,
    /// Copy key names with blank values.
    pub keys_only: bool,
}

impl CopyOptions {
    fn includes(&self, pattern_matched: bool) -> bool {
        match (self.copy_secrets_only, self.copy_config_only) {
            (true, false) => pattern_matched,
            (false, true) => !pattern_matched,
            // Neither or both set: no filtering.
            _ => true,
        }
    }
}

/// What a copy would write, computed without writing.
#[derive(Debug, Clone)]
pub struct CopyPlan {
    /// Document to store at the target: its previous keys plus the copied ones.
    pub merged: KeyValueDocument,
    /// Copied key to displayable value.
    pub keys: BTreeMap<String, String>,
    /// Source keys left alone because the target already has them.
    pub kept_existing: Vec<String>,
    /// Source keys dropped by the secrets/config filter.
    pub filtered_out: Vec<String>,
    pub target_existed: bool,
}

/// Result of a copy, safe to log.
#[derive(Debug, Clone, Serialize)]
pub struct CopyOutcome {
    pub source_location: Location,
    pub target_location: Location,
    pub success: bool,
    pub message: String,
    /// Copied key to the placeholder or displayable value written.
    pub keys: BTreeMap<String, String>,
}

/// Merges `source` into `target` (or into an empty document).
///
/// Copied keys keep the JSON member type they had in `source`.
#[must_use]
pub fn merge_documents(
    source: &KeyValueDocument,
    target: Option<&KeyValueDocument>,
    options: CopyOptions,
    policy: &RedactionPolicy,
) -> CopyPlan {
    let mut merged = match target {
        Some(existing) => existing.clone(),
        None if source.is_structured() => KeyValueDocument::new(),
        None => KeyValueDocument::scalar(""),
    };
    let mut plan_keys = BTreeMap::new();
    let mut kept_existing = Vec::new();
    let mut filtered_out = Vec::new();

    for (key, value) in source.iter() {
        if !options.overwrite && target.is_some_and(|t| t.contains_key(key)) {
            kept_existing.push(key.to_owned());
            continue;
        }
        if !options.includes(policy.matches_pattern(key)) {
            filtered_out.push(key.to_owned());
            continue;
        }

        if options.keys_only {
            let written = blank_structure(value);
            plan_keys.insert(key.to_owned(), policy.render(key, &written).text);
            // Blanked scalars become empty strings; skeletons keep the member type.
            if source.is_json(key) && !written.expose().is_empty() {
                merged.insert_json(key, written);
            } else {
                merged.insert(key, written);
            }
        } else {
            plan_keys.insert(key.to_owned(), policy.render(key, value).text);
            merged.insert_from(source, key);
        }
    }

    CopyPlan {
        merged,
        keys: plan_keys,
        kept_existing,
        filtered_out,
        target_existed: target.is_some(),
    }
}

/// Blanks a value, keeping the object/array skeleton of JSON values.
#[must_use]
pub fn blank_structure(value: &SecretValue) -> SecretValue {
    fn blank(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), blank(v))).collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(blank).collect()),
            _ => Value::String(String::new()),
        }
    }

    match parse_json_like(value.expose()) {
        Some(json) => SecretValue::new(blank(&json).to_string()),
        None => SecretValue::new(""),
    }
}

/// Fetches both sides and computes the merge without writing.
#[instrument(skip_all, fields(source = %source.location, target = %target.location))]
pub async fn plan_copy(
    source: &Endpoint,
    target: &Endpoint,
    options: CopyOptions,
    policy: &RedactionPolicy,
) -> Result<CopyPlan, EngineError> {
    if source.same_document(target) {
        return Err(EngineError::NoOpCopy {
            location: target.location.clone(),
        });
    }

    let source_document = source.fetch_required().await?;
    source.check_counterpart(&source_document, target)?;

    let target_document = target.fetch_optional().await?;
    if let Some(existing) = &target_document {
        target.check_counterpart(existing, source)?;
        if existing.is_structured() != source_document.is_structured() {
            return Err(EngineError::IncompatibleFormat(format!(
                "cannot merge {} into {}: only one of them is a key-value document",
                source.location, target.location
            )));
        }
    }

    let plan = merge_documents(&source_document, target_document.as_ref(), options, policy);
    debug!(
        copy.keys = plan.keys.len(),
        copy.kept_existing = plan.kept_existing.len(),
        copy.filtered_out = plan.filtered_out.len(),
        "Copy planned"
    );
    Ok(plan)
}

/// Copies keys from `source` into `target` with a single write.
///
/// Keys the target already has survive unless `overwrite` is set. A
/// missing hierarchical engine is created first. When no key qualifies,
/// nothing is written.
pub async fn copy(
    source: &Endpoint,
    target: &Endpoint,
    options: CopyOptions,
    policy: &RedactionPolicy,
) -> Result<CopyOutcome, EngineError> {
    let plan = plan_copy(source, target, options, policy).await?;

    if plan.keys.is_empty() {
        info!(source = %source.location, target = %target.location, "No keys to copy");
        return Ok(CopyOutcome {
            source_location: source.location.clone(),
            target_location: target.location.clone(),
            success: true,
            message: format!(
                "nothing to copy from {} to {}",
                source.location, target.location
            ),
            keys: plan.keys,
        });
    }

    target.ensure_engine().await?;
    target.write(&plan.merged, plan.target_existed).await?;

    info!(
        source = %source.location,
        target = %target.location,
        copy.keys = plan.keys.len(),
        "Copy complete"
    );

    Ok(CopyOutcome {
        source_location: source.location.clone(),
        target_location: target.location.clone(),
        success: true,
        message: format!(
            "copied {} key(s) from {} to {}",
            plan.keys.len(),
            source.location,
            target.location
        ),
        keys: plan.keys,
    })
}
