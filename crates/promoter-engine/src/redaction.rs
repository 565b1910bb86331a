//! Redaction policy for key-value documents.
//!
//! A key is *pattern-matched* when its lowercased name contains any
//! configured pattern. It is *sensitive* when it is pattern-matched or when
//! `redact_all_secrets` is on. Sensitive values are replaced by
//! [`PLACEHOLDER`] wherever they would be shown or logged.
//!
//! Nested redaction is separate: with `redact_nested_json` on, a value that
//! holds a JSON object or array is shown with only its pattern-matched
//! object keys replaced, instead of being replaced as a whole.

use promoter_secrets::SecretValue;
use serde_json::Value;

/// The string shown in place of a hidden value.
pub const PLACEHOLDER: &str = "(redacted)";

/// Patterns used when none are configured.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "secret",
    "token",
    "key",
    "credential",
    "auth",
    "pwd",
    "pass",
    "apikey",
    "api_key",
    "access_key",
    "secret_key",
    "private_key",
    "cert",
    "certificate",
];

/// A value prepared for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedValue {
    /// Text safe to show.
    pub text: String,
    /// True if the key is sensitive.
    pub redacted: bool,
}

/// Decides which values may be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionPolicy {
    patterns: Vec<String>,
    redact_all_secrets: bool,
    redact_nested_json: bool,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_SENSITIVE_KEYS.iter().copied(),
            true,
            false,
        )
    }
}

impl RedactionPolicy {
    /// Creates a policy. Patterns are lowercased; empty patterns are dropped.
    #[must_use]
    pub fn new<I, S>(patterns: I, redact_all_secrets: bool, redact_nested_json: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            patterns,
            redact_all_secrets,
            redact_nested_json,
        }
    }

    /// Returns the lowercased patterns.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    #[must_use]
    pub const fn redact_all_secrets(&self) -> bool {
        self.redact_all_secrets
    }

    #[must_use]
    pub const fn redact_nested_json(&self) -> bool {
        self.redact_nested_json
    }

    /// True if `key` contains a configured pattern, ignoring case.
    ///
    /// Copy filters and split partitioning classify keys with this test.
    #[must_use]
    pub fn matches_pattern(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.patterns.iter().any(|p| key.contains(p.as_str()))
    }

    /// True if the value of `key` must not be shown.
    #[must_use]
    pub fn is_sensitive(&self, key: &str) -> bool {
        self.redact_all_secrets || self.matches_pattern(key)
    }

    /// Returns `value` or the placeholder, depending on `key`.
    #[must_use]
    pub fn redact_scalar<'a>(&self, key: &str, value: &'a str) -> &'a str {
        if self.is_sensitive(key) {
            PLACEHOLDER
        } else {
            value
        }
    }

    /// Replaces every pattern-matched object key's value, at any depth.
    #[must_use]
    pub fn redact_structured(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let v = if self.matches_pattern(k) {
                            Value::String(PLACEHOLDER.to_owned())
                        } else {
                            self.redact_structured(v)
                        };
                        (k.clone(), v)
                    })
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.redact_structured(v)).collect())
            }
            scalar => scalar.clone(),
        }
    }

    /// Renders the value of `key` for display.
    ///
    /// A key matching a pattern always shows the placeholder. With nested
    /// redaction on, any other JSON-like value is shown structurally
    /// redacted and is still flagged when `redact_all_secrets` applies.
    /// Otherwise a sensitive value becomes the placeholder.
    #[must_use]
    pub fn render(&self, key: &str, value: &SecretValue) -> RenderedValue {
        let redacted = self.is_sensitive(key);

        if self.redact_nested_json && !self.matches_pattern(key) {
            if let Some(json) = parse_json_like(value.expose()) {
                return RenderedValue {
                    text: self.redact_structured(&json).to_string(),
                    redacted,
                };
            }
        }

        RenderedValue {
            text: self.redact_scalar(key, value.expose()).to_owned(),
            redacted,
        }
    }
}

/// Parses `text` if it looks like a JSON object or array.
///
/// Text that is wrapped in braces or brackets but does not parse is treated
/// as an opaque scalar.
#[must_use]
pub fn parse_json_like(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let wrapped = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if !wrapped {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
