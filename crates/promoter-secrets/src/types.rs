//! Core types shared by every store adapter.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Redacted;

/// Key under which a flat store exposes a secret that is a bare string
/// rather than a JSON object.
pub const SCALAR_KEY: &str = "value";

/// Concrete backend behind an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// HashiCorp Vault, KV version 2 engine.
    #[default]
    #[serde(rename = "vault")]
    Vault,

    /// AWS Secrets Manager.
    #[serde(rename = "awssecretsmanager", alias = "secretsmanager")]
    SecretsManager,

    /// Process-local store used by tests and dry runs.
    #[serde(rename = "memory")]
    Memory,
}

impl BackendKind {
    /// Returns the configuration name of this backend.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::SecretsManager => "awssecretsmanager",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage model of a backend.
///
/// Hierarchical stores keep documents inside named engines (mounts) and
/// only hold key-value maps. Flat stores address documents by name alone
/// and may hold a bare string instead of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreFamily {
    /// Versioned KV store with engines, e.g. Vault.
    Hierarchical,
    /// Managed secret store without engines, e.g. AWS Secrets Manager.
    Flat,
}

/// Identifies exactly one document in one backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Environment name from the configuration.
    pub environment: String,

    /// Document path within the backend.
    pub path: String,

    /// Engine (mount) name; only meaningful for hierarchical stores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

impl Location {
    /// Creates a location without an engine.
    #[must_use]
    pub fn new(environment: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            path: path.into(),
            engine: None,
        }
    }

    /// Sets the engine for this location.
    #[must_use]
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Returns the engine name, if any.
    #[must_use]
    pub fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.engine {
            Some(engine) => write!(f, "{}:{}/{}", self.environment, engine, self.path),
            None => write!(f, "{}:{}", self.environment, self.path),
        }
    }
}

/// A secret value with automatic memory zeroisation.
///
/// The value is stored as a `SecretString` which prevents accidental logging
/// and ensures memory is zeroed when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretValue {
    #[zeroize(skip)]
    inner: SecretString,
}

impl SecretValue {
    /// Creates a new secret value from a string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: SecretString::from(value.into()),
        }
    }

    /// Exposes the secret value for use.
    ///
    /// The returned reference must not be logged or stored.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }

    /// Returns the length of the secret value in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Returns true if the secret value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.expose_secret().is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for SecretValue {
    /// Constant-time comparison to prevent timing attacks.
    fn eq(&self, other: &Self) -> bool {
        let self_bytes = self.inner.expose_secret().as_bytes();
        let other_bytes = other.inner.expose_secret().as_bytes();

        if self_bytes.len() != other_bytes.len() {
            return false;
        }

        self_bytes.ct_eq(other_bytes).into()
    }
}

impl Eq for SecretValue {}

impl From<&str> for SecretValue {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A key-value document as read from or written to a store.
///
/// Values are kept in their string form; embedded JSON stays serialised.
/// Members that were numbers, booleans, null, objects or arrays in the
/// store are remembered as *JSON members* and written back with their
/// original type. Keys are ordered, which makes every iteration over a document
/// deterministic.
///
/// A document fetched from a flat store may be a single opaque string. Such
/// a document is *unstructured*: it has exactly one entry under
/// [`SCALAR_KEY`] and [`is_structured`](Self::is_structured) returns false.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyValueDocument {
    entries: BTreeMap<String, SecretValue>,
    json_members: BTreeSet<String>,
    structured: bool,
}

impl Default for KeyValueDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueDocument {
    /// Creates an empty structured document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            json_members: BTreeSet::new(),
            structured: true,
        }
    }

    /// Creates an unstructured document holding a single opaque string.
    #[must_use]
    pub fn scalar(value: impl Into<SecretValue>) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(SCALAR_KEY.to_owned(), value.into());
        Self {
            entries,
            json_members: BTreeSet::new(),
            structured: false,
        }
    }

    /// Parses a JSON object into a structured document.
    ///
    /// String members are kept verbatim; every other member is rendered as
    /// compact JSON text and marked as a JSON member. Returns `None` if
    /// `value` is not an object.
    #[must_use]
    pub fn from_json_object(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut document = Self::new();
        for (key, member) in object {
            match member {
                serde_json::Value::String(text) => {
                    document.insert(key.clone(), text.as_str());
                }
                other => {
                    document.insert_json(key.clone(), other.to_string());
                }
            }
        }
        Some(document)
    }

    /// Serialises the document as a JSON object.
    ///
    /// JSON members keep their original type; every other value is a string.
    #[must_use]
    pub fn to_json_object(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(k, v)| {
                let text = || serde_json::Value::String(v.expose().to_owned());
                let member = if self.json_members.contains(k) {
                    serde_json::from_str(v.expose()).unwrap_or_else(|_| text())
                } else {
                    text()
                };
                (k.clone(), member)
            })
            .collect();
        serde_json::Value::Object(map)
    }

    /// Returns true unless this document is a single opaque string.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        self.structured
    }

    /// Returns the opaque string of an unstructured document.
    #[must_use]
    pub fn scalar_value(&self) -> Option<&SecretValue> {
        if self.structured {
            return None;
        }
        self.entries.get(SCALAR_KEY)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SecretValue> {
        self.entries.get(key)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces a string value, returning the previous one.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SecretValue>,
    ) -> Option<SecretValue> {
        let key = key.into();
        self.json_members.remove(&key);
        self.entries.insert(key, value.into())
    }

    /// Inserts or replaces a JSON member whose value is serialised JSON text.
    pub fn insert_json(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SecretValue>,
    ) -> Option<SecretValue> {
        let key = key.into();
        self.json_members.insert(key.clone());
        self.entries.insert(key, value.into())
    }

    /// Inserts `key` with the value and member type it has in `other`.
    ///
    /// Does nothing if `other` lacks the key.
    pub fn insert_from(&mut self, other: &Self, key: &str) {
        if let Some(value) = other.get(key) {
            if other.is_json(key) {
                self.insert_json(key, value.clone());
            } else {
                self.insert(key, value.clone());
            }
        }
    }

    /// Returns true if `key` holds a non-string JSON member.
    #[must_use]
    pub fn is_json(&self, key: &str) -> bool {
        self.json_members.contains(key)
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<SecretValue> {
        self.json_members.remove(key);
        self.entries.remove(key)
    }

    /// Iterates over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the document has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for KeyValueDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueDocument")
            .field("structured", &self.structured)
            .field(
                "entries",
                &self
                    .entries
                    .keys()
                    .map(|k| (k.as_str(), Redacted::new(())))
                    .collect::<BTreeMap<_, _>>(),
            )
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for KeyValueDocument
where
    K: Into<String>,
    V: Into<SecretValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            json_members: BTreeSet::new(),
            structured: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display_includes_engine() {
        let loc = Location::new("dev", "app/config").with_engine("secret");
        assert_eq!(loc.to_string(), "dev:secret/app/config");
        assert_eq!(Location::new("prod", "app").to_string(), "prod:app");
    }

    #[test]
    fn backend_kind_round_trips_config_names() {
        let kind: BackendKind = serde_json::from_str("\"awssecretsmanager\"").unwrap();
        assert_eq!(kind, BackendKind::SecretsManager);
        assert_eq!(kind.to_string(), "awssecretsmanager");
        assert_eq!(BackendKind::default(), BackendKind::Vault);
    }

    #[test]
    fn secret_value_redacted_debug() {
        let value = SecretValue::new("super-secret");
        let debug = format!("{value:?}");
        assert_eq!(debug, "[REDACTED]");
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn secret_value_uses_constant_time_comparison() {
        let value1 = SecretValue::new("correct_password_12345");
        let value2 = SecretValue::new("correct_password_12345");
        assert_eq!(value1, value2);

        let value3 = SecretValue::new("wrong_password__12345");
        assert_ne!(value1, value3);

        let value4 = SecretValue::new("short");
        assert_ne!(value1, value4);

        assert_eq!(SecretValue::new(""), SecretValue::new(""));
    }

    #[test]
    fn document_debug_shows_keys_only() {
        let doc: KeyValueDocument = [("db_password", "hunter2"), ("db_host", "db.internal")]
            .into_iter()
            .collect();
        let debug = format!("{doc:?}");
        assert!(debug.contains("db_password"));
        assert!(debug.contains("db_host"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("db.internal"));
    }

    #[test]
    fn document_from_json_object_renders_non_strings() {
        let json = serde_json::json!({
            "host": "db",
            "port": 5432,
            "tls": true,
            "nested": {"a": 1}
        });
        let doc = KeyValueDocument::from_json_object(&json).unwrap();

        assert!(doc.is_structured());
        assert_eq!(doc.get("host").unwrap().expose(), "db");
        assert_eq!(doc.get("port").unwrap().expose(), "5432");
        assert_eq!(doc.get("tls").unwrap().expose(), "true");
        assert_eq!(doc.get("nested").unwrap().expose(), r#"{"a":1}"#);
    }

    #[test]
    fn document_writes_members_back_with_their_original_type() {
        let json = serde_json::json!({
            "user": "bob",
            "port": 5432,
            "enabled": true,
            "cfg": {"a": 1},
            "hosts": ["a", "b"],
            "unset": null,
            "quoted": "5432"
        });
        let doc = KeyValueDocument::from_json_object(&json).unwrap();

        assert!(doc.is_json("port"));
        assert!(!doc.is_json("quoted"));
        assert_eq!(doc.to_json_object(), json);
    }

    #[test]
    fn string_insert_clears_json_member_type() {
        let mut doc = KeyValueDocument::from_json_object(&serde_json::json!({"port": 1})).unwrap();
        doc.insert("port", "2");
        assert_eq!(doc.to_json_object(), serde_json::json!({"port": "2"}));

        let mut copy = KeyValueDocument::new();
        let source = KeyValueDocument::from_json_object(&serde_json::json!({"n": 7})).unwrap();
        copy.insert_from(&source, "n");
        copy.insert_from(&source, "missing");
        assert_eq!(copy.to_json_object(), serde_json::json!({"n": 7}));
    }

    #[test]
    fn document_from_json_rejects_non_objects() {
        assert!(KeyValueDocument::from_json_object(&serde_json::json!("x")).is_none());
        assert!(KeyValueDocument::from_json_object(&serde_json::json!([1])).is_none());
    }

    #[test]
    fn scalar_document_exposes_single_value() {
        let doc = KeyValueDocument::scalar("opaque");
        assert!(!doc.is_structured());
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.scalar_value().unwrap().expose(), "opaque");
        assert_eq!(doc.get(SCALAR_KEY).unwrap().expose(), "opaque");

        let structured: KeyValueDocument = [(SCALAR_KEY, "x")].into_iter().collect();
        assert!(structured.scalar_value().is_none());
    }

    #[test]
    fn document_iterates_in_key_order() {
        let doc: KeyValueDocument = [("b", "2"), ("a", "1"), ("c", "3")].into_iter().collect();
        let keys: Vec<_> = doc.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
