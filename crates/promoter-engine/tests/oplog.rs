//! Operation log and configuration file tests.

use std::io::Write;
use std::sync::Arc;

use promoter_engine::{
    copy, split, CopyOptions, Endpoint, OperationLog, OperationRecord, PromoterConfig,
    RedactionPolicy,
};
use promoter_secrets::{KeyValueDocument, Location, MemoryStore};

fn doc(pairs: &[(&str, &str)]) -> KeyValueDocument {
    pairs.iter().copied().collect()
}

#[tokio::test]
async fn records_are_appended_one_per_line_without_values() {
    let dir = tempfile::tempdir().unwrap();
    let log = OperationLog::new(dir.path().join("promoter.log"));

    let dev = MemoryStore::new().with_instance_id("dev");
    let prod = MemoryStore::new().with_instance_id("prod");
    dev.insert("app", doc(&[("host", "db.internal"), ("password", "hunter2")]))
        .await;
    let source = Endpoint::new(
        Location::new("dev", "app").with_engine("secret"),
        Arc::new(dev.clone()),
    );
    let target = Endpoint::new(
        Location::new("prod", "app").with_engine("secret"),
        Arc::new(prod.clone()),
    );

    let outcome = copy(&source, &target, CopyOptions::default(), &RedactionPolicy::default())
        .await
        .unwrap();
    log.append(&OperationRecord::copied(&source, &target, &outcome))
        .await
        .unwrap();

    let split_target = Endpoint::new(
        Location::new("dev", "app-secrets").with_engine("secret"),
        Arc::new(dev.clone()),
    );
    let outcome = split(&source, &split_target, &RedactionPolicy::default())
        .await
        .unwrap();
    log.append(&OperationRecord::split(&source, &split_target, &outcome))
        .await
        .unwrap();

    let content = tokio::fs::read_to_string(log.path()).await.unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(!content.contains("hunter2"));
    assert!(!content.contains("db.internal"));

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["operation"], "copy");
    assert_eq!(first["success"], true);
    assert_eq!(first["keys"]["password"], "(redacted)");

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["operation"], "split");
    assert_eq!(second["split_keys"], serde_json::json!(["password"]));
}

#[test]
fn loads_toml_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
redacted_keys = ["token"]

[environments.dev]
store = "vault"
url = "http://127.0.0.1:8200"
token_env = "VAULT_TOKEN"

[environments.prod]
store = "awssecretsmanager"
region = "eu-west-1"
"#
    )
    .unwrap();

    let config = PromoterConfig::load_from(file.path()).unwrap();
    assert_eq!(config.environments.len(), 2);
    assert_eq!(config.redaction_policy().patterns(), ["token".to_owned()]);
}

#[test]
fn loads_json_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{"environments": {{"local": {{"store": "memory"}}}}, "redact_json_values": true}}"#
    )
    .unwrap();

    let config = PromoterConfig::load_from(file.path()).unwrap();
    assert!(config.redact_json_values);
    assert!(config.redaction_policy().redact_nested_json());
}
