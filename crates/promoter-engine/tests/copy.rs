//! Copy tests against in-memory stores.

use std::sync::Arc;

use promoter_engine::{
    copy, plan_copy, CopyOptions, Endpoint, ErrorKind, RedactionPolicy, PLACEHOLDER,
};
use promoter_secrets::{KeyValueDocument, Location, MemoryStore};

fn doc(pairs: &[(&str, &str)]) -> KeyValueDocument {
    pairs.iter().copied().collect()
}

fn vault_store(instance: &str) -> MemoryStore {
    MemoryStore::new().with_instance_id(instance)
}

fn side(env: &str, path: &str, store: &MemoryStore) -> Endpoint {
    Endpoint::new(
        Location::new(env, path).with_engine("secret"),
        Arc::new(store.clone()),
    )
}

fn flat_side(env: &str, path: &str, store: &MemoryStore) -> Endpoint {
    Endpoint::new(Location::new(env, path), Arc::new(store.clone()))
}

#[tokio::test]
async fn secrets_only_copies_real_values_and_logs_placeholders() {
    let dev = vault_store("vault-dev");
    let prod = vault_store("vault-prod");
    dev.insert("app", doc(&[("a", "1"), ("api_key", "2")])).await;

    let options = CopyOptions {
        copy_secrets_only: true,
        ..CopyOptions::default()
    };
    let outcome = copy(
        &side("dev", "app", &dev),
        &side("prod", "app", &prod),
        options,
        &RedactionPolicy::default(),
    )
    .await
    .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.keys.len(), 1);
    assert_eq!(outcome.keys["api_key"], PLACEHOLDER);

    let stored = prod.document("app").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.get("api_key").unwrap().expose(), "2");
}

#[tokio::test]
async fn existing_target_keys_keep_their_values() {
    let dev = vault_store("vault-dev");
    let prod = vault_store("vault-prod");
    dev.insert("app", doc(&[("shared", "from-dev"), ("new", "n")]))
        .await;
    prod.insert("app", doc(&[("shared", "from-prod"), ("only_prod", "p")]))
        .await;

    copy(
        &side("dev", "app", &dev),
        &side("prod", "app", &prod),
        CopyOptions::default(),
        &RedactionPolicy::default(),
    )
    .await
    .unwrap();

    let stored = prod.document("app").await.unwrap();
    assert_eq!(stored.get("shared").unwrap().expose(), "from-prod");
    assert_eq!(stored.get("only_prod").unwrap().expose(), "p");
    assert_eq!(stored.get("new").unwrap().expose(), "n");
    assert_eq!(prod.write_count(), 1);
}

#[tokio::test]
async fn overwrite_replaces_target_values() {
    let dev = vault_store("vault-dev");
    let prod = vault_store("vault-prod");
    dev.insert("app", doc(&[("shared", "from-dev")])).await;
    prod.insert("app", doc(&[("shared", "from-prod")])).await;

    copy(
        &side("dev", "app", &dev),
        &side("prod", "app", &prod),
        CopyOptions {
            overwrite: true,
            ..CopyOptions::default()
        },
        &RedactionPolicy::default(),
    )
    .await
    .unwrap();

    let stored = prod.document("app").await.unwrap();
    assert_eq!(stored.get("shared").unwrap().expose(), "from-dev");
}

#[tokio::test]
async fn nothing_qualifies_means_no_write() {
    let dev = vault_store("vault-dev");
    let prod = vault_store("vault-prod");
    dev.insert("app", doc(&[("a", "1")])).await;
    prod.insert("app", doc(&[("a", "old")])).await;

    let outcome = copy(
        &side("dev", "app", &dev),
        &side("prod", "app", &prod),
        CopyOptions::default(),
        &RedactionPolicy::default(),
    )
    .await
    .unwrap();

    assert!(outcome.success);
    assert!(outcome.keys.is_empty());
    assert_eq!(prod.write_count(), 0);
}

#[tokio::test]
async fn copy_onto_itself_is_refused() {
    let dev = vault_store("vault-dev");
    dev.insert("app", doc(&[("a", "1")])).await;

    let err = copy(
        &side("dev", "app", &dev),
        &side("dev", "app", &dev),
        CopyOptions::default(),
        &RedactionPolicy::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoOpCopy);
    assert_eq!(dev.write_count(), 0);
}

#[tokio::test]
async fn missing_source_is_not_found() {
    let err = copy(
        &side("dev", "app", &vault_store("vault-dev")),
        &side("prod", "app", &vault_store("vault-prod")),
        CopyOptions::default(),
        &RedactionPolicy::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn missing_target_engine_is_created() {
    let dev = vault_store("vault-dev");
    dev.insert("app", doc(&[("a", "1")])).await;
    let prod = MemoryStore::hierarchical("team-kv").without_engine();

    copy(
        &side("dev", "app", &dev),
        &Endpoint::new(
            Location::new("prod", "app").with_engine("team-kv"),
            Arc::new(prod.clone()),
        ),
        CopyOptions::default(),
        &RedactionPolicy::default(),
    )
    .await
    .unwrap();

    assert!(prod.engine_present());
    assert_eq!(prod.document("app").await.unwrap().get("a").unwrap().expose(), "1");
}

#[tokio::test]
async fn hierarchical_to_flat_store_copies_structured_document() {
    let vault = vault_store("vault-dev");
    let aws = MemoryStore::flat();
    vault.insert("app", doc(&[("user", "svc"), ("password", "p")])).await;

    copy(
        &side("dev", "app", &vault),
        &flat_side("prod", "app", &aws),
        CopyOptions::default(),
        &RedactionPolicy::default(),
    )
    .await
    .unwrap();

    let stored = aws.document("app").await.unwrap();
    assert!(stored.is_structured());
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn scalar_secret_cannot_enter_hierarchical_store() {
    let aws = MemoryStore::flat();
    let vault = vault_store("vault-dev");
    aws.insert("cert", KeyValueDocument::scalar("pem")).await;

    let err = copy(
        &flat_side("prod", "cert", &aws),
        &side("dev", "cert", &vault),
        CopyOptions::default(),
        &RedactionPolicy::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IncompatibleFormat);
    assert_eq!(vault.write_count(), 0);
}

#[tokio::test]
async fn scalar_secret_copies_between_flat_stores() {
    let east = MemoryStore::flat().with_instance_id("us-east-1");
    let west = MemoryStore::flat().with_instance_id("us-west-2");
    east.insert("cert", KeyValueDocument::scalar("pem")).await;

    copy(
        &flat_side("east", "cert", &east),
        &flat_side("west", "cert", &west),
        CopyOptions::default(),
        &RedactionPolicy::default(),
    )
    .await
    .unwrap();

    let stored = west.document("cert").await.unwrap();
    assert!(!stored.is_structured());
    assert_eq!(stored.scalar_value().unwrap().expose(), "pem");
}

#[tokio::test]
async fn dry_run_plan_writes_nothing() {
    let dev = vault_store("vault-dev");
    let prod = vault_store("vault-prod");
    dev.insert("app", doc(&[("a", "1"), ("token", "t")])).await;

    let plan = plan_copy(
        &side("dev", "app", &dev),
        &side("prod", "app", &prod),
        CopyOptions {
            copy_config_only: true,
            ..CopyOptions::default()
        },
        &RedactionPolicy::default(),
    )
    .await
    .unwrap();

    assert_eq!(plan.keys.keys().collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(plan.filtered_out, vec!["token".to_owned()]);
    assert!(!plan.target_existed);
    assert_eq!(prod.write_count(), 0);
    assert!(prod.document("app").await.is_none());
}

#[tokio::test]
async fn failed_write_is_reported_with_location() {
    let dev = vault_store("vault-dev");
    let prod = vault_store("vault-prod");
    dev.insert("app", doc(&[("a", "1")])).await;
    prod.fail_writes_to("app").await;

    let err = copy(
        &side("dev", "app", &dev),
        &side("prod", "app", &prod),
        CopyOptions::default(),
        &RedactionPolicy::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert!(err.to_string().contains("prod:secret/app"));
}
