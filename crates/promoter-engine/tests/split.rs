//! Split tests against in-memory stores.

use std::collections::BTreeSet;
use std::sync::Arc;

use promoter_engine::{plan_split, split, Endpoint, ErrorKind, RedactionPolicy};
use promoter_secrets::{KeyValueDocument, Location, MemoryStore};
use rstest::rstest;

fn doc(pairs: &[(&str, &str)]) -> KeyValueDocument {
    pairs.iter().copied().collect()
}

fn side(path: &str, store: &MemoryStore) -> Endpoint {
    Endpoint::new(
        Location::new("dev", path).with_engine("secret"),
        Arc::new(store.clone()),
    )
}

fn tokens() -> RedactionPolicy {
    RedactionPolicy::new(["token"], true, false)
}

#[tokio::test]
async fn moves_sensitive_keys_into_new_document() {
    let store = MemoryStore::new();
    store.insert("app", doc(&[("user", "bob"), ("token", "t1")])).await;

    let outcome = split(&side("app", &store), &side("app-secrets", &store), &tokens())
        .await
        .unwrap();

    assert_eq!(outcome.moved_keys, vec!["token".to_owned()]);
    assert_eq!(outcome.retained_keys, vec!["user".to_owned()]);

    let target = store.document("app-secrets").await.unwrap();
    assert_eq!(target, doc(&[("token", "t1")]));
    let source = store.document("app").await.unwrap();
    assert_eq!(source, doc(&[("user", "bob")]));
    assert_eq!(store.write_count(), 2);
}

#[tokio::test]
async fn every_key_ends_up_on_exactly_one_side() {
    let store = MemoryStore::new();
    let original = doc(&[
        ("db_host", "h"),
        ("db_password", "p"),
        ("API_KEY", "k"),
        ("region", "eu"),
        ("session_token", "s"),
    ]);
    store.insert("app", original.clone()).await;

    split(
        &side("app", &store),
        &side("app-secrets", &store),
        &RedactionPolicy::new(["password", "key", "token"], true, false),
    )
    .await
    .unwrap();

    let source = store.document("app").await.unwrap();
    let target = store.document("app-secrets").await.unwrap();
    let source_keys: BTreeSet<&str> = source.keys().collect();
    let target_keys: BTreeSet<&str> = target.keys().collect();

    assert!(source_keys.is_disjoint(&target_keys));
    let union: BTreeSet<&str> = source_keys.union(&target_keys).copied().collect();
    assert_eq!(union, original.keys().collect::<BTreeSet<_>>());
    assert_eq!(target_keys, BTreeSet::from(["API_KEY", "db_password", "session_token"]));

    for (key, value) in original.iter() {
        let moved = target.get(key).or_else(|| source.get(key)).unwrap();
        assert_eq!(moved, value);
    }
}

#[tokio::test]
async fn existing_target_is_refused_without_writes() {
    let store = MemoryStore::new();
    store.insert("app", doc(&[("token", "t1")])).await;
    store.insert("app-secrets", doc(&[("other", "x")])).await;

    let err = split(&side("app", &store), &side("app-secrets", &store), &tokens())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TargetAlreadyExists);
    assert_eq!(store.write_count(), 0);
    assert_eq!(
        store.document("app").await.unwrap(),
        doc(&[("token", "t1")])
    );
}

#[rstest]
#[case::nothing_matches(doc(&[("user", "bob")]), tokens(), ErrorKind::NoSensitiveKeysMatched)]
#[case::no_patterns(
    doc(&[("token", "t")]),
    RedactionPolicy::new(Vec::<String>::new(), true, false),
    ErrorKind::NoSensitiveKeysConfigured
)]
#[case::empty_source(KeyValueDocument::new(), tokens(), ErrorKind::EmptySource)]
#[tokio::test]
async fn preconditions_are_checked_before_writing(
    #[case] source: KeyValueDocument,
    #[case] policy: RedactionPolicy,
    #[case] expected: ErrorKind,
) {
    let store = MemoryStore::new();
    store.insert("app", source).await;

    let err = split(&side("app", &store), &side("app-secrets", &store), &policy)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), expected);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn missing_source_is_not_found() {
    let store = MemoryStore::new();
    let err = split(&side("app", &store), &side("app-secrets", &store), &tokens())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn scalar_source_cannot_be_split() {
    let store = MemoryStore::flat();
    store.insert("cert", KeyValueDocument::scalar("pem")).await;

    let err = split(
        &Endpoint::new(Location::new("prod", "cert"), Arc::new(store.clone())),
        &Endpoint::new(Location::new("prod", "cert-secrets"), Arc::new(store.clone())),
        &tokens(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleFormat);
}

#[tokio::test]
async fn failed_source_update_is_a_partial_failure() {
    let store = MemoryStore::new();
    store.insert("app", doc(&[("user", "bob"), ("token", "t1")])).await;
    store.fail_writes_to("app").await;

    let err = split(&side("app", &store), &side("app-secrets", &store), &tokens())
        .await
        .unwrap_err();

    assert!(err.is_partial_failure());
    assert_eq!(err.kind(), ErrorKind::PartialFailure);
    assert!(err.to_string().contains("dev:secret/app-secrets"));
    assert!(!err.to_string().contains("t1"));

    // Target holds the moved key; source still holds everything.
    assert_eq!(
        store.document("app-secrets").await.unwrap(),
        doc(&[("token", "t1")])
    );
    assert_eq!(store.document("app").await.unwrap().len(), 2);
}

#[tokio::test]
async fn split_into_another_environment_creates_engine() {
    let dev = MemoryStore::new();
    dev.insert("app", doc(&[("user", "bob"), ("token", "t1")])).await;
    let vault = MemoryStore::hierarchical("secure").without_engine();

    split(
        &side("app", &dev),
        &Endpoint::new(
            Location::new("secure", "app").with_engine("secure"),
            Arc::new(vault.clone()),
        ),
        &tokens(),
    )
    .await
    .unwrap();

    assert!(vault.engine_present());
    assert_eq!(vault.document("app").await.unwrap(), doc(&[("token", "t1")]));
}

#[tokio::test]
async fn plan_reports_partition_without_writing() {
    let store = MemoryStore::new();
    store
        .insert("app", doc(&[("user", "bob"), ("token", "t1"), ("refresh_token", "r")]))
        .await;

    let plan = plan_split(&side("app", &store), &side("app-secrets", &store), &tokens())
        .await
        .unwrap();

    assert_eq!(plan.moved_keys(), vec!["refresh_token", "token"]);
    assert_eq!(plan.retained_keys(), vec!["user"]);
    assert_eq!(store.write_count(), 0);
}
