//! Cache-aside orchestrator tests

mod common;

use bson::oid::ObjectId;
use chrono::{Duration as ChronoDuration, Utc};
use common::counting_client;
use persistence_core::cache::{CacheAside, JsonGetOptions, JsonSetOptions, KeyExpiry};
use persistence_core::config::ConfigurationError;
use persistence_core::{CacheError, PersistenceError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct Profile {
    #[serde(rename = "_id")]
    id: ObjectId,
    username: String,
    #[serde(rename = "createdAt")]
    created_at: bson::DateTime,
    logins: u32,
}

#[derive(Debug, Deserialize, PartialEq)]
struct CachedProfile {
    #[serde(rename = "_id")]
    id: String,
    username: String,
    #[serde(rename = "createdAt")]
    created_at: String,
    logins: u32,
}

#[tokio::test]
async fn disabled_cache_is_a_pass_through() {
    let (client, store) = counting_client(false).await;
    let cache = CacheAside::new(client);
    let calls = AtomicUsize::new(0);

    let value: u64 = cache
        .json_get(
            "stats:total",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, PersistenceError>(42u64)
            },
            JsonGetOptions::new().expire(Duration::from_secs(60)),
        )
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!cache.json_set("stats:total", &1, JsonSetOptions::new()).await.unwrap());
    assert!(!cache
        .set_key_expiry("stats:total", KeyExpiry::after(Duration::from_secs(5)))
        .await
        .unwrap());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn supplying_both_expiry_forms_is_rejected() {
    let (client, store) = counting_client(true).await;
    let cache = CacheAside::new(client);
    let at = Utc::now() + ChronoDuration::minutes(5);

    let error = cache
        .json_set(
            "k",
            &json!({ "a": 1 }),
            JsonSetOptions::new().expire(Duration::from_secs(60)).expire_at(at),
        )
        .await
        .unwrap_err();
    assert_eq!(error.configuration(), Some(&ConfigurationError::InvalidExpireParameter));

    let calls = AtomicUsize::new(0);
    let error = cache
        .json_get::<Value, _, _, _, _>(
            "k",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, PersistenceError>(json!(1))
            },
            JsonGetOptions::new().expire(Duration::from_secs(60)).expire_at(at),
        )
        .await
        .unwrap_err();
    assert_eq!(error.configuration(), Some(&ConfigurationError::InvalidExpireParameter));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let both = KeyExpiry {
        expire: Some(Duration::from_secs(1)),
        expire_at: Some(at),
    };
    assert!(cache.set_key_expiry("k", both).await.is_err());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn conditional_writes() {
    let (client, _store) = counting_client(true).await;
    let cache = CacheAside::new(client);

    assert!(!cache
        .json_set("lock", &json!({ "owner": "a" }), JsonSetOptions::new().if_present())
        .await
        .unwrap());
    assert!(cache
        .json_set("lock", &json!({ "owner": "a" }), JsonSetOptions::new().if_absent())
        .await
        .unwrap());
    assert!(!cache
        .json_set("lock", &json!({ "owner": "b" }), JsonSetOptions::new().if_absent())
        .await
        .unwrap());
    assert!(cache
        .json_set("lock", &json!("c"), JsonSetOptions::new().path("$.owner").if_present())
        .await
        .unwrap());

    let owner: String = cache
        .json_get(
            "lock",
            || async { Ok::<_, PersistenceError>("fallback".to_string()) },
            JsonGetOptions::new().path("$.owner"),
        )
        .await
        .unwrap();
    assert_eq!(owner, "c");
}

#[tokio::test]
async fn write_applies_requested_ttl() {
    let (client, store) = counting_client(true).await;
    let cache = CacheAside::new(client);

    assert!(cache
        .json_set("session", &json!({ "id": 1 }), JsonSetOptions::new().expire(Duration::from_secs(30)))
        .await
        .unwrap());
    let ttl = store.inner.ttl("session").unwrap();
    assert!(ttl <= Duration::from_secs(30) && ttl > Duration::from_secs(25));

    let at = Utc::now() + ChronoDuration::hours(1);
    assert!(cache
        .json_set("report", &json!([1, 2]), JsonSetOptions::new().expire_at(at))
        .await
        .unwrap());
    assert!(store.inner.ttl("report").unwrap() > Duration::from_secs(3_500));
}

#[tokio::test]
async fn oversized_ttl_keeps_the_entry() {
    let (client, store) = counting_client(true).await;
    let cache = CacheAside::new(client);

    assert!(cache
        .json_set("forever", &json!({ "id": 1 }), JsonSetOptions::new().expire(Duration::MAX))
        .await
        .unwrap());
    assert_eq!(store.inner.ttl("forever"), None);

    let value: Value = cache
        .json_get(
            "forever",
            || async { Ok::<_, PersistenceError>(json!(null)) },
            JsonGetOptions::new().expire(Duration::MAX),
        )
        .await
        .unwrap();
    assert_eq!(value, json!({ "id": 1 }));
}

#[tokio::test]
async fn identifiers_and_dates_round_trip_as_strings() {
    let (client, _store) = counting_client(true).await;
    let cache = CacheAside::new(client);
    let id = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
    let created = bson::DateTime::from_millis(1_705_055_400_250);

    let profile = Profile {
        id,
        username: "ada".to_string(),
        created_at: created,
        logins: 3,
    };
    assert!(cache.json_set("profile:ada", &profile, JsonSetOptions::new()).await.unwrap());

    let cached: CachedProfile = cache
        .json_get(
            "profile:ada",
            || async { Err::<Value, _>(PersistenceError::Backend("unreachable".to_string())) },
            JsonGetOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        cached,
        CachedProfile {
            id: "65a1b2c3d4e5f60718293a4b".to_string(),
            username: "ada".to_string(),
            created_at: "2024-01-12T10:30:00.250Z".to_string(),
            logins: 3,
        }
    );
}

#[tokio::test]
async fn miss_runs_fallback_once_and_writes_back() {
    let (client, store) = counting_client(true).await;
    let cache = CacheAside::new(client);
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
        let profile: CachedProfile = cache
            .json_get(
                "profile:grace",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, PersistenceError>(Profile {
                        id: ObjectId::new(),
                        username: "grace".to_string(),
                        created_at: bson::DateTime::now(),
                        logins: 1,
                    })
                },
                JsonGetOptions::new().expire(Duration::from_secs(120)),
            )
            .await
            .unwrap();
        assert_eq!(profile.username, "grace");
        assert_eq!(profile.id.len(), 24);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.inner.ttl("profile:grace").is_some());
}

#[tokio::test]
async fn miss_without_write_back_leaves_store_untouched() {
    let (client, store) = counting_client(true).await;
    let cache = CacheAside::new(client);

    let value: Value = cache
        .json_get(
            "volatile",
            || async { Ok::<_, PersistenceError>(json!({ "n": 1 })) },
            JsonGetOptions::new().set_if_not_found(false),
        )
        .await
        .unwrap();
    assert_eq!(value, json!({ "n": 1 }));
    assert_eq!(store.sets.load(Ordering::SeqCst), 0);
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn hit_extends_freshness() {
    let (client, store) = counting_client(true).await;
    let cache = CacheAside::new(client);

    cache
        .json_set("feed", &json!(["a"]), JsonSetOptions::new())
        .await
        .unwrap();
    assert_eq!(store.inner.ttl("feed"), None);

    let feed: Vec<String> = cache
        .json_get(
            "feed",
            || async { Ok::<_, PersistenceError>(Vec::<String>::new()) },
            JsonGetOptions::new().expire(Duration::from_secs(90)),
        )
        .await
        .unwrap();
    assert_eq!(feed, vec!["a"]);
    assert!(store.inner.ttl("feed").is_some());
}

#[tokio::test]
async fn fallback_errors_propagate() {
    let (client, store) = counting_client(true).await;
    let cache = CacheAside::new(client);
    let calls = AtomicUsize::new(0);

    let error = cache
        .json_get::<Value, Value, _, _, _>(
            "broken",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PersistenceError::Timeout("operation exceeded time limit".to_string()))
            },
            JsonGetOptions::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(error, PersistenceError::Timeout(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn store_failures_degrade_to_pass_through() {
    let (client, store) = counting_client(true).await;
    let cache = CacheAside::new(client);
    store.fail_reads.store(true, Ordering::SeqCst);
    store.fail_writes.store(true, Ordering::SeqCst);

    let value: u32 = cache
        .json_get(
            "counter",
            || async { Ok::<_, CacheError>(7u32) },
            JsonGetOptions::new().expire(Duration::from_secs(10)),
        )
        .await
        .unwrap();
    assert_eq!(value, 7);

    assert!(!cache.json_set("counter", &8, JsonSetOptions::new()).await.unwrap());
    assert!(!cache
        .set_key_expiry("counter", KeyExpiry::after(Duration::from_secs(10)))
        .await
        .unwrap());
}

#[tokio::test]
async fn key_expiry_requires_existing_key() {
    let (client, store) = counting_client(true).await;
    let cache = CacheAside::new(client);

    assert!(!cache
        .set_key_expiry("missing", KeyExpiry::after(Duration::from_secs(10)))
        .await
        .unwrap());
    assert!(!cache.set_key_expiry("missing", KeyExpiry::default()).await.unwrap());

    cache.json_set("present", &json!(1), JsonSetOptions::new()).await.unwrap();
    let at = Utc::now() + ChronoDuration::minutes(10);
    assert!(cache.set_key_expiry("present", KeyExpiry::at(at)).await.unwrap());
    assert!(store.inner.ttl("present").unwrap() > Duration::from_secs(500));
}

#[tokio::test]
async fn mismatched_cached_value_falls_back() {
    let (client, _store) = counting_client(true).await;
    let cache = CacheAside::new(client);
    cache
        .json_set("shape", &json!({ "unexpected": true }), JsonSetOptions::new())
        .await
        .unwrap();

    let value: Vec<u32> = cache
        .json_get(
            "shape",
            || async { Ok::<_, PersistenceError>(vec![1u32, 2]) },
            JsonGetOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(value, vec![1, 2]);
}
