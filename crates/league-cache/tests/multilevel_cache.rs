//! End-to-end behaviour of the multi-level cache.
//!
//! Cross-instance tests run several `MultiLevelCache` instances against one
//! shared `MemoryRemoteStore`, which plays the role of Redis.

use async_trait::async_trait;
use league_cache::cache::MessageStream;
use league_cache::error::RemoteResult;
use league_cache::{
    CacheConfig, CachedValue, MemoryRemoteStore, MultiLevelCache, RemoteConfig, RemoteStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Standing {
    club_id: u32,
    points: u32,
}

fn config(capacity: usize) -> CacheConfig {
    CacheConfig {
        local_capacity: capacity,
        ..CacheConfig::default()
    }
}

async fn shared_pair() -> (MultiLevelCache, MultiLevelCache, Arc<MemoryRemoteStore>) {
    let store = Arc::new(MemoryRemoteStore::new());
    let a = MultiLevelCache::new_remote(&config(100), store.clone()).await;
    let b = MultiLevelCache::new_remote(&config(100), store.clone()).await;
    (a, b, store)
}

/// Wait for an asynchronously delivered invalidation to take effect.
async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Remote store that never answers, like a half-open connection.
struct StalledStore;

#[async_trait]
impl RemoteStore for StalledStore {
    fn name(&self) -> &'static str {
        "stalled"
    }
    async fn get(&self, _key: &str) -> RemoteResult<Option<Vec<u8>>> {
        std::future::pending().await
    }
    async fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> RemoteResult<()> {
        std::future::pending().await
    }
    async fn del(&self, _key: &str) -> RemoteResult<()> {
        std::future::pending().await
    }
    async fn increment(&self, _key: &str) -> RemoteResult<i64> {
        std::future::pending().await
    }
    async fn set_if_absent(&self, _key: &str, _value: &str) -> RemoteResult<bool> {
        std::future::pending().await
    }
    async fn publish(&self, _channel: &str, _message: &str) -> RemoteResult<()> {
        std::future::pending().await
    }
    async fn subscribe(&self, _channel: &str) -> RemoteResult<MessageStream> {
        std::future::pending().await
    }
    async fn ping(&self) -> RemoteResult<()> {
        std::future::pending().await
    }
}

async fn must_not_load<T>() -> Result<T, String> {
    Err("loader must not be called".to_string())
}

#[tokio::test]
async fn test_set_then_get_skips_loader() {
    let cache = MultiLevelCache::new_local(&config(16));
    cache.set("k", &json!({"a": 1}), None).await.unwrap();

    let value: serde_json::Value = cache.get("k", must_not_load, None).await.unwrap();
    assert_eq!(value, json!({"a": 1}));
}

#[tokio::test]
async fn test_identical_writes_keep_version() {
    let cache = MultiLevelCache::new_local(&config(16));
    let v = json!([{"clubId": 1, "points": 10}]);

    assert_eq!(cache.set("k", &v, None).await.unwrap(), 1);
    assert_eq!(cache.set("k", &v, None).await.unwrap(), 1);

    // Same content, different field order
    let reordered = json!([{"points": 10, "clubId": 1}]);
    assert_eq!(cache.set("k", &reordered, None).await.unwrap(), 1);

    let meta: CachedValue<serde_json::Value> =
        cache.get_with_meta("k", must_not_load, None).await.unwrap();
    assert_eq!(meta.version, 1);

    let v2 = json!([{"clubId": 1, "points": 13}]);
    assert_eq!(cache.set("k", &v2, None).await.unwrap(), 2);
    let meta: CachedValue<serde_json::Value> =
        cache.get_with_meta("k", must_not_load, None).await.unwrap();
    assert_eq!(meta.version, 2);
}

#[tokio::test]
async fn test_identical_writes_keep_version_with_remote() {
    let (a, _b, store) = shared_pair().await;
    let v = json!({"x": 1});

    assert_eq!(a.set("k", &v, None).await.unwrap(), 1);
    assert_eq!(a.set("k", &v, None).await.unwrap(), 1);
    assert_eq!(a.set("k", &json!({"x": 2}), None).await.unwrap(), 2);
    assert_eq!(store.raw("__v:k"), Some(b"2".to_vec()));
}

#[tokio::test]
async fn test_invalidate_forces_reload() {
    let cache = MultiLevelCache::new_local(&config(16));
    cache.set("k", &1, None).await.unwrap();
    cache.invalidate("k").await;

    let calls = AtomicUsize::new(0);
    let value: i32 = cache
        .get(
            "k",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(2)
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(value, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalidate_removes_remote_value_and_version() {
    let (a, _b, store) = shared_pair().await;
    a.set("k", &1, None).await.unwrap();
    assert!(store.raw("k").is_some());
    assert!(store.raw("__v:k").is_some());

    a.invalidate("k").await;
    assert!(store.raw("k").is_none());
    assert!(store.raw("__v:k").is_none());
    assert_eq!(a.tracked_version("k"), None);
}

#[tokio::test]
async fn test_lru_bound() {
    let cache = MultiLevelCache::new_local(&config(2));
    cache.set("a", &1, None).await.unwrap();
    cache.set("b", &2, None).await.unwrap();
    cache.set("c", &3, None).await.unwrap();

    assert!(!cache.contains_local("a"));
    assert!(cache.contains_local("b"));
    assert!(cache.contains_local("c"));
}

#[tokio::test]
async fn test_cross_instance_invalidation() {
    let (a, b, _store) = shared_pair().await;

    a.set("k", &"v1", None).await.unwrap();

    let seen: String = b.get("k", must_not_load, None).await.unwrap();
    assert_eq!(seen, "v1");
    assert!(b.contains_local("k"));

    a.invalidate("k").await;
    assert!(wait_until(|| !b.contains_local("k")).await);

    let calls = AtomicUsize::new(0);
    let reloaded: String = b
        .get(
            "k",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("v2".to_string())
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(reloaded, "v2");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_set_evicts_peer_copy_but_not_own() {
    let (a, b, _store) = shared_pair().await;

    a.set("k", &1, None).await.unwrap();
    let _: i32 = b.get("k", must_not_load, None).await.unwrap();
    assert!(b.contains_local("k"));

    a.set("k", &2, None).await.unwrap();
    assert!(wait_until(|| !b.contains_local("k")).await);
    assert!(a.contains_local("k"));

    let fresh: CachedValue<i32> = b.get_with_meta("k", must_not_load, None).await.unwrap();
    assert_eq!(fresh, CachedValue { value: 2, version: 2 });
}

#[tokio::test]
async fn test_load_does_not_publish() {
    let (a, b, _store) = shared_pair().await;

    a.set("k", &1, None).await.unwrap();
    // Let B process the invalidation from the set before it reads
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _: i32 = b.get("k", must_not_load, None).await.unwrap();

    // A loads a different key; B's copy of "k" is untouched
    let _: i32 = a.get("other", || async { Ok::<_, String>(9) }, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(b.contains_local("k"));
}

#[tokio::test]
async fn test_end_to_end_season_table() {
    let (a, b, _store) = shared_pair().await;
    let key = "season:5:table";
    let calls = AtomicUsize::new(0);
    let loader = || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, String>(vec![Standing {
            club_id: 1,
            points: 10,
        }])
    };

    let first: CachedValue<Vec<Standing>> = a.get_with_meta(key, loader, None).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.version, 1);

    let second: CachedValue<Vec<Standing>> = a.get_with_meta(key, loader, None).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.version, 1);
    assert_eq!(second.value, first.value);

    // Peer reads the remote copy and the same version
    let peer: CachedValue<Vec<Standing>> = b.get_with_meta(key, must_not_load, None).await.unwrap();
    assert_eq!(peer.version, 1);

    let updated = vec![Standing {
        club_id: 1,
        points: 13,
    }];
    assert_eq!(a.set(key, &updated, None).await.unwrap(), 2);
    assert!(wait_until(|| !b.contains_local(key)).await);

    let peer: CachedValue<Vec<Standing>> = b.get_with_meta(key, must_not_load, None).await.unwrap();
    assert_eq!(peer.value, updated);
    assert_eq!(peer.version, 2);
}

#[tokio::test]
async fn test_remote_outage_degrades_to_loader() {
    let (a, b, store) = shared_pair().await;
    a.set("k", &1, None).await.unwrap();

    store.set_available(false);

    // B cannot reach the remote copy, so it loads
    let value: i32 = b.get("k", || async { Ok::<_, String>(7) }, None).await.unwrap();
    assert_eq!(value, 7);

    // A still serves its local copy, and writes keep working locally
    let value: i32 = a.get("k", must_not_load, None).await.unwrap();
    assert_eq!(value, 1);
    assert_eq!(a.set("k", &2, None).await.unwrap(), 2);
    a.invalidate("k").await;

    store.set_available(true);
    assert!(a.is_remote_available().await);
}

#[tokio::test]
async fn test_malformed_remote_value_is_a_miss() {
    let (a, _b, store) = shared_pair().await;
    store.put_raw("k", b"{not json".to_vec());

    let value: i32 = a.get("k", || async { Ok::<_, String>(3) }, None).await.unwrap();
    assert_eq!(value, 3);
    // The reload overwrote the garbage with a proper envelope
    let raw: serde_json::Value = serde_json::from_slice(&store.raw("k").unwrap()).unwrap();
    assert_eq!(raw["schemaVersion"], json!(1));
    assert_eq!(raw["value"], json!(3));
}

#[tokio::test]
async fn test_legacy_remote_value_is_wrapped() {
    let (a, _b, store) = shared_pair().await;
    store.put_raw("k", br#"[{"clubId":1,"points":10}]"#.to_vec());

    let value: Vec<Standing> = a.get("k", must_not_load, None).await.unwrap();
    assert_eq!(
        value,
        vec![Standing {
            club_id: 1,
            points: 10
        }]
    );
    assert!(a.contains_local("k"));

    // Writing the same content does not bump the version
    let version = a.set("k", &value, None).await.unwrap();
    assert_eq!(version, a.tracked_version("k").unwrap());
    assert_eq!(version, 0);
}

#[tokio::test]
async fn test_untagged_envelope_returns_inner_value() {
    let (a, _b, store) = shared_pair().await;
    store.put_raw("k", br#"{"value":[1,2],"fingerprint":"abc"}"#.to_vec());

    let value: serde_json::Value = a.get("k", must_not_load, None).await.unwrap();
    assert_eq!(value, json!([1, 2]));

    let typed: Vec<u32> = a.get("k", must_not_load, None).await.unwrap();
    assert_eq!(typed, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_remote_does_not_block_loader() {
    let config = CacheConfig {
        remote: RemoteConfig {
            enabled: true,
            timeout_ms: 100,
            ..RemoteConfig::default()
        },
        ..config(16)
    };
    let cache = MultiLevelCache::new_remote(&config, Arc::new(StalledStore)).await;

    let loaded = tokio::time::timeout(
        Duration::from_secs(2),
        cache.get("k", || async { Ok::<_, String>(1) }, None),
    )
    .await;
    assert_eq!(loaded, Ok(Ok(1)));
    assert!(cache.contains_local("k"));

    let version = tokio::time::timeout(Duration::from_secs(2), cache.set("k", &2, None)).await;
    assert!(matches!(version, Ok(Ok(_))));
}

#[tokio::test]
async fn test_ttl_expires_remote_value() {
    let (a, b, store) = shared_pair().await;
    a.set("k", &1, Some(Duration::from_millis(20))).await.unwrap();
    assert!(store.get("k").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(store.get("k").await.unwrap().is_none());

    // Local tier has no TTL; the writer still serves its copy
    let value: i32 = a.get("k", must_not_load, None).await.unwrap();
    assert_eq!(value, 1);

    let value: i32 = b.get("k", || async { Ok::<_, String>(5) }, None).await.unwrap();
    assert_eq!(value, 5);
}

#[tokio::test]
async fn test_default_ttl_from_config() {
    let store = Arc::new(MemoryRemoteStore::new());
    let cfg = CacheConfig {
        default_ttl_secs: Some(1),
        ..CacheConfig::default()
    };
    let cache = MultiLevelCache::new_remote(&cfg, store.clone()).await;
    cache.set("k", &1, None).await.unwrap();
    assert!(store.raw("k").is_some());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(store.raw("k").is_none());
}

#[tokio::test]
async fn test_concurrent_misses_each_load() {
    let cache = Arc::new(MultiLevelCache::new_local(&config(16)));
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(tokio::sync::Barrier::new(2));

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let cache = cache.clone();
        let calls = calls.clone();
        let gate = gate.clone();
        tasks.push(tokio::spawn(async move {
            cache
                .get(
                    "k",
                    || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.wait().await;
                        Ok::<_, String>(1)
                    },
                    None,
                )
                .await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 1);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // Both stored the same content: only one version bump
    assert_eq!(cache.tracked_version("k"), Some(1));
}
