//! Integration tests for trellis-cache

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use trellis_cache::*;
use trellis_config::ConfigManager;

async fn store() -> (tempfile::TempDir, Arc<FileCacheStore>) {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigManager::new();
    config.set("cache.PATH", dir.path().join("nested").display().to_string()).unwrap();
    let store = FileCacheStore::new(CacheConfig::from_config(&config)).await.unwrap();
    (dir, Arc::new(store))
}

#[tokio::test]
async fn test_typed_helpers() {
    let (_dir, store) = store().await;

    put(store.as_ref(), "user:1", &vec!["ada", "grace"], None).await.unwrap();
    let names: Option<Vec<String>> = get(store.as_ref(), "user:1").await.unwrap();
    assert_eq!(names, Some(vec!["ada".to_string(), "grace".to_string()]));

    let missing: Option<String> = get(store.as_ref(), "user:2").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_remember_computes_once() {
    let (_dir, store) = store().await;
    let counter = AtomicUsize::new(0);
    let calls = &counter;

    for _ in 0..3 {
        let value: u32 = remember(store.as_ref(), "answer", Some(60), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let forever: String = remember_forever(store.as_ref(), "motd", || async { Ok("hi".to_string()) })
        .await
        .unwrap();
    assert_eq!(forever, "hi");
}

#[tokio::test]
async fn test_concurrent_increments_are_not_lost() {
    let (_dir, store) = store().await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.increment("counter", 1).await.unwrap() })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let total: Option<i64> = get(store.as_ref(), "counter").await.unwrap();
    assert_eq!(total, Some(20));
}

#[tokio::test]
async fn test_store_is_usable_as_trait_object() {
    let (_dir, store) = store().await;
    let dynamic: Arc<dyn CacheStore> = store;

    dynamic.put_json("k", serde_json::json!(null), None).await.unwrap();
    assert!(!dynamic.has("k").await.unwrap());
    assert_eq!(dynamic.driver(), "file");
}
