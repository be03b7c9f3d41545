//! Integration Tests for NetworkCache
//!
//! Exercises the public cache API across threads, tasks and the sweeper.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::init_tracing;
use parking_lot::Mutex;
use resilient_net::{CacheConfig, CacheError, CancellationToken, NetworkCache};
use tokio_test::{assert_err, assert_ok};

// == Helper Functions ==

fn create_test_cache(capacity: usize) -> NetworkCache {
    init_tracing();
    NetworkCache::new(CacheConfig::with_capacity(capacity)).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    id: u32,
    name: String,
}

// == Basic Operation Tests ==

#[test]
fn test_stores_structured_values() {
    let cache = create_test_cache(10);
    let profile = Profile {
        id: 7,
        name: "ada".to_string(),
    };

    assert_ok!(cache.set("profile:7", profile.clone()));
    assert_ok!(cache.set("tags", vec!["a".to_string(), "b".to_string()]));

    assert_eq!(cache.try_get::<Profile>("profile:7").unwrap(), Some(profile));
    assert_eq!(
        cache.try_get::<Vec<String>>("tags").unwrap(),
        Some(vec!["a".to_string(), "b".to_string()])
    );
}

#[test]
fn test_overwrite_resets_value_and_ttl() {
    let cache = create_test_cache(10);
    cache
        .set_with_ttl("k", 1u32, Duration::from_millis(30))
        .unwrap();
    cache
        .set_with_ttl("k", 2u32, Duration::from_secs(60))
        .unwrap();

    thread::sleep(Duration::from_millis(60));

    assert_eq!(cache.try_get::<u32>("k").unwrap(), Some(2));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_lru_eviction_order_with_reads() {
    let cache = create_test_cache(3);
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = evicted.clone();
    cache
        .on_removed(move |key| sink.lock().push(key.to_string()))
        .unwrap();

    cache.set("a", 1).unwrap();
    cache.set("b", 2).unwrap();
    cache.set("c", 3).unwrap();
    cache.try_get::<i32>("a").unwrap();
    cache.set("d", 4).unwrap();
    cache.set("e", 5).unwrap();

    assert_eq!(*evicted.lock(), vec!["b".to_string(), "c".to_string()]);
    assert!(cache.contains_key("a").unwrap());
    assert!(cache.contains_key("e").unwrap());
    assert_eq!(cache.stats().unwrap().total_entries, 3);
}

#[test]
fn test_update_expiration_on_missing_key() {
    let cache = create_test_cache(10);
    assert!(!cache.update_expiration("ghost", Duration::from_secs(1)).unwrap());
}

// == Listener Tests ==

#[test]
fn test_panicking_listener_does_not_break_cache() {
    let cache = create_test_cache(10);
    let count = Arc::new(AtomicUsize::new(0));

    cache.on_added(|_| panic!("listener bug")).unwrap();
    let c = count.clone();
    cache
        .on_added(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert_ok!(cache.set("k", 1));
    assert_ok!(cache.set("j", 2));

    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(cache.try_get::<i32>("k").unwrap(), Some(1));
}

#[test]
fn test_listener_may_read_cache() {
    let cache = Arc::new(create_test_cache(10));
    let observed = Arc::new(Mutex::new(None));

    let inner = Arc::downgrade(&cache);
    let sink = observed.clone();
    cache
        .on_added(move |key| {
            if let Some(cache) = inner.upgrade() {
                *sink.lock() = cache.try_get::<i32>(key).ok().flatten();
            }
        })
        .unwrap();

    cache.set("k", 41).unwrap();
    assert_eq!(*observed.lock(), Some(41));
}

#[test]
fn test_unsubscribe_all() {
    let cache = create_test_cache(10);
    let count = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let c = count.clone();
        cache
            .on_removed(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    cache.unsubscribe_all().unwrap();
    cache.set("k", 1).unwrap();
    cache.remove("k").unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

// == Concurrency Tests ==

#[test]
fn test_concurrent_writers_and_readers() {
    let cache = Arc::new(create_test_cache(64));
    let mut handles = Vec::new();

    for t in 0..8usize {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..500usize {
                let key = format!("k{}", (t * 31 + i) % 128);
                if i % 3 == 0 {
                    let _ = cache.remove(&key);
                } else if i % 2 == 0 {
                    let _ = cache.try_get::<usize>(&key);
                } else {
                    let _ = cache.set(key, i);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.stats().unwrap();
    assert!(stats.total_entries <= 64 + 8);
    for i in 0..128 {
        if let Some(value) = cache.try_get::<usize>(&format!("k{i}")).unwrap() {
            assert!(value < 500);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_async_access() {
    let cache = Arc::new(create_test_cache(100));
    let token = CancellationToken::new();
    let mut tasks = Vec::new();

    for t in 0..10u32 {
        let cache = Arc::clone(&cache);
        let token = token.clone();
        tasks.push(tokio::spawn(async move {
            let key = format!("task:{t}");
            cache
                .set_async(key.clone(), t, Duration::from_secs(60), &token)
                .await
                .unwrap();
            cache.try_get_async::<u32>(&key, &token).await.unwrap()
        }));
    }

    for (t, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), Some(t as u32));
    }
    assert_eq!(cache.len(), 10);
}

// == Sweep Tests ==

#[tokio::test]
async fn test_background_sweep_fires_expired() {
    init_tracing();
    let config = CacheConfig {
        sweep_interval: Duration::from_millis(50),
        ..CacheConfig::with_capacity(10)
    };
    let cache = NetworkCache::new(config).unwrap();
    let expired = Arc::new(Mutex::new(Vec::new()));
    let sink = expired.clone();
    cache
        .on_expired(move |key| sink.lock().push(key.to_string()))
        .unwrap();

    cache
        .set_with_ttl("short", "v", Duration::from_millis(20))
        .unwrap();
    cache.set("long", "v").unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(*expired.lock(), vec!["short".to_string()]);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_sweep_all_expired_cancellation() {
    let cache = create_test_cache(500);
    for i in 0..300 {
        cache
            .set_with_ttl(format!("k{i}"), i, Duration::from_millis(5))
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    let token = CancellationToken::new();
    token.cancel();
    assert_err!(cache.sweep_all_expired(50, &token).await);

    let live = CancellationToken::new();
    assert_eq!(cache.sweep_all_expired(50, &live).await.unwrap(), 300);
}

// == Disposal Tests ==

#[tokio::test]
async fn test_dispose_rejects_everything() {
    let cache = create_test_cache(10);
    let token = CancellationToken::new();
    cache.set("k", 1).unwrap();

    cache.dispose();

    assert!(matches!(cache.try_get::<i32>("k"), Err(CacheError::Disposed)));
    assert!(matches!(cache.remove("k"), Err(CacheError::Disposed)));
    assert!(matches!(cache.clear(), Err(CacheError::Disposed)));
    assert!(matches!(cache.sweep_expired(10), Err(CacheError::Disposed)));
    assert!(matches!(cache.pause_sweep(), Err(CacheError::Disposed)));
    assert!(matches!(
        cache.resume_sweep(Duration::from_secs(1)),
        Err(CacheError::Disposed)
    ));
    assert!(matches!(
        cache.set_async("k", 1, Duration::from_secs(1), &token).await,
        Err(CacheError::Disposed)
    ));
    assert!(matches!(
        cache.sweep_all_expired(10, &token).await,
        Err(CacheError::Disposed)
    ));
    assert!(cache.is_empty());
}
