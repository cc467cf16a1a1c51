//! Tests for [`KeyValueStore`] backends: read-your-write, insert-only
//! semantics, and duplicate-key rejection.

use std::sync::Arc;

use muninn::store::MemoryStore;
use muninn::{AnalysisKey, CacheEntry, Emotion, KeyValueStore, MuninnError, Payload, StorageError};

fn profile_payload(joy: f64) -> Payload {
    let rest = (1.0 - joy) / 14.0;
    let map: serde_json::Map<String, serde_json::Value> = Emotion::ALL
        .iter()
        .map(|e| {
            let v = if *e == Emotion::Joy { joy } else { rest };
            (e.as_str().to_string(), serde_json::json!(v))
        })
        .collect();
    Payload::Structured(serde_json::Value::Object(map))
}

async fn assert_contract(store: &dyn KeyValueStore) {
    let key = AnalysisKey::profile("track-1");
    assert!(store.get(&key).await.unwrap().is_none());

    let first = CacheEntry::new(key.clone(), profile_payload(0.3));
    store.put(&first).await.unwrap();

    let read = store.get(&key).await.unwrap().expect("entry should exist");
    assert_eq!(read.key, key);
    assert_eq!(read.payload, first.payload);

    // Second write for the same key is rejected and changes nothing.
    let second = CacheEntry::new(key.clone(), profile_payload(0.9));
    let err = store.put(&second).await.unwrap_err();
    assert!(err.is_key_conflict(), "expected KeyConflict, got {err:?}");
    assert!(matches!(
        err,
        MuninnError::Storage(StorageError::KeyConflict(ref k)) if *k == key
    ));
    let read = store.get(&key).await.unwrap().unwrap();
    assert_eq!(read.payload, first.payload);

    // Tags are keyed per emotion.
    let fear = AnalysisKey::tags("track-1", Emotion::Fear);
    let joy = AnalysisKey::tags("track-1", Emotion::Joy);
    store
        .put(&CacheEntry::new(fear.clone(), Payload::Text("<fear>x</fear>".into())))
        .await
        .unwrap();
    store
        .put(&CacheEntry::new(joy.clone(), Payload::Text("<joy>y</joy>".into())))
        .await
        .unwrap();
    assert_eq!(
        store.get(&fear).await.unwrap().unwrap().payload,
        Payload::Text("<fear>x</fear>".into())
    );
    assert_eq!(
        store.get(&joy).await.unwrap().unwrap().payload,
        Payload::Text("<joy>y</joy>".into())
    );
    let err = store
        .put(&CacheEntry::new(fear, Payload::Text("other".into())))
        .await
        .unwrap_err();
    assert!(err.is_key_conflict());

    // Profile and tags for the same track are distinct keys.
    assert!(store.get(&AnalysisKey::profile("track-2")).await.unwrap().is_none());
}

// =========================================================================
// MemoryStore
// =========================================================================

#[tokio::test]
async fn memory_store_honours_contract() {
    assert_contract(&MemoryStore::new()).await;
}

#[tokio::test]
async fn memory_store_delimiters_do_not_collide() {
    let store = MemoryStore::new();
    // both would flatten to "a_tags_joy"
    let a = AnalysisKey::profile("a_tags_joy");
    let b = AnalysisKey::tags("a", Emotion::Joy);
    store
        .put(&CacheEntry::new(a.clone(), profile_payload(0.5)))
        .await
        .unwrap();
    store
        .put(&CacheEntry::new(b.clone(), Payload::Text("b".into())))
        .await
        .unwrap();
    assert!(store.get(&a).await.unwrap().unwrap().payload.as_structured().is_some());
    assert_eq!(
        store.get(&b).await.unwrap().unwrap().payload,
        Payload::Text("b".into())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_store_concurrent_writers_single_winner() {
    let store = Arc::new(MemoryStore::new());
    let key = AnalysisKey::profile("race");

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            let key = key.clone();
            tokio::spawn(async move {
                store
                    .put(&CacheEntry::new(key, Payload::Text(i.to_string())))
                    .await
            })
        })
        .collect();

    let mut ok = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(e) if e.is_key_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 15);
}

// =========================================================================
// SqliteStore
// =========================================================================

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use muninn::store::SqliteStore;

    #[tokio::test]
    async fn sqlite_store_honours_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("muninn.db")).unwrap();
        assert_contract(&store).await;
    }

    #[tokio::test]
    async fn sqlite_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("muninn.db");
        let key = AnalysisKey::tags("track-9", Emotion::Hope);
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .put(&CacheEntry::new(key.clone(), Payload::Text("<hope>up</hope>".into())))
                .await
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let entry = store.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.payload, Payload::Text("<hope>up</hope>".into()));
    }

    #[tokio::test]
    async fn sqlite_schema_has_one_column_per_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("muninn.db");
        SqliteStore::open(&path).unwrap();

        let conn = rusqlite::Connection::open(&path).unwrap();
        let mut stmt = conn.prepare("PRAGMA table_info(profiles)").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert!(columns.contains(&"track_id".to_string()));
        for emotion in Emotion::ALL {
            assert!(
                columns.contains(&emotion.as_str().to_string()),
                "missing column {emotion}"
            );
        }

        let mut stmt = conn.prepare("PRAGMA table_info(tags)").unwrap();
        // (name, pk position)
        let pk: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)?)))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
            .into_iter()
            .filter(|(_, pk)| *pk > 0)
            .collect();
        assert_eq!(
            pk,
            vec![("track_id".to_string(), 1), ("emotion".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn sqlite_rejects_text_for_profile() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .put(&CacheEntry::new(
                AnalysisKey::profile("1"),
                Payload::Text("nope".into()),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, MuninnError::Validation(_)));
    }

    #[tokio::test]
    async fn sqlite_profiles_keep_only_label_columns() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = AnalysisKey::profile("chatty");
        let Payload::Structured(mut value) = profile_payload(0.3) else {
            unreachable!()
        };
        value["explanation"] = serde_json::json!("mostly joyful");
        store
            .put(&CacheEntry::new(key.clone(), Payload::Structured(value)))
            .await
            .unwrap();

        let read = store.get(&key).await.unwrap().unwrap();
        assert_eq!(read.payload, profile_payload(0.3));
    }
}

// =========================================================================
// RedisStore
// =========================================================================

/// Needs a running server: `REDIS_URL=redis://127.0.0.1/ cargo test
/// --test store_test --features redis -- --ignored`
#[cfg(feature = "redis")]
mod redis {
    use super::*;
    use muninn::store::RedisStore;

    /// Fresh key prefix per test so reruns against one server don't conflict.
    fn live_store(test: &str) -> RedisStore {
        let url = std::env::var("REDIS_URL")
            .expect("REDIS_URL environment variable must be set for live tests");
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        RedisStore::new(&url, Some(format!("muninn-test:{test}:{nanos}"))).unwrap()
    }

    #[tokio::test]
    #[ignore = "requires REDIS_URL"]
    async fn redis_store_honours_contract() {
        assert_contract(&live_store("contract")).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires REDIS_URL"]
    async fn redis_concurrent_writers_single_winner() {
        let store = live_store("race");
        let key = AnalysisKey::profile("race");

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    store
                        .put(&CacheEntry::new(key, Payload::Text(i.to_string())))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) => assert!(e.is_key_conflict(), "unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert!(store.get(&key).await.unwrap().is_some());
    }
}
