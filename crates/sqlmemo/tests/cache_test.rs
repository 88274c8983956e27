//! Integration tests for the cache facade over in-memory and file-backed
//! storage.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};
use sqlmemo::{
    Args, Cache, CacheConfig, CacheError, CacheStorage, ConfigOverrides, Items, JsonCodec,
    StorageError,
};
use tempfile::TempDir;

/// Runs `test` once against an in-memory cache and once against a file.
fn with_each_backend(config: CacheConfig, test: impl Fn(&Cache)) {
    let memory = Cache::new(config.clone().in_memory()).unwrap();
    test(&memory);

    let dir = TempDir::new().unwrap();
    let file = Cache::new(config.with_filepath(dir.path().join("cache"))).unwrap();
    test(&file);
}

fn check_set_get_clear_delete<K, V>(cache: &Cache, key: &K, value: &V)
where
    K: serde::Serialize,
    V: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    assert!(cache.get::<_, V>(key).unwrap_err().is_not_found());

    cache.set(key, value).unwrap();
    assert_eq!(&cache.get::<_, V>(key).unwrap(), value);

    // Overwriting with the same value is fine.
    cache.set(key, value).unwrap();
    assert_eq!(&cache.get::<_, V>(key).unwrap(), value);
    assert!(cache.contains(key).unwrap());
    assert!(!cache.contains(&-999).unwrap());

    cache.clear().unwrap();
    assert_eq!(cache.get_opt::<_, V>(key).unwrap(), None);

    cache.set(key, value).unwrap();
    assert_eq!(&cache.get::<_, V>(key).unwrap(), value);
    cache.delete(key).unwrap();
    assert_eq!(cache.get_opt::<_, V>(key).unwrap(), None);
    assert!(cache.delete(key).unwrap_err().is_not_found());
}

#[test]
fn test_set_get_contains_clear_delete() {
    with_each_backend(CacheConfig::new(), |cache| {
        check_set_get_clear_delete(cache, &1, &"one".to_string());
        check_set_get_clear_delete(cache, &1, &2);
        check_set_get_clear_delete(cache, &"1", &2);
        check_set_get_clear_delete(cache, &b"1".to_vec(), &b"one".to_vec());
        check_set_get_clear_delete(cache, &1, &0.1);
        check_set_get_clear_delete(cache, &0.1, &1);
        check_set_get_clear_delete(cache, &"a".repeat(999_999), &"b".repeat(999_999));
        check_set_get_clear_delete(
            cache,
            &json!([1, "a"]),
            &BTreeMap::from([("b".to_string(), "c".to_string())]),
        );
        check_set_get_clear_delete(
            cache,
            &BTreeMap::from([("b", "c")]),
            &BTreeSet::from([None, Some(1), Some(555)]),
        );
        check_set_get_clear_delete(cache, &BTreeSet::from(["b", "c"]), &(1, "z".to_string()));
    });
}

#[test]
fn test_duplicates() {
    with_each_backend(CacheConfig::new(), |cache| {
        assert!(!cache.contains(&1).unwrap());
        cache.set(&1, "one").unwrap();
        assert!(cache.contains(&1).unwrap());
        assert_eq!(cache.get::<_, String>(&1).unwrap(), "one");
        cache.set(&1, "1").unwrap();
        assert_eq!(cache.get::<_, String>(&1).unwrap(), "1");
        assert_eq!(cache.len().unwrap(), 1);
    });
}

fn stored_values(cache: &Cache) -> Vec<i64> {
    cache
        .items::<Value, i64>()
        .unwrap()
        .map(|item| item.unwrap().1)
        .collect()
}

#[test]
fn test_memoize_counts_calls_and_stores_in_order() {
    with_each_backend(CacheConfig::new(), |cache| {
        let calls = Cell::new(0);
        let pow = cache
            .memoize(|(a, b): (i64, u32)| {
                calls.set(calls.get() + 1);
                a.pow(b)
            })
            .with_name("tests.pow");

        assert_eq!(calls.get(), 0);

        assert_eq!(pow.call((2, 3)).unwrap(), 8);
        assert_eq!(calls.get(), 1);
        assert_eq!(stored_values(cache), vec![8]);

        assert_eq!(pow.call((2, 3)).unwrap(), 8);
        assert_eq!(calls.get(), 1);
        assert_eq!(stored_values(cache), vec![8]);

        assert_eq!(pow.call((2, 2)).unwrap(), 4);
        assert_eq!(calls.get(), 2);
        assert_eq!(stored_values(cache), vec![8, 4]);

        assert_eq!(pow.call((2, 2)).unwrap(), 4);
        assert_eq!(calls.get(), 2);
    });
}

#[test]
fn test_memoize_with_overrides() {
    with_each_backend(CacheConfig::new(), |cache| {
        let calls = Cell::new(0);
        let pow = cache
            .memoize_with(&ConfigOverrides::new().maxsize(-1).ttl(-1.0), |(a, b): (i64, u32)| {
                calls.set(calls.get() + 1);
                a.pow(b)
            })
            .unwrap()
            .with_name("tests.pow");

        assert_eq!(pow.call((2, 3)).unwrap(), 8);
        assert_eq!(pow.call((2, 3)).unwrap(), 8);
        assert_eq!(calls.get(), 1);
        assert_eq!(pow.cache().config().maxsize, -1);
        let values: Vec<i64> = pow
            .cache()
            .items::<Value, i64>()
            .unwrap()
            .map(|item| item.unwrap().1)
            .collect();
        assert_eq!(values, vec![8]);
    });
}

#[test]
fn test_copy() {
    with_each_backend(CacheConfig::new(), |cache| {
        let copy = cache.copy(&ConfigOverrides::new()).unwrap();
        assert_eq!(copy.config(), cache.config());

        let longer = cache
            .copy(&ConfigOverrides::new().ttl(cache.config().ttl + 1.0))
            .unwrap();
        assert_eq!(longer.config().ttl, cache.config().ttl + 1.0);
    });
}

#[test]
fn test_unbounded_copy_keeps_file_bound() {
    let dir = TempDir::new().unwrap();
    let cache = Cache::new(
        CacheConfig::new()
            .with_filepath(dir.path().join("cache"))
            .with_maxsize(2),
    )
    .unwrap();
    let unbounded = cache.copy(&ConfigOverrides::new().maxsize(-1)).unwrap();

    for n in 1..=4 {
        cache.set(&n, &n).unwrap();
    }
    assert_eq!(cache.len().unwrap(), 2);
    assert_eq!(unbounded.len().unwrap(), 2);
}

#[test]
fn test_raises_if_closed() {
    with_each_backend(CacheConfig::new(), |cache| {
        cache.close().unwrap();
        cache.close().unwrap();

        assert!(cache.set(&1, &1).unwrap_err().is_closed());
        assert!(cache.get::<_, i32>(&1).unwrap_err().is_closed());
        assert!(cache.get_opt::<_, i32>(&1).unwrap_err().is_closed());
        assert!(cache.get_or(&1, 0).unwrap_err().is_closed());
        assert!(cache.delete(&1).unwrap_err().is_closed());
        assert!(cache.contains(&1).unwrap_err().is_closed());
        assert!(cache.items::<i32, i32>().is_err());
    });
}

#[test]
fn test_remove() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache");
    let listing = || {
        std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>()
    };

    let cache = Cache::open(&path).unwrap();
    assert!(path.is_file());
    assert_eq!(listing(), vec!["cache"]);

    cache.set(&1, "one").unwrap();
    cache.set(&2, "two").unwrap();
    assert_eq!(listing(), vec!["cache"]);

    cache.remove().unwrap();
    assert!(!path.exists());
    assert!(listing().is_empty());

    // Reconstruction starts empty.
    let cache = Cache::open(&path).unwrap();
    assert!(cache.is_empty().unwrap());
}

#[test]
fn test_file_cache_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache");

    {
        let cache = Cache::open(&path).unwrap();
        cache.set("answer", &42).unwrap();
    }

    let cache = Cache::open(&path).unwrap();
    assert_eq!(cache.get::<_, i32>("answer").unwrap(), 42);
}

#[test]
fn test_typed_keys() {
    with_each_backend(CacheConfig::new().with_typed(true), |cache| {
        let calls = Cell::new(0);
        let echo = cache
            .memoize(|args: Args| {
                calls.set(calls.get() + 1);
                args.positional()[0].value.clone()
            })
            .with_name("tests.echo");

        let int = Args::new().arg(&1i64).unwrap();
        let float = Args::new().arg(&1.0f64).unwrap();

        assert_eq!(echo.call(int.clone()).unwrap(), json!(1));
        assert_eq!(calls.get(), 1);
        assert_eq!(echo.call(int.clone()).unwrap(), json!(1));
        assert_eq!(calls.get(), 1);

        let as_float = echo.call(float.clone()).unwrap();
        assert_eq!(calls.get(), 2);
        assert!(as_float.is_f64());
        assert!(echo.call(float).unwrap().is_f64());
        assert_eq!(calls.get(), 2);

        assert!(echo.call(int).unwrap().is_i64());
        assert_eq!(cache.len().unwrap(), 2);
    });
}

#[test]
fn test_untyped_keys_compare_by_value() {
    let cache = Cache::in_memory().unwrap();
    let calls = Cell::new(0);
    let echo = cache
        .memoize(|args: Args| {
            calls.set(calls.get() + 1);
            args.positional()[0].value.clone()
        })
        .with_name("tests.echo");

    assert!(echo.call(Args::new().arg(&1i64).unwrap()).unwrap().is_i64());
    assert!(echo.call(Args::new().arg(&1.0f64).unwrap()).unwrap().is_i64());
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_items() {
    with_each_backend(CacheConfig::new(), |cache| {
        assert_eq!(cache.items::<i32, String>().unwrap().count(), 0);

        cache.set(&1, "one").unwrap();
        let first = cache.items::<i32, String>().unwrap().next().unwrap().unwrap();
        assert_eq!(first, (1, "one".to_string()));

        cache.set(&2, "two").unwrap();
        let all: Vec<(i32, String)> = cache
            .items::<i32, String>()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(all, vec![(1, "one".to_string()), (2, "two".to_string())]);
    });
}

#[test]
fn test_ttl() {
    with_each_backend(CacheConfig::new().with_ttl(0.2), |cache| {
        cache.set("k", "v").unwrap();
        assert_eq!(cache.get::<_, String>("k").unwrap(), "v");

        thread::sleep(Duration::from_millis(300));
        assert!(cache.get::<_, String>("k").unwrap_err().is_not_found());
        assert!(!cache.contains("k").unwrap());
        assert_eq!(cache.items::<String, String>().unwrap().count(), 0);
    });
}

fn memo_keys(cache: &Cache) -> Vec<i64> {
    cache
        .items::<(String, i64), i64>()
        .unwrap()
        .map(|item| item.unwrap().0.1)
        .collect()
}

#[test]
fn test_fifo() {
    with_each_backend(CacheConfig::new().with_maxsize(2), |cache| {
        let func = cache.memoize(|(a,): (i64,)| a).with_name("tests.func");
        for n in 1..=3 {
            assert_eq!(func.call((n,)).unwrap(), n);
        }
        assert_eq!(memo_keys(cache), vec![2, 3]);

        func.call((4,)).unwrap();
        assert_eq!(memo_keys(cache), vec![3, 4]);
    });
}

#[test]
fn test_lru() {
    with_each_backend(
        CacheConfig::new().with_maxsize(2).with_policy("LRU"),
        |cache| {
            let func = cache.memoize(|(a,): (i64,)| a).with_name("tests.func");

            assert_eq!(func.call((1,)).unwrap(), 1);
            assert_eq!(func.call((2,)).unwrap(), 2);
            let keys = memo_keys(cache);
            assert_eq!(keys.len(), 2);
            assert!(keys.contains(&1) && keys.contains(&2));

            assert_eq!(func.call((1,)).unwrap(), 1);
            assert_eq!(func.call((3,)).unwrap(), 3);
            let keys = memo_keys(cache);
            assert_eq!(keys.len(), 2);
            assert!(keys.contains(&1) && keys.contains(&3));
            assert!(!keys.contains(&2));
        },
    );
}

#[test]
fn test_lfu() {
    with_each_backend(
        CacheConfig::new().with_maxsize(2).with_policy("LFU"),
        |cache| {
            let func = cache.memoize(|(a,): (i64,)| a).with_name("tests.func");

            assert_eq!(func.call((1,)).unwrap(), 1);
            assert_eq!(func.call((2,)).unwrap(), 2);
            let keys = memo_keys(cache);
            assert!(keys.contains(&1) && keys.contains(&2));

            for _ in 0..2 {
                assert_eq!(func.call((1,)).unwrap(), 1);
            }
            for _ in 0..2 {
                assert_eq!(func.call((2,)).unwrap(), 2);
            }
            assert_eq!(func.call((3,)).unwrap(), 3);

            let keys = memo_keys(cache);
            assert_eq!(keys.len(), 2);
            assert!(keys.contains(&1) && keys.contains(&2));
            assert!(!keys.contains(&3));
        },
    );
}

#[test]
fn test_only_on_errors() {
    #[derive(Debug)]
    enum CallError {
        ZeroDivision,
        Timeout,
    }

    let cache = Cache::in_memory().unwrap();
    let x = Cell::new(2i64);
    let n = Cell::new(0i64);
    let calls = Cell::new(0);
    let raised = Cell::new(false);

    let func = cache
        .memoize(|()| {
            calls.set(calls.get() + 1);
            if x.get() == 0 {
                raised.set(true);
                return Err(CallError::ZeroDivision);
            }
            n.set(n.get() + 1);
            x.set(x.get() - 1);
            Ok(n.get())
        })
        .with_name("tests.fn")
        .only_on_errors(|e: &CallError| {
            matches!(e, CallError::ZeroDivision | CallError::Timeout)
        });

    assert_eq!(func.call(()).unwrap(), 1);
    assert_eq!(calls.get(), 1);
    assert_eq!(func.call(()).unwrap(), 2);
    assert_eq!(calls.get(), 2);
    assert_eq!(x.get(), 0);

    assert_eq!(func.call(()).unwrap(), 2);
    assert_eq!(calls.get(), 3);
    assert!(raised.get());
    assert_eq!(func.call(()).unwrap(), 2);

    x.set(1);
    raised.set(false);
    assert_eq!(func.call(()).unwrap(), 3);
    assert_eq!(calls.get(), 5);
    assert_eq!(func.call(()).unwrap(), 3);
    assert!(raised.get());
    assert_eq!(calls.get(), 6);

    func.cache().clear().unwrap();
    let err = func.call(()).unwrap_err();
    assert!(matches!(
        err.into_call_error(),
        Some(CallError::ZeroDivision)
    ));
}

#[test]
fn test_unknown_policy() {
    let err = Cache::new(CacheConfig::new().with_policy("MRU")).unwrap_err();
    assert!(matches!(
        err,
        CacheError::Storage(StorageError::InvalidConfiguration(_))
    ));
}

/// Storage that rejects writes and returns undecodable bytes.
#[derive(Debug)]
struct CorruptStorage;

impl CacheStorage for CorruptStorage {
    fn set(&self, _key: &[u8], _value: &[u8]) -> sqlmemo_storage::Result<()> {
        Err(StorageError::InvalidConfiguration("read-only".into()))
    }

    fn get_opt(&self, _key: &[u8]) -> sqlmemo_storage::Result<Option<Vec<u8>>> {
        Ok(Some(vec![0xff, 0xfe]))
    }

    fn delete(&self, key: &[u8]) -> sqlmemo_storage::Result<()> {
        Err(StorageError::NotFound(sqlmemo_storage::KeyPreview::new(key)))
    }

    fn clear(&self) -> sqlmemo_storage::Result<()> {
        Ok(())
    }

    fn items(&self) -> sqlmemo_storage::Result<Items> {
        Ok(Items::from(vec![(b"not json".to_vec(), b"1".to_vec())]))
    }

    fn len(&self) -> sqlmemo_storage::Result<usize> {
        Ok(1)
    }

    fn close(&self) -> sqlmemo_storage::Result<()> {
        Ok(())
    }

    fn remove(&self) -> sqlmemo_storage::Result<()> {
        Ok(())
    }
}

#[test]
fn test_custom_storage_errors_propagate() {
    let cache = Cache::with_storage(CacheConfig::new(), JsonCodec, Box::new(CorruptStorage));

    assert!(matches!(
        cache.set(&1, &1).unwrap_err(),
        CacheError::Storage(StorageError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        cache.get::<_, i32>(&1).unwrap_err(),
        CacheError::Codec { .. }
    ));
    assert!(cache.contains(&1).unwrap());
    assert!(cache.delete(&1).unwrap_err().is_not_found());

    let mut items = cache.items::<String, i32>().unwrap();
    assert!(matches!(items.next(), Some(Err(CacheError::Codec { .. }))));
    assert!(items.next().is_none());

    let memo = cache.memoize(|(n,): (i32,)| n).with_name("tests.id");
    assert!(matches!(memo.call((1,)), Err(CacheError::Codec { .. })));
}
