//! # State Backend Integration Tests (sw-01)
//!
//! Exercises the real embedded engine through the public API.
//!
//! ## Test Categories
//!
//! 1. **Point maps** - get/put/delete, batches, snapshot iteration
//! 2. **Prefix multimaps** - grouping scan, insertion order, resumption
//! 3. **Released partitions** - uniform error policy
//! 4. **Lifecycle** - close semantics, concurrent jobs

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use sw_01_state_backend::{
    EngineProfile, JobStateScope, OrderKey, StateBackendConfig, StateBackendHandle, StateError,
    StateResult,
};
use tempfile::TempDir;

// =============================================================================
// TEST HELPERS
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn make_handle() -> (StateBackendHandle, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let handle =
        StateBackendHandle::initialize(StateBackendConfig::for_testing(), temp_dir.path()).unwrap();
    (handle, temp_dir)
}

fn collect_groups(
    map: &sw_01_state_backend::PrefixMultiMap<String, String>,
) -> Vec<(String, Vec<String>)> {
    let scan = map.scan().unwrap();
    let mut cursor = scan.cursor().unwrap();
    let mut groups = Vec::new();
    while cursor.advance().unwrap() {
        let key = cursor.key().unwrap().clone();
        let values = cursor.values().collect::<StateResult<Vec<_>>>().unwrap();
        groups.push((key, values));
    }
    cursor.close();
    groups
}

// =============================================================================
// 1. POINT MAPS
// =============================================================================

#[test]
fn test_put_get_delete() {
    let (handle, _temp) = make_handle();
    let map = handle.get_map::<String, u64>().unwrap();

    map.put(&"alpha".to_string(), &1).unwrap();
    assert_eq!(map.get(&"alpha".to_string()).unwrap(), Some(1));

    map.put(&"alpha".to_string(), &2).unwrap();
    assert_eq!(map.get(&"alpha".to_string()).unwrap(), Some(2));

    map.delete(&"alpha".to_string()).unwrap();
    assert_eq!(map.get(&"alpha".to_string()).unwrap(), None);
    assert_eq!(map.get(&"never".to_string()).unwrap(), None);
}

#[test]
fn test_put_all_and_get_all() {
    let (handle, _temp) = make_handle();
    let map = handle.get_map::<u32, String>().unwrap();

    let batch: HashMap<u32, String> = (0..100).map(|i| (i, format!("v{i}"))).collect();
    map.put_all(&batch).unwrap();

    assert_eq!(map.get_all().unwrap(), batch);
}

#[test]
fn test_iterator_is_snapshot_isolated() {
    let (handle, _temp) = make_handle();
    let map = handle.get_map::<u32, u32>().unwrap();
    map.put(&1, &10).unwrap();
    map.put(&2, &20).unwrap();

    let scan = map.scan().unwrap();
    let iter = scan.iter().unwrap();
    map.put(&3, &30).unwrap();
    map.put(&1, &99).unwrap();
    map.delete(&2).unwrap();

    let seen: Vec<(u32, u32)> = iter.map(Result::unwrap).collect();
    assert_eq!(seen, vec![(1, 10), (2, 20)]);

    let now: BTreeMap<u32, u32> = scan.iter().unwrap().map(Result::unwrap).collect();
    assert_eq!(now, BTreeMap::from([(1, 99), (3, 30)]));
}

#[test]
fn test_iter_after_resumes() {
    let (handle, _temp) = make_handle();
    let map = handle.get_map::<u8, u8>().unwrap();
    for i in 0..6u8 {
        map.put(&i, &i).unwrap();
    }

    let scan = map.scan().unwrap();
    let mut iter = scan.iter().unwrap();
    let first: Vec<u8> = iter.by_ref().take(2).map(|r| r.unwrap().0).collect();
    let position = iter.position().unwrap();
    drop(iter);

    let rest: Vec<u8> = scan
        .iter_after(&position)
        .unwrap()
        .map(|r| r.unwrap().0)
        .collect();
    assert_eq!(first, vec![0, 1]);
    assert_eq!(rest, vec![2, 3, 4, 5]);
}

// =============================================================================
// 2. PREFIX MULTIMAPS
// =============================================================================

#[test]
fn test_grouping_scenario() {
    let (handle, _temp) = make_handle();
    let mut map = handle.get_prefix_map::<String, String>().unwrap();

    assert!(map.add(&"k1".to_string(), &"a".to_string()).unwrap());
    assert!(map.add(&"k1".to_string(), &"b".to_string()).unwrap());
    assert!(map.add(&"k2".to_string(), &"c".to_string()).unwrap());
    map.compact().unwrap();

    assert_eq!(
        collect_groups(&map),
        vec![
            ("k1".to_string(), vec!["a".to_string(), "b".to_string()]),
            ("k2".to_string(), vec!["c".to_string()]),
        ]
    );
}

#[test]
fn test_interleaved_keys_keep_insertion_order() {
    let (handle, _temp) = make_handle();
    let mut map = handle.get_prefix_map::<String, String>().unwrap();

    for i in 0..50 {
        let key = format!("key-{}", i % 5);
        map.add(&key, &format!("{i}")).unwrap();
    }
    map.compact().unwrap();

    let groups = collect_groups(&map);
    assert_eq!(groups.len(), 5);
    for (key, values) in groups {
        let slot: usize = key.trim_start_matches("key-").parse().unwrap();
        let expected: Vec<String> = (0..50).filter(|i| i % 5 == slot).map(|i| format!("{i}")).collect();
        assert_eq!(values, expected);
    }
}

#[test]
fn test_spills_beyond_one_memtable() {
    let (handle, _temp) = make_handle();
    let mut map = handle.get_prefix_map::<u32, Vec<u8>>().unwrap();
    let payload = vec![7u8; 4096];

    // Several memtables' worth of data at the test buffer size.
    let mut accepted = 0u32;
    let mut i = 0u32;
    while accepted < 4000 {
        if map.add(&(i % 8), &payload).unwrap() {
            accepted += 1;
            i += 1;
        }
    }
    map.compact().unwrap();

    let scan = map.scan().unwrap();
    let mut cursor = scan.cursor().unwrap();
    let mut total = 0usize;
    let mut groups = 0usize;
    while cursor.advance().unwrap() {
        groups += 1;
        total += cursor.values().filter(|v| v.as_ref().is_ok_and(|v| v.len() == 4096)).count();
    }
    assert_eq!(groups, 8);
    assert_eq!(total, 4000);
}

#[test]
fn test_sorted_map_orders_signed_keys() {
    let (handle, _temp) = make_handle();
    let mut map = handle.get_sorted_map::<String>().unwrap();

    for key in [42i64, -7, 0, i64::MIN, 13, i64::MAX] {
        map.add(&OrderKey::new(key), &format!("item{key}")).unwrap();
    }
    map.compact().unwrap();

    let scan = map.scan().unwrap();
    let mut cursor = scan.cursor().unwrap();
    let mut keys = Vec::new();
    while cursor.advance().unwrap() {
        keys.push(cursor.key().unwrap().value());
    }
    assert_eq!(keys, vec![i64::MIN, -7, 0, 13, 42, i64::MAX]);
}

#[test]
fn test_point_lookup_profile_supports_prefix_maps() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let config = StateBackendConfig::for_testing()
        .with_profile(EngineProfile::PointLookup)
        .with_wal(true);
    let handle = StateBackendHandle::initialize(config, temp_dir.path()).unwrap();

    let mut groups = handle.get_prefix_map::<String, String>().unwrap();
    for (key, value) in [("k1", "a"), ("k2", "x"), ("k1", "b")] {
        assert!(groups.add(&key.to_string(), &value.to_string()).unwrap());
    }
    groups.compact().unwrap();
    assert_eq!(
        collect_groups(&groups),
        vec![
            ("k1".to_string(), vec!["a".to_string(), "b".to_string()]),
            ("k2".to_string(), vec!["x".to_string()]),
        ]
    );

    let mut sorted = handle.get_sorted_map::<u32>().unwrap();
    sorted.add(&OrderKey::new(5), &5).unwrap();
    sorted.add(&OrderKey::new(-5), &1).unwrap();
    sorted.compact().unwrap();
    let scan = sorted.scan().unwrap();
    let mut cursor = scan.cursor().unwrap();
    assert!(cursor.advance().unwrap());
    assert_eq!(cursor.key().unwrap().value(), -5);

    let points = handle.get_map::<u32, u32>().unwrap();
    points.put(&1, &2).unwrap();
    assert_eq!(points.get(&1).unwrap(), Some(2));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_cursor_yields_values_per_key_in_insertion_order(
        entries in prop::collection::vec((0u8..12, any::<u32>()), 0..200)
    ) {
        let (handle, _temp) = make_handle();
        let mut map = handle.get_prefix_map::<u8, u32>().unwrap();

        let mut expected: BTreeMap<u8, Vec<u32>> = BTreeMap::new();
        for (key, value) in &entries {
            prop_assert!(map.add(key, value).unwrap());
            expected.entry(*key).or_default().push(*value);
        }
        map.compact().unwrap();

        let mut actual: BTreeMap<u8, Vec<u32>> = BTreeMap::new();
        let scan = map.scan().unwrap();
        let mut cursor = scan.cursor().unwrap();
        while cursor.advance().unwrap() {
            let key = *cursor.key().unwrap();
            let values = cursor.values().collect::<StateResult<Vec<_>>>().unwrap();
            prop_assert!(actual.insert(key, values).is_none(), "group {} seen twice", key);
        }
        prop_assert_eq!(actual, expected);
    }
}

// =============================================================================
// 3. RELEASED PARTITIONS
// =============================================================================

#[test]
fn test_released_point_map_rejects_every_operation() {
    let (handle, _temp) = make_handle();
    let map = handle.get_map::<u32, u32>().unwrap();
    map.put(&1, &1).unwrap();

    handle.release(&map).unwrap();
    handle.release(&map).unwrap();

    assert!(matches!(map.get(&1), Err(StateError::PartitionReleased { .. })));
    assert!(matches!(map.put(&1, &2), Err(StateError::PartitionReleased { .. })));
    assert!(matches!(map.delete(&1), Err(StateError::PartitionReleased { .. })));
    assert!(matches!(map.scan(), Err(StateError::PartitionReleased { .. })));
    assert!(matches!(
        map.put_all([(&1, &1)]),
        Err(StateError::PartitionReleased { .. })
    ));
}

#[test]
fn test_released_prefix_map_rejects_every_operation() {
    let (handle, _temp) = make_handle();
    let mut map = handle.get_prefix_map::<u32, u32>().unwrap();
    map.add(&1, &1).unwrap();
    map.compact().unwrap();

    handle.release(&map).unwrap();

    assert!(matches!(map.add(&1, &2), Err(StateError::PartitionReleased { .. })));
    assert!(matches!(map.scan(), Err(StateError::PartitionReleased { .. })));
    assert!(handle.live_partitions().is_empty());
}

#[test]
fn test_maps_after_close_are_released() {
    let (handle, _temp) = make_handle();
    let map = handle.get_map::<u32, u32>().unwrap();
    map.put(&1, &1).unwrap();

    handle.close().unwrap();

    let err = map.get(&1).unwrap_err();
    assert!(err.is_io());
    assert!(matches!(err, StateError::PartitionReleased { .. }));
}

// =============================================================================
// 4. LIFECYCLE
// =============================================================================

#[test]
fn test_close_shuts_engine_down_while_maps_are_alive() {
    let (handle, _temp) = make_handle();
    let dir = handle.directory().to_path_buf();

    let points = handle.get_map::<u32, u32>().unwrap();
    points.put(&1, &1).unwrap();
    let mut groups = handle.get_prefix_map::<u32, u32>().unwrap();
    groups.add(&1, &1).unwrap();
    groups.compact().unwrap();

    handle.close().unwrap();
    assert!(!dir.exists());

    assert!(matches!(points.get(&1), Err(StateError::PartitionReleased { .. })));
    assert!(matches!(points.scan(), Err(StateError::PartitionReleased { .. })));
    assert!(matches!(groups.add(&2, &2), Err(StateError::PartitionReleased { .. })));
    assert!(matches!(groups.scan(), Err(StateError::PartitionReleased { .. })));
    assert!(handle.live_partitions().is_empty());

    drop(points);
    drop(groups);
    assert!(!dir.exists());
}

#[test]
fn test_close_during_scan_defers_engine_shutdown() {
    let (handle, _temp) = make_handle();
    let dir = handle.directory().to_path_buf();
    let points = handle.get_map::<u32, u32>().unwrap();
    points.put(&1, &1).unwrap();

    let scan = points.scan().unwrap();
    handle.close().unwrap();
    assert!(dir.exists());
    assert!(matches!(points.get(&1), Err(StateError::PartitionReleased { .. })));
    assert!(matches!(scan.iter(), Err(StateError::PartitionReleased { .. })));

    drop(scan);
    assert!(!dir.exists());
    assert!(matches!(points.get(&1), Err(StateError::PartitionReleased { .. })));
}

#[test]
fn test_concurrent_jobs_use_independent_handles() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let first = JobStateScope::open(StateBackendConfig::for_testing(), temp_dir.path()).unwrap();
    let second = JobStateScope::open(StateBackendConfig::for_testing(), temp_dir.path()).unwrap();

    assert_ne!(first.handle().directory(), second.handle().directory());

    let a = first.handle().get_map::<u32, u32>().unwrap();
    let b = second.handle().get_map::<u32, u32>().unwrap();
    a.put(&1, &100).unwrap();
    assert_eq!(b.get(&1).unwrap(), None);

    drop(a);
    first.finish().unwrap();
    b.put(&2, &2).unwrap();
    assert_eq!(b.get(&2).unwrap(), Some(2));
    drop(b);
    second.finish().unwrap();
}

#[test]
fn test_shared_handle_across_threads() {
    let (handle, _temp) = make_handle();
    let handle = Arc::new(handle);

    let names: Vec<String> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..8u32)
            .map(|i| {
                let handle = Arc::clone(&handle);
                s.spawn(move || {
                    let map = handle.get_map::<u32, u32>().unwrap();
                    map.put(&i, &i).unwrap();
                    assert_eq!(map.get(&i).unwrap(), Some(i));
                    map.name().to_string()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 8);
    assert_eq!(handle.metrics().live_partitions(), 0);
}
