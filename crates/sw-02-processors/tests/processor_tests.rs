//! # Processor Integration Tests (sw-02)
//!
//! Drives processors through suppliers and the cooperative driver against a
//! real state backend.
//!
//! ## Test Categories
//!
//! 1. **Grouping** - co-grouping over two inputs, every backend
//! 2. **Two-stage aggregation** - equivalence with single-stage
//! 3. **Sorting** - ascending runs, resumption
//! 4. **Host contract** - backpressure retries

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use sw_01_state_backend::{JobStateScope, StateBackendConfig};
use sw_02_processors::*;
use tempfile::TempDir;

// =============================================================================
// TEST HELPERS
// =============================================================================

const ALL_BACKENDS: [StateBackendKind; 3] = [
    StateBackendKind::InMemory,
    StateBackendKind::Persisted,
    StateBackendKind::PersistedUnbounded,
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn make_scope() -> (JobStateScope, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let scope = JobStateScope::open(StateBackendConfig::for_testing(), temp_dir.path()).unwrap();
    (scope, temp_dir)
}

fn context(scope: &JobStateScope, name: &str, index: usize) -> ProcessorContext {
    ProcessorContext::new(scope.handle(), name, index)
}

fn word_key() -> KeyFn<(String, i64), String> {
    Arc::new(|item: &(String, i64)| item.0.clone())
}

/// Single-stage sum over all items.
fn single_stage_sums(
    scope: &JobStateScope,
    kind: StateBackendKind,
    partitions: &[Vec<(String, i64)>],
) -> BTreeMap<String, i64> {
    let supplier = grouping_processor(
        kind,
        vec![word_key()],
        summing(|item: &(String, i64)| item.1),
        |k: String, v: i64| (k, v),
    );
    let processor = supplier.get(&context(scope, "aggregate", 0)).unwrap();
    let items = partitions.iter().flatten().cloned().map(|item| (0, item));
    run_to_completion(processor, 4, items).unwrap().into_iter().collect()
}

/// Local accumulate per partition, then one global combine.
fn two_stage_sums(
    scope: &JobStateScope,
    kind: StateBackendKind,
    partitions: &[Vec<(String, i64)>],
) -> BTreeMap<String, i64> {
    let op = summing(|item: &(String, i64)| item.1);
    let local = accumulate_processor(kind, vec![word_key()], op.clone());
    let global = combine_processor(kind, op, |k: String, v: i64| (k, v)).unwrap();

    let mut partials = Vec::new();
    for (index, partition) in partitions.iter().enumerate() {
        let processor = local.get(&context(scope, "aggregate-prepare", index)).unwrap();
        let items = partition.iter().cloned().map(|item| (0, item));
        partials.extend(run_to_completion(processor, 3, items).unwrap());
    }

    let processor = global.get(&context(scope, "aggregate", 0)).unwrap();
    let output = run_to_completion(processor, 2, partials.into_iter().map(|p| (0, p))).unwrap();

    let mut sums = BTreeMap::new();
    for (key, sum) in output {
        assert!(sums.insert(key, sum).is_none(), "key emitted twice");
    }
    sums
}

// =============================================================================
// 1. GROUPING
// =============================================================================

#[test]
fn test_co_grouping_two_inputs() {
    let (scope, _temp) = make_scope();

    // Ordinal 0 carries orders, ordinal 1 carries refunds.
    let op = AggregateOperation::<(String, i64), (i64, i64), _>::builder(|| (0, 0))
        .and_accumulate(|acc, item| acc.0 += item.1)
        .and_accumulate(|acc, item| acc.1 += item.1)
        .and_finish(|acc| acc.0 - acc.1)
        .unwrap();
    assert!(!op.has_combine());

    for kind in ALL_BACKENDS {
        let supplier = grouping_processor(
            kind,
            vec![word_key(), word_key()],
            op.clone(),
            |k: String, net: i64| format!("{k}:{net}"),
        );
        let processor = supplier.get(&context(&scope, "2-way co-aggregate", 0)).unwrap();

        let items = vec![
            (0, ("alice".to_string(), 100)),
            (1, ("alice".to_string(), 30)),
            (0, ("bob".to_string(), 5)),
            (0, ("alice".to_string(), 10)),
            (1, ("carol".to_string(), 7)),
        ];
        let mut output = run_to_completion(processor, 1, items).unwrap();
        output.sort();

        assert_eq!(
            output,
            vec!["alice:80".to_string(), "bob:5".to_string(), "carol:-7".to_string()],
            "backend {kind:?}"
        );
    }

    assert!(scope.handle().live_partitions().is_empty());
    scope.finish().unwrap();
}

#[test]
fn test_unbounded_grouping_keeps_insertion_order() {
    let (scope, _temp) = make_scope();
    let ctx = context(&scope, "group", 0);

    let by_residue: KeyFn<u32, u32> = Arc::new(|n: &u32| n % 4);
    let map_output: OutputFn<u32, Vec<u32>, (u32, Vec<u32>)> = Arc::new(|k, values| (k, values));
    let mut processor =
        GroupingProcessor::unbounded(&ctx, vec![by_residue], to_list::<u32>(), map_output).unwrap();
    for n in 0..40u32 {
        assert!(processor.try_process(0, &n).unwrap());
    }

    let mut outbox = BoundedOutbox::new(1);
    let mut groups = BTreeMap::new();
    while !processor.complete(&mut outbox).unwrap() {
        groups.extend(outbox.drain());
    }
    groups.extend(outbox.drain());

    assert_eq!(groups.len(), 4);
    for (key, values) in groups {
        let expected: Vec<u32> = (0..40).filter(|n| n % 4 == key).collect();
        assert_eq!(values, expected);
    }
}

// =============================================================================
// 2. TWO-STAGE AGGREGATION
// =============================================================================

#[test]
fn test_two_local_counts_combine_to_seven() {
    let (scope, _temp) = make_scope();
    let op = counting::<String>();
    let plan = plan_aggregation(&op, 1, true);
    assert!(plan.is_two_stage());

    let key_fns: Vec<KeyFn<String, String>> = vec![Arc::new(|s: &String| s.clone())];
    let local = accumulate_processor(plan.backend(), key_fns, op.clone());
    let global = combine_processor(plan.backend(), op, |k: String, n: u64| (k, n)).unwrap();

    let mut partials = Vec::new();
    for (index, count) in [3, 4].into_iter().enumerate() {
        let processor = local.get(&context(&scope, "aggregate-prepare", index)).unwrap();
        let items = std::iter::repeat((0, "x".to_string())).take(count);
        partials.extend(run_to_completion(processor, 8, items).unwrap());
    }
    assert_eq!(partials, vec![("x".to_string(), 3), ("x".to_string(), 4)]);

    let processor = global.get(&context(&scope, "aggregate", 0)).unwrap();
    let output = run_to_completion(processor, 8, partials.into_iter().map(|p| (0, p))).unwrap();
    assert_eq!(output, vec![("x".to_string(), 7)]);
}

#[test]
fn test_combine_supplier_requires_combine_fn() {
    let op = AggregateOperation::<u8, u8, _>::builder(|| 0)
        .and_accumulate(|acc, item| *acc = (*acc).max(*item))
        .and_finish(|acc| *acc)
        .unwrap();

    let plan = plan_aggregation(&op, 1, false);
    assert!(!plan.is_two_stage());
    assert!(matches!(
        combine_processor(StateBackendKind::InMemory, op, |k: u8, v: u8| (k, v)),
        Err(ProcessorError::MissingCombine)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_two_stage_matches_single_stage(
        partitions in prop::collection::vec(
            prop::collection::vec(("[a-e]", -100i64..100), 0..25),
            1..4,
        ),
        backend in prop::sample::select(ALL_BACKENDS.to_vec()),
    ) {
        let (scope, _temp) = make_scope();
        let single = single_stage_sums(&scope, backend, &partitions);
        let two = two_stage_sums(&scope, backend, &partitions);
        prop_assert_eq!(single, two);
    }
}

// =============================================================================
// 3. SORTING
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_sorted_run_is_non_decreasing(
        keys in prop::collection::vec(any::<i64>(), 0..60),
        use_persistence in any::<bool>(),
        capacity in 1usize..5,
    ) {
        let (scope, _temp) = make_scope();
        let supplier = sorting_processor(use_persistence, |item: &(i64, u32)| item.0);
        let processor = supplier.get(&context(&scope, "sort-prepare", 0)).unwrap();

        let items = keys.iter().enumerate().map(|(i, k)| (0, (*k, i as u32)));
        let output = run_to_completion(processor, capacity, items).unwrap();

        let mut distinct = keys.clone();
        distinct.sort_unstable();
        distinct.dedup();
        let emitted: Vec<i64> = output.iter().map(|(k, _)| *k).collect();
        prop_assert_eq!(emitted, distinct);
    }
}

#[test]
fn test_sort_resumes_without_re_emitting() {
    let (scope, _temp) = make_scope();
    let ctx = context(&scope, "sort-prepare", 0);
    let mut processor =
        SortingProcessor::<i64>::with_persistence(&ctx, true, Arc::new(|item: &i64| *item)).unwrap();
    for key in (0..20i64).rev() {
        assert!(processor.try_process(0, &key).unwrap());
    }

    let mut outbox = BoundedOutbox::new(3);
    let mut output = Vec::new();
    let mut calls = 0;
    loop {
        calls += 1;
        let done = processor.complete(&mut outbox).unwrap();
        output.extend(outbox.drain());
        if done {
            break;
        }
    }

    assert_eq!(output, (0..20).collect::<Vec<i64>>());
    assert_eq!(calls, 7);
    assert!(scope.handle().live_partitions().is_empty());
}

// =============================================================================
// 4. HOST CONTRACT
// =============================================================================

/// Refuses every first offer of an item, like an engine under write pressure.
struct FlakyCounter {
    refused_last: bool,
    taken: Vec<u32>,
    emitted: bool,
}

impl Processor for FlakyCounter {
    type Input = u32;
    type Output = usize;

    fn try_process(&mut self, _ordinal: usize, item: &u32) -> ProcessorResult<bool> {
        if !self.refused_last {
            self.refused_last = true;
            return Ok(false);
        }
        self.refused_last = false;
        self.taken.push(*item);
        Ok(true)
    }

    fn complete(&mut self, outbox: &mut dyn Outbox<usize>) -> ProcessorResult<bool> {
        if !self.emitted {
            self.emitted = outbox.offer(self.taken.len()).is_ok();
        }
        Ok(self.emitted)
    }
}

#[test]
fn test_driver_retries_refused_items() {
    let processor = FlakyCounter {
        refused_last: false,
        taken: Vec::new(),
        emitted: false,
    };
    let mut driver = CooperativeDriver::new(Box::new(processor), 1);

    driver.feed_all((0..10u32).map(|n| (0, n))).unwrap();
    let output = driver.finish().unwrap();

    assert_eq!(output, vec![10]);
    let stats = driver.stats();
    assert_eq!(stats.items, 10);
    assert_eq!(stats.retries, 10);
}

#[test]
fn test_processors_share_one_job_handle() {
    let (scope, _temp) = make_scope();
    let op = counting::<u8>();

    let suppliers: Vec<_> = (0..3)
        .map(|_| {
            let identity: KeyFn<u8, u8> = Arc::new(|b: &u8| *b);
            grouping_processor(
                StateBackendKind::PersistedUnbounded,
                vec![identity],
                op.clone(),
                |k: u8, n: u64| (k, n),
            )
        })
        .collect();
    let processors: Vec<_> = suppliers
        .iter()
        .enumerate()
        .map(|(i, s)| s.get(&context(&scope, "aggregate", i)).unwrap())
        .collect();
    assert_eq!(scope.handle().live_partitions().len(), 3);

    for processor in processors {
        let output = run_to_completion(processor, 2, [(0, 1u8), (0, 1), (0, 2)]).unwrap();
        let output: BTreeMap<u8, u64> = output.into_iter().collect();
        assert_eq!(output, BTreeMap::from([(1, 2), (2, 1)]));
    }

    assert!(scope.handle().live_partitions().is_empty());
    scope.finish().unwrap();
}
