//! Batch Execution Tests
//!
//! Concurrent batches under fail-fast and collect-all reconciliation. All
//! tests run on a paused tokio clock so simulated delays are deterministic.

use batch_runner::batch::{
    BatchRunner, Delay, EventLog, SharedCounter, Strategy, TaskEventKind, TaskFailure, TaskSpec,
};
use batch_runner::BatchError;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::Duration;

const POISON_ID: i64 = 6;

fn runner_with_counter() -> (BatchRunner, SharedCounter) {
    let counter = SharedCounter::new();
    let runner = BatchRunner::new().with_counter(counter.clone());
    (runner, counter)
}

#[tokio::test(start_paused = true)]
async fn test_collect_all_without_poison() {
    // Scenario A: every task succeeds
    let (runner, counter) = runner_with_counter();
    let tasks = TaskSpec::batch(0..10, Delay::fixed_ms(1000), None);

    let result = runner
        .run_batch(tasks, Strategy::CollectAll)
        .await
        .expect("Collect-all never surfaces task failures");

    assert_eq!(counter.value(), 10);
    assert_eq!(result.len(), 10);
    assert!(result.is_complete_success());
    assert_eq!(result.values(), (0..10).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_collect_all_with_poison() {
    // Scenario B: id 6 fails, the other nine still apply their side effect
    let (runner, counter) = runner_with_counter();
    let tasks = TaskSpec::batch(0..10, Delay::fixed_ms(1000), Some(POISON_ID));

    let result = runner
        .run_batch(tasks, Strategy::CollectAll)
        .await
        .expect("Collect-all never surfaces task failures");

    assert_eq!(counter.value(), 9);
    assert_eq!(result.failed_ids(), vec![POISON_ID]);
    assert_eq!(result.success_count(), 9);

    let poisoned = result.record(POISON_ID).expect("Record for poison id");
    assert!(!poisoned.success());
    assert_eq!(poisoned.failure(), Some(&TaskFailure::reject(POISON_ID)));
}

#[tokio::test(start_paused = true)]
async fn test_collect_all_preserves_submission_order() {
    // Higher ids finish first, records still follow submission order
    let (runner, _counter) = runner_with_counter();
    let tasks = TaskSpec::batch(0..10, Delay::incremental(1000, 50), Some(POISON_ID));

    let result = runner.run_batch(tasks, Strategy::CollectAll).await.unwrap();

    let ids: Vec<i64> = result.records.iter().map(|r| r.id).collect();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_collect_all_waits_for_slowest_task() {
    let runner = BatchRunner::new();
    let tasks = TaskSpec::batch(0..10, Delay::incremental(1000, 50), Some(POISON_ID));

    let start = tokio::time::Instant::now();
    runner.run_batch(tasks, Strategy::CollectAll).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_fail_fast_with_incremental_delay() {
    // Scenario C: only ids 9, 8 and 7 finish before id 6 fails
    let (runner, counter) = runner_with_counter();
    let tasks = TaskSpec::batch(0..10, Delay::incremental(1000, 50), Some(POISON_ID));

    let err = runner
        .run_batch(tasks, Strategy::FailFast)
        .await
        .expect_err("Batch should fail at the poison id");

    assert_eq!(err.task_failure(), Some(&TaskFailure::reject(POISON_ID)));
    assert_eq!(counter.value(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_fail_fast_returns_when_failure_is_observed() {
    let runner = BatchRunner::new();
    let tasks = TaskSpec::batch(0..10, Delay::incremental(1000, 50), Some(POISON_ID));

    let start = tokio::time::Instant::now();
    let result = runner.run_batch(tasks, Strategy::FailFast).await;

    tokio_test::assert_err!(result);
    assert_eq!(start.elapsed(), Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn test_fail_fast_does_not_cancel_in_flight_tasks() {
    let (runner, counter) = runner_with_counter();
    let events = EventLog::new();
    let runner = runner.with_event_log(events.clone());
    let tasks = TaskSpec::batch(0..10, Delay::incremental(1000, 50), Some(POISON_ID));

    tokio_test::assert_err!(runner.run_batch(tasks, Strategy::FailFast).await);
    assert_eq!(counter.value(), 3);

    // Detached tasks keep running and apply their side effects later
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(counter.value(), 9);
    assert_eq!(
        events.ids_of(TaskEventKind::Succeeded),
        vec![9, 8, 7, 5, 4, 3, 2, 1, 0]
    );
}

#[tokio::test]
async fn test_fail_fast_without_delay_runs_every_task() {
    // Tasks with no suspension point finish while the batch is starting
    let (runner, counter) = runner_with_counter();
    let tasks = TaskSpec::batch(0..10, Delay::None, Some(POISON_ID));

    let err = runner.run_batch(tasks, Strategy::FailFast).await.unwrap_err();

    assert!(matches!(err, BatchError::Task(ref f) if f.id == POISON_ID));
    assert_eq!(counter.value(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_fail_fast_success_returns_all_records() {
    let (runner, counter) = runner_with_counter();
    let tasks = TaskSpec::batch(10..20, Delay::fixed_ms(1000), None);

    let result = runner.run_batch(tasks, Strategy::FailFast).await.unwrap();

    assert_eq!(counter.value(), 10);
    assert_eq!(result.strategy, Strategy::FailFast);
    assert_eq!(result.values(), (10..20).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_fail_fast_is_repeatable() {
    let mut outcomes = Vec::new();

    for _ in 0..2 {
        let (runner, counter) = runner_with_counter();
        let tasks = TaskSpec::batch(0..10, Delay::incremental(1000, 50), Some(POISON_ID));
        let err = runner.run_batch(tasks, Strategy::FailFast).await.unwrap_err();
        outcomes.push((counter.value(), err.task_failure().cloned()));
    }

    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[0], (3, Some(TaskFailure::reject(POISON_ID))));
}

#[tokio::test(start_paused = true)]
async fn test_all_tasks_start_before_any_resumes() {
    let events = EventLog::new();
    let runner = BatchRunner::new().with_event_log(events.clone());
    let tasks = TaskSpec::batch(0..10, Delay::incremental(1000, 50), None);

    runner.run_batch(tasks, Strategy::CollectAll).await.unwrap();

    let recorded = events.events();
    let (starts, terminals) = recorded.split_at(10);
    assert!(starts.iter().all(|e| e.kind == TaskEventKind::Started));
    assert_eq!(
        starts.iter().map(|e| e.id).collect::<Vec<_>>(),
        (0..10).collect::<Vec<_>>()
    );
    assert!(starts.iter().all(|e| e.elapsed == Duration::ZERO));

    // Resumption follows the delay value
    assert_eq!(
        terminals.iter().map(|e| e.id).collect::<Vec<_>>(),
        (0..10).rev().collect::<Vec<_>>()
    );
}

#[tokio::test(start_paused = true)]
async fn test_runner_poison_id_applies_to_batch() {
    let counter = SharedCounter::new();
    let runner = BatchRunner::new()
        .with_counter(counter.clone())
        .with_poison_id(2);
    let tasks = TaskSpec::batch(0..5, Delay::fixed_ms(100), None);

    let result = runner.run_batch(tasks, Strategy::CollectAll).await.unwrap();

    assert_eq!(result.failed_ids(), vec![2]);
    assert_eq!(counter.value(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_collect_all_on_multi_thread_runtime() {
    let (runner, counter) = runner_with_counter();
    let tasks = TaskSpec::batch(0..50, Delay::fixed_ms(5), Some(POISON_ID));

    let result = runner.run_batch(tasks, Strategy::CollectAll).await.unwrap();

    assert_eq!(result.len(), 50);
    assert_eq!(result.failed_ids(), vec![POISON_ID]);
    assert_eq!(counter.value(), 49);
}

fn panics_at_three(id: i64) -> u64 {
    if id == 3 {
        panic!("delay function failed for task {}", id);
    }
    100
}

#[tokio::test(start_paused = true)]
async fn test_collect_all_records_panicking_task_as_failure() {
    let (runner, counter) = runner_with_counter();
    let tasks = TaskSpec::batch(0..5, Delay::from_fn(panics_at_three), None);

    let result = runner
        .run_batch(tasks, Strategy::CollectAll)
        .await
        .expect("A panicking task becomes a failed record");

    assert_eq!(result.len(), 5);
    assert_eq!(result.failed_ids(), vec![3]);
    let failure = result.record(3).and_then(|r| r.failure()).unwrap();
    assert!(failure.reason.starts_with("task panicked"), "reason was {}", failure.reason);
    assert_eq!(counter.value(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_fail_fast_reports_panicking_task_as_join_error() {
    let runner = BatchRunner::new();
    let tasks = TaskSpec::batch(0..5, Delay::from_fn(panics_at_three), None);

    let err = runner.run_batch(tasks, Strategy::FailFast).await.unwrap_err();

    assert!(matches!(err, BatchError::Join(ref e) if e.is_panic()));
}

#[tokio::test(start_paused = true)]
async fn test_fail_fast_distinguishes_delays_one_millisecond_apart() {
    // Poison finishes 1ms after task 1
    let (runner, counter) = runner_with_counter();
    let delay = Delay::from_fn(|id| if id == 0 { 701 } else { 700 });
    let tasks = TaskSpec::batch(0..2, delay, Some(0));
    tokio_test::assert_err!(runner.run_batch(tasks, Strategy::FailFast).await);
    assert_eq!(counter.value(), 1);

    // Poison finishes 1ms before task 1
    let (runner, counter) = runner_with_counter();
    let delay = Delay::from_fn(|id| if id == 0 { 700 } else { 701 });
    let tasks = TaskSpec::batch(0..2, delay, Some(0));
    tokio_test::assert_err!(runner.run_batch(tasks, Strategy::FailFast).await);
    assert_eq!(counter.value(), 0);
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("Runtime should build")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_collect_all_has_one_record_per_task(
        delays in prop::collection::vec(0u64..500, 1..20),
        poison in prop::option::of(0i64..20),
    ) {
        let task_count = delays.len();
        let tasks: Vec<TaskSpec> = delays
            .iter()
            .enumerate()
            .map(|(id, ms)| {
                let spec = TaskSpec::new(id as i64).with_delay(Delay::fixed_ms(*ms));
                match poison {
                    Some(p) => spec.with_poison_id(p),
                    None => spec,
                }
            })
            .collect();

        let result = paused_runtime()
            .block_on(BatchRunner::new().with_metrics(false).run_batch(tasks, Strategy::CollectAll))
            .unwrap();

        prop_assert_eq!(result.len(), task_count);
        prop_assert_eq!(result.success_count() + result.failure_count(), task_count);
        let ids: Vec<i64> = result.records.iter().map(|r| r.id).collect();
        prop_assert_eq!(ids, (0..task_count as i64).collect::<Vec<_>>());
    }

    #[test]
    fn prop_fail_fast_counts_tasks_faster_than_poison(
        delays in prop::collection::hash_set(1u64..2000, 2..12),
        poison_index in any::<prop::sample::Index>(),
    ) {
        let delays: Vec<u64> = delays.into_iter().collect();
        let poison_id = poison_index.index(delays.len()) as i64;
        let poison_delay = delays[poison_id as usize];
        let expected = delays.iter().filter(|ms| **ms < poison_delay).count();

        let table = delays.clone();
        let delay = Delay::from_fn(move |id| table[id as usize]);
        let tasks = TaskSpec::batch(0..delays.len() as i64, delay, Some(poison_id));

        let counter = SharedCounter::new();
        let runner = BatchRunner::new()
            .with_metrics(false)
            .with_counter(counter.clone());
        let err = paused_runtime()
            .block_on(runner.run_batch(tasks, Strategy::FailFast))
            .unwrap_err();

        prop_assert_eq!(err.task_failure().map(|f| f.id), Some(poison_id));
        prop_assert_eq!(counter.value(), expected);
    }
}
