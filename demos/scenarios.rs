//! Batch scenarios example
//!
//! Replays the fail-fast, collect-all and sequential scenarios on the real
//! clock and prints what each run observed. Run with
//! `RUST_LOG=batch_runner=debug` for per-task logs.

use std::time::{Duration, Instant};

use anyhow::Context;
use batch_runner::batch::{BatchRunner, Delay, SharedCounter, Strategy, TaskSpec};
use tracing_subscriber::EnvFilter;

const POISON_ID: i64 = 6;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("batch_runner=info")),
        )
        .init();

    println!("Batch Runner Scenarios");
    println!("======================\n");

    // Scenario A: uniform delay, no poison id
    let counter = SharedCounter::new();
    let runner = BatchRunner::new().with_counter(counter.clone());
    let result = runner
        .run_batch(TaskSpec::batch(0..10, Delay::fixed_ms(1000), None), Strategy::CollectAll)
        .await
        .context("collect-all batch without poison")?;
    println!("A  collect-all, no poison:   counter={} succeeded={}", counter.value(), result.success_count());

    // Scenario B: uniform delay, poison id 6
    let counter = SharedCounter::new();
    let runner = BatchRunner::new().with_counter(counter.clone());
    let result = runner
        .run_batch(
            TaskSpec::batch(0..10, Delay::fixed_ms(1000), Some(POISON_ID)),
            Strategy::CollectAll,
        )
        .await
        .context("collect-all batch with poison")?;
    println!(
        "B  collect-all, poison {}:    counter={} failed={:?}",
        POISON_ID,
        counter.value(),
        result.failed_ids()
    );
    println!("   {}", serde_json::to_string(&result.summary())?);

    // Scenario C: decreasing delay, poison id 6, fail fast
    let counter = SharedCounter::new();
    let runner = BatchRunner::new().with_counter(counter.clone());
    let outcome = runner
        .run_batch(
            TaskSpec::batch(0..10, Delay::incremental(1000, 50), Some(POISON_ID)),
            Strategy::FailFast,
        )
        .await;
    match outcome {
        Ok(_) => println!("C  fail-fast: unexpectedly succeeded"),
        Err(err) => println!("C  fail-fast, poison {}:      counter={} error=\"{}\"", POISON_ID, counter.value(), err),
    }
    tokio::time::sleep(Duration::from_millis(400)).await;
    println!("   after detached tasks finish: counter={}", counter.value());

    // Scenario D: sequential, 300ms each
    let runner = BatchRunner::new();
    let start = Instant::now();
    let values = runner
        .run_sequential(TaskSpec::batch(1..=3, Delay::fixed_ms(300), None))
        .await
        .context("sequential run")?;
    println!("D  sequential:               values={:?} elapsed={:?}", values, start.elapsed());

    println!("\n{}", batch_runner::metrics::export()?);

    Ok(())
}
