// Real-time loop test: spawns a trivial worker for a full one-minute window.
// Slow, so ignored by default. Run with `cargo test -- --ignored`.
#![cfg(unix)]

use std::time::{Duration, Instant};

use wellrun::clock::SystemClock;
use wellrun::exec::SystemExecutor;
use wellrun::runner::TimeBoxedRunner;
use wellrun::worker::{RunConfiguration, WorkerCommand};

#[test]
#[ignore]
fn test_one_minute_loop_live() {
    let worker = WorkerCommand {
        program: "sh".to_string(),
        prefix_args: vec!["-c".to_string(), "sleep 1".to_string(), "worker".to_string()],
    };
    let started = Instant::now();
    let report = TimeBoxedRunner::new(
        &SystemExecutor,
        &SystemClock,
        worker,
        RunConfiguration::default(),
        chrono::Duration::minutes(1),
    )
    .expect("valid runner")
    .run()
    .expect("loop completes");

    let elapsed = started.elapsed();
    println!("{} runs in {:?}", report.runs, elapsed);
    assert!(report.runs > 0);
    assert_eq!(report.failures, 0);
    assert!(elapsed >= Duration::from_secs(60));
    assert!(elapsed < Duration::from_secs(65));
}
