#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use stepvisor::{Config, Step, StepResult};
use tokio::time::{self, Instant};

/// Config with short poll intervals for tests.
pub fn fast_config() -> Config {
    Config {
        request_timeout: Duration::from_secs(1),
        request_poll: Duration::from_millis(2),
        shutdown_poll: Duration::from_millis(5),
        ..Config::default()
    }
}

/// Leaf that repeats forever every `delay_ms`, counting its runs.
pub fn idle(name: &str, delay_ms: u64, runs: Arc<AtomicUsize>) -> Step {
    Step::new(name).with_delay_ms(delay_ms).with_action(move |_ctx| {
        runs.fetch_add(1, Ordering::SeqCst);
        StepResult::Repeat
    })
}

/// Cleanup leaf: idles until the worker closes, then completes the machine
/// once `allow` is set. Counts how often it ran while closing.
pub fn cleanup(allow: Arc<AtomicBool>, closing_runs: Arc<AtomicUsize>) -> Step {
    Step::new("Cleanup").with_delay_ms(5).with_action(move |ctx| {
        if !ctx.is_closing() {
            return StepResult::Repeat;
        }
        closing_runs.fetch_add(1, Ordering::SeqCst);
        if allow.load(Ordering::SeqCst) {
            ctx.complete_machine();
        }
        StepResult::Continue
    })
}

/// Polls `cond` every millisecond until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        time::sleep(Duration::from_millis(1)).await;
    }
}

pub fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

pub fn flag(value: bool) -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(value))
}
