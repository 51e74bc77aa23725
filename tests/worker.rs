mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use common::{cleanup, counter, fast_config, flag, idle, wait_until};
use stepvisor::{
    Bus, Event, EventKind, MachineError, Step, StepResult, StepTree, Worker, WorkerState,
};
use tokio::sync::broadcast;
use tokio::time;

const SETTLE: Duration = Duration::from_secs(2);

fn probe_machine() -> Step {
    Step::group(
        "probe",
        [
            idle("Searching", 5, counter()),
            idle("Connected", 5, counter()),
            cleanup(flag(true), counter()),
        ],
    )
}

async fn collect_until(rx: &mut broadcast::Receiver<Event>, last: EventKind) -> Vec<Event> {
    let mut seen = Vec::new();
    loop {
        let ev = time::timeout(SETTLE, rx.recv())
            .await
            .expect("event before timeout")
            .expect("bus open");
        let done = ev.kind == last;
        seen.push(ev);
        if done {
            return seen;
        }
    }
}

#[tokio::test]
async fn external_jump_and_start_reposition_the_machine() {
    let tree = StepTree::new(probe_machine()).unwrap();
    let worker = Worker::builder("probe", tree)
        .with_config(fast_config())
        .spawn();

    assert_eq!(worker.active_step(), "Searching");

    worker.jump_to_step("Connected").unwrap();
    assert_eq!(worker.active_step(), "Connected");

    assert!(worker.start().await);
    assert!(wait_until(SETTLE, || worker.active_step() == "Searching").await);

    assert!(worker.stop().await);
    assert!(wait_until(SETTLE, || worker.active_step() == "Cleanup").await);
    assert_eq!(worker.state(), WorkerState::Running);
}

#[tokio::test]
async fn unknown_jump_is_rejected_without_side_effects() {
    let tree = StepTree::new(probe_machine()).unwrap();
    let worker = Worker::builder("probe", tree)
        .with_config(fast_config())
        .spawn();

    worker.jump_to_step("Connected").unwrap();
    let err = worker.jump_to_step("Nowhere").unwrap_err();
    assert_eq!(
        err,
        MachineError::UnknownStep {
            name: "Nowhere".into()
        }
    );
    assert_eq!(worker.active_step(), "Connected");
    assert_eq!(worker.state(), WorkerState::Running);
}

#[tokio::test]
async fn pulse_cuts_a_long_sleep_short() {
    let runs = counter();
    let ticks = counter();
    let tree = StepTree::new(Step::group("slow", [idle("Wait", 60_000, runs.clone())])).unwrap();

    let hook_ticks = ticks.clone();
    let worker = Worker::builder("slow", tree)
        .with_config(fast_config())
        .with_tick_hook(move || {
            hook_ticks.fetch_add(1, Ordering::SeqCst);
        })
        .spawn();

    assert!(wait_until(SETTLE, || runs.load(Ordering::SeqCst) == 1).await);
    assert_eq!(ticks.load(Ordering::SeqCst), 0);

    worker.pulse();
    assert!(wait_until(SETTLE, || runs.load(Ordering::SeqCst) == 2).await);
    assert!(ticks.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn pending_pulse_does_not_shorten_the_following_sleep() {
    let runs = counter();
    let tree = StepTree::new(Step::group("slow", [idle("Wait", 60_000, runs.clone())])).unwrap();
    let worker = Worker::builder("slow", tree)
        .with_config(fast_config())
        .spawn();

    assert!(wait_until(SETTLE, || runs.load(Ordering::SeqCst) == 1).await);

    worker.pulse();
    worker.pulse();
    assert!(wait_until(SETTLE, || runs.load(Ordering::SeqCst) == 2).await);

    time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn machine_without_steps_starts_stops_and_closes_cleanly() {
    let bus = Bus::new(256);
    let mut rx = bus.subscribe();
    let worker = Worker::builder("lonely", StepTree::new(Step::new("lonely")).unwrap())
        .with_config(fast_config())
        .with_bus(bus)
        .spawn();

    assert!(worker.start().await);
    assert!(worker.stop().await);
    worker.request_close();

    let events = collect_until(&mut rx, EventKind::WorkerTerminated).await;
    assert!(events.iter().all(|e| e.kind != EventKind::WorkerFaulted));
    assert!(events.iter().any(|e| e.kind == EventKind::CloseRequested));
}

#[tokio::test]
async fn close_runs_cleanup_and_terminates() {
    let bus = Bus::new(256);
    let mut rx = bus.subscribe();
    let closing_runs = counter();

    let machine = Step::group(
        "probe",
        [
            idle("Searching", 5, counter()),
            cleanup(flag(true), closing_runs.clone()),
        ],
    );
    let worker = Worker::builder("probe", StepTree::new(machine).unwrap())
        .with_config(fast_config())
        .with_bus(bus)
        .spawn();

    worker.request_close();
    let events = collect_until(&mut rx, EventKind::WorkerTerminated).await;

    assert!(worker.is_terminated() || wait_until(SETTLE, || worker.is_terminated()).await);
    assert_eq!(worker.state(), WorkerState::Terminated);
    assert_eq!(closing_runs.load(Ordering::SeqCst), 1);

    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds.first(), Some(&EventKind::WorkerStarted));
    assert!(kinds.contains(&EventKind::CloseRequested));
    let close_jumps = events
        .iter()
        .filter(|e| e.kind == EventKind::StepJumped)
        .filter(|e| e.step.as_deref() == Some("Cleanup"))
        .count();
    assert_eq!(close_jumps, 1);
}

#[tokio::test]
async fn jump_error_inside_an_action_faults_the_worker() {
    let bus = Bus::new(64);
    let mut rx = bus.subscribe();

    let machine = Step::group(
        "broken",
        [Step::new("Lost").with_action(|ctx| {
            let _ = ctx.jump_to("Nowhere");
            StepResult::Continue
        })],
    );
    let worker = Worker::builder("broken", StepTree::new(machine).unwrap())
        .with_bus(bus)
        .spawn();

    let events = collect_until(&mut rx, EventKind::WorkerTerminated).await;
    let fault = events
        .iter()
        .find(|e| e.kind == EventKind::WorkerFaulted)
        .expect("fault event");
    let reason = fault.reason.as_deref().unwrap_or_default();
    assert!(reason.starts_with("machine_unknown_step"), "{reason}");

    assert!(wait_until(SETTLE, || worker.is_terminated()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_reports_timeout_while_the_loop_is_busy() {
    let bus = Bus::new(64);
    let mut rx = bus.subscribe();
    let entered = Arc::new(AtomicBool::new(false));

    let busy = entered.clone();
    let machine = Step::group(
        "busy",
        [Step::new("Block").with_action(move |_ctx| {
            busy.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            StepResult::Repeat
        })],
    );
    let worker = Worker::builder("busy", StepTree::new(machine).unwrap())
        .with_config(fast_config())
        .with_bus(bus)
        .spawn();

    assert!(wait_until(SETTLE, || entered.load(Ordering::SeqCst)).await);
    assert!(!worker.start_within(Duration::from_millis(20)).await);
    assert!(worker.start_within(Duration::from_secs(2)).await);

    let events = collect_until(&mut rx, EventKind::RequestCompleted).await;
    let timed_out = events
        .iter()
        .find(|e| e.kind == EventKind::RequestTimedOut)
        .expect("timeout event");
    assert_eq!(timed_out.reason.as_deref(), Some("start"));
    assert_eq!(timed_out.delay_ms, Some(20));
}

#[tokio::test]
async fn with_tree_exposes_the_listing() {
    let worker = Worker::spawn("probe", StepTree::new(probe_machine()).unwrap());
    let names: Vec<String> =
        worker.with_tree(|tree| tree.listing().iter().map(|e| e.name.to_string()).collect());
    assert_eq!(names, ["Searching", "Connected", "Cleanup"]);
    assert_eq!(worker.name(), "probe");
}
