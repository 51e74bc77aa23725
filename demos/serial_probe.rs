//! Simulated serial-port probe.
//!
//! The machine searches for a device, checks the connection on a slow cadence
//! and falls back to searching when the link drops. After a few seconds (or on
//! Ctrl-C) the registry drains it: close jumps to `Complete`, which releases
//! the port and finishes the machine.
//!
//! Run with `RUST_LOG=debug cargo run --example serial_probe` to see every jump.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use stepvisor::{
    Bus, Config, LogWriter, ShutdownRegistry, Step, StepCtx, StepResult, StepTree, Subscribe,
    SubscriberSet, Worker, WorkerGroup,
};
use tracing_subscriber::EnvFilter;

/// Stand-in for a serial port handle.
#[derive(Default)]
struct Port {
    open: AtomicBool,
    healthy_checks: AtomicU32,
}

fn searching(port: Arc<Port>) -> impl Fn(&mut StepCtx<'_>) -> StepResult + Send + Sync {
    move |ctx| {
        if ctx.is_timed_out(Duration::from_secs(2)) {
            tracing::warn!(attempts = ctx.fail_count(), "no device, restarting search");
            let _ = ctx.jump_to_first();
            return StepResult::Repeat;
        }
        if ctx.fail_count() < 3 {
            return StepResult::Repeat;
        }
        port.open.store(true, Ordering::SeqCst);
        port.healthy_checks.store(0, Ordering::SeqCst);
        tracing::info!("device found");
        StepResult::Continue
    }
}

fn connection_check(port: Arc<Port>) -> impl Fn(&mut StepCtx<'_>) -> StepResult + Send + Sync {
    move |ctx| {
        let checks = port.healthy_checks.fetch_add(1, Ordering::SeqCst);
        if checks >= 4 {
            tracing::warn!("link dropped");
            port.open.store(false, Ordering::SeqCst);
            let _ = ctx.jump_to("Searching");
        }
        StepResult::Repeat
    }
}

fn complete(port: Arc<Port>) -> impl Fn(&mut StepCtx<'_>) -> StepResult + Send + Sync {
    move |ctx| {
        if port.open.swap(false, Ordering::SeqCst) {
            tracing::info!("port released");
        }
        if ctx.is_closing() {
            ctx.complete_machine();
            return StepResult::Continue;
        }
        StepResult::Repeat
    }
}

fn probe_machine(port: &Arc<Port>) -> Step {
    Step::group(
        "Serial Probe",
        [
            Step::new("Searching")
                .with_delay_ms(100)
                .with_action(searching(Arc::clone(port))),
            Step::new("Connection Check")
                .with_delay_ms(250)
                .with_action(connection_check(Arc::clone(port))),
            Step::new("Complete")
                .with_delay_ms(100)
                .with_action(complete(Arc::clone(port))),
        ],
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config::default();
    let bus = Bus::new(cfg.bus_capacity_clamped());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let set = Arc::new(SubscriberSet::new(subs));
    let _listener = set.listen(&bus);

    let port = Arc::new(Port::default());
    let worker = Worker::builder("serial", StepTree::new(probe_machine(&port))?)
        .with_config(cfg.clone())
        .with_bus(bus.clone())
        .spawn();

    if !worker.start().await {
        tracing::warn!("start not acknowledged yet");
    }

    let registry = ShutdownRegistry::with_bus("app", cfg, bus);
    registry.register(Arc::new(WorkerGroup::new("devices").with_worker(worker)));

    let status = tokio::select! {
        res = registry.drain_on_signal() => res?,
        _ = tokio::time::sleep(Duration::from_secs(4)) => registry.drain().await,
    };
    tracing::info!(ready = status.ready, "{status}");
    Ok(())
}
