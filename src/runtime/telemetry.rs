use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Lightweight rolling counters for the tracker's steady-state activity.
#[derive(Default, Debug)]
pub struct Telemetry {
    fetch_successes: AtomicU64,
    fetch_failures: AtomicU64,
    heads_notified: AtomicU64,
    stale_resets: AtomicU64,
    emission_failures: AtomicU64,
}

impl Telemetry {
    pub fn record_fetch_success(&self) {
        self.fetch_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_head_notified(&self) {
        self.heads_notified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_reset(&self) {
        self.stale_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emission_failure(&self) {
        self.emission_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_successes(&self) -> u64 {
        self.fetch_successes.load(Ordering::Relaxed)
    }

    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    pub fn heads_notified(&self) -> u64 {
        self.heads_notified.load(Ordering::Relaxed)
    }

    pub fn stale_resets(&self) -> u64 {
        self.stale_resets.load(Ordering::Relaxed)
    }

    pub fn emission_failures(&self) -> u64 {
        self.emission_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            fetch_successes: self.fetch_successes(),
            fetch_failures: self.fetch_failures(),
            heads_notified: self.heads_notified(),
            stale_resets: self.stale_resets(),
            emission_failures: self.emission_failures(),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TelemetrySnapshot {
    pub fetch_successes: u64,
    pub fetch_failures: u64,
    pub heads_notified: u64,
    pub stale_resets: u64,
    pub emission_failures: u64,
}
