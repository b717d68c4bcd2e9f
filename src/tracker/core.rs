//! The public tracker facade: subscriber-driven lifecycle over the state
//! machine, the polling driver, and the fetch adapter.

use crate::rpc::Provider;
use crate::runtime::config::TrackerConfig;
use crate::runtime::telemetry::Telemetry;
use crate::tracker::events::{EventKind, Subscription, SubscriptionId};
use crate::tracker::fetcher::HeadFetcher;
use crate::tracker::head::Head;
use crate::tracker::poller::{spawn_polling_loop, update_cycle, PollerParams};
use crate::tracker::single_flight::{self, UpdateGate};
use crate::tracker::state::TrackerShared;
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Polling chain-head tracker.
///
/// Polls the configured provider for the newest ledger checkpoint while at
/// least one subscriber is registered, caches the newest observed head, and
/// notifies `latest-head` subscribers exactly once per strictly newer head.
/// Fetch failures are retried on a shorter interval and surfaced on the
/// `error` channel; they never terminate the loop.
///
/// All methods take `&self`; the tracker is usually shared behind an `Arc`.
/// Methods that spawn background work must run inside a tokio runtime.
pub struct HeadTracker {
    config: TrackerConfig,
    shared: Arc<TrackerShared>,
    fetcher: Arc<HeadFetcher>,
    gate: Arc<UpdateGate>,
    telemetry: Arc<Telemetry>,
    shutdown_root: CancellationToken,
    poll: Mutex<PollState>,
}

#[derive(Default)]
struct PollState {
    run_token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
    /// Whether the current run stops itself once the subscriber set empties
    /// (subscriber-driven) or keeps going until an explicit `stop`.
    auto: bool,
}

impl std::fmt::Debug for HeadTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadTracker").finish_non_exhaustive()
    }
}

impl PollState {
    fn is_running(&self) -> bool {
        self.run_token
            .as_ref()
            .map(|token| !token.is_cancelled())
            .unwrap_or(false)
    }
}

impl HeadTracker {
    pub fn builder() -> HeadTrackerBuilder {
        HeadTrackerBuilder::default()
    }

    pub fn new(provider: Arc<dyn Provider>, config: TrackerConfig) -> Self {
        let telemetry = Arc::new(Telemetry::default());
        let shared = Arc::new(TrackerShared::new(
            telemetry.clone(),
            config.block_reset_duration(),
        ));
        let fetcher = Arc::new(HeadFetcher::new(
            provider,
            config.use_cache_bypass(),
            config.recent_window_limit(),
        ));

        Self {
            shared,
            fetcher,
            gate: Arc::new(UpdateGate::new()),
            telemetry,
            shutdown_root: CancellationToken::new(),
            poll: Mutex::new(PollState::default()),
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Registers a subscriber for `kind` events. The first subscriber starts
    /// the polling loop.
    pub fn subscribe(&self, kind: EventKind) -> Subscription {
        let subscription = self.shared.subscribe(kind);
        self.ensure_polling(true);
        subscription
    }

    /// Removes a subscriber. The polling loop stops once the set empties.
    /// Returns whether the id was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.shared.unsubscribe(id);
        if removed {
            self.recompute_run_state();
        }
        removed
    }

    /// Latest cached head, if one is present and still fresh. Never triggers
    /// a fetch.
    pub fn latest_head(&self) -> Option<Head> {
        self.shared.latest_head()
    }

    /// Forces one fetch-and-update cycle regardless of running state and
    /// returns the resulting head.
    ///
    /// A call that lands while the polling loop's own cycle is in flight
    /// awaits that cycle's result instead of issuing a second request. The
    /// returned head is the cached head after the update when one exists,
    /// otherwise the fetched value (which may be [`Head::EMPTY`] when the
    /// ledger shows no observable progress).
    pub async fn check_for_latest_head(&self) -> Result<Head> {
        let fetcher = self.fetcher.clone();
        let shared = self.shared.clone();
        let fetched = self
            .gate
            .run(move || update_cycle(fetcher, shared))
            .await
            .map_err(single_flight::into_error)?;
        Ok(self.shared.latest_or(fetched))
    }

    /// Starts the polling loop without requiring a subscriber.
    ///
    /// Intended for embedders that consume heads via
    /// [`latest_head`](Self::latest_head) instead of subscribing; such a run
    /// only ends with an explicit [`stop`](Self::stop). A no-op when already
    /// running.
    pub fn start(&self) {
        self.ensure_polling(false);
    }

    /// Stops the tracker: deregisters every subscriber, cancels the pending
    /// inter-cycle delay and the staleness timer, and winds the loop down.
    ///
    /// With `keep_process_alive` set (the default) this waits for the loop
    /// task to finish its in-flight cycle; otherwise the task is left to
    /// wind down on its own.
    pub async fn stop(&self) {
        self.shared.clear_subscribers();
        let handle = self.halt_polling();
        // A forced check may have armed the timer with no loop running.
        self.shared.cancel_reset_timer();
        if self.config.keep_process_alive() {
            if let Some(handle) = handle {
                let _ = handle.await;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_poll().is_running()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscriber_count()
    }

    fn ensure_polling(&self, auto: bool) {
        let mut poll = self.lock_poll();
        if poll.is_running() {
            return;
        }

        let run_token = self.shutdown_root.child_token();
        let handle = spawn_polling_loop(PollerParams {
            shared: self.shared.clone(),
            fetcher: self.fetcher.clone(),
            gate: self.gate.clone(),
            polling_interval: self.config.polling_interval(),
            retry_timeout: self.config.retry_timeout(),
            run_token: run_token.clone(),
            stop_when_subscriberless: auto,
        });
        poll.run_token = Some(run_token);
        poll.handle = Some(handle);
        poll.auto = auto;
        tracing::debug!(auto, "tracker transitioned to running");
    }

    fn recompute_run_state(&self) {
        if self.shared.subscriber_count() == 0 && self.lock_poll().auto {
            self.halt_polling();
        }
    }

    fn halt_polling(&self) -> Option<JoinHandle<()>> {
        let mut poll = self.lock_poll();
        let token = poll.run_token.take()?;
        token.cancel();
        self.shared.cancel_reset_timer();
        let handle = poll.handle.take();
        tracing::debug!("tracker transitioned to stopped");
        handle
    }

    fn lock_poll(&self) -> std::sync::MutexGuard<'_, PollState> {
        self.poll.lock().expect("tracker poll state poisoned")
    }
}

impl Drop for HeadTracker {
    fn drop(&mut self) {
        self.shutdown_root.cancel();
        if !self.config.keep_process_alive() {
            // Nothing owned by this tracker may keep the host runtime alive.
            if let Ok(mut poll) = self.poll.lock() {
                if let Some(handle) = poll.handle.take() {
                    handle.abort();
                }
            }
            self.shared.cancel_reset_timer();
        }
    }
}

#[derive(Default)]
pub struct HeadTrackerBuilder {
    provider: Option<Arc<dyn Provider>>,
    config: Option<TrackerConfig>,
}

impl HeadTrackerBuilder {
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<HeadTracker> {
        let provider = self.provider.context("provider is required")?;
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => TrackerConfig::default(),
        };
        Ok(HeadTracker::new(provider, config))
    }
}
