//! Single source of truth for the latest known head.
//!
//! `TrackerShared` owns the cached head, its staleness deadline, the
//! re-armable reset timer, and the subscriber registry. Compare, update, and
//! notification run under one mutex (no await inside the critical section),
//! which is what guarantees strictly increasing delivery order on the
//! `latest-head` channel even when fetches complete out of submission order.

use crate::runtime::telemetry::Telemetry;
use crate::tracker::events::{EventKind, SubscriberSet, Subscription, SubscriptionId, TrackerEvent};
use crate::tracker::head::Head;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct TrackerCore {
    cached: Option<Head>,
    stale_deadline: Option<Instant>,
    reset_timer: Option<JoinHandle<()>>,
    subscribers: SubscriberSet,
}

pub(crate) struct TrackerShared {
    core: Mutex<TrackerCore>,
    telemetry: Arc<Telemetry>,
    block_reset_duration: Duration,
}

impl TrackerShared {
    pub(crate) fn new(telemetry: Arc<Telemetry>, block_reset_duration: Duration) -> Self {
        Self {
            core: Mutex::new(TrackerCore {
                cached: None,
                stale_deadline: None,
                reset_timer: None,
                subscribers: SubscriberSet::default(),
            }),
            telemetry,
            block_reset_duration,
        }
    }

    pub(crate) fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    pub(crate) fn subscribe(&self, kind: EventKind) -> Subscription {
        self.lock_core().subscribers.subscribe(kind)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock_core().subscribers.unsubscribe(id)
    }

    /// Number of live subscribers. Entries whose receiver has been dropped
    /// are pruned here so an abandoned subscription counts as unsubscribed.
    pub(crate) fn subscriber_count(&self) -> usize {
        let mut core = self.lock_core();
        core.subscribers.prune_closed();
        core.subscribers.len()
    }

    pub(crate) fn clear_subscribers(&self) {
        self.lock_core().subscribers.clear();
    }

    /// Cached head, if one is present and its staleness deadline has not
    /// passed. The deadline is checked here as well as by the timer task, so
    /// a lagging task cannot leak an aged value to callers.
    pub(crate) fn latest_head(&self) -> Option<Head> {
        let core = self.lock_core();
        let head = core.cached?;
        match core.stale_deadline {
            Some(deadline) if Instant::now() < deadline => Some(head),
            _ => None,
        }
    }

    /// Cached head when fresh, otherwise the provided fallback.
    pub(crate) fn latest_or(&self, fallback: Head) -> Head {
        self.latest_head().unwrap_or(fallback)
    }

    /// Applies the monotonic gate to a fetched candidate.
    ///
    /// Accepts the candidate only when the cache is empty or the candidate is
    /// strictly newer; an accepted head re-arms the staleness timer and emits
    /// exactly one `latest-head` event. Equal or older candidates, and the
    /// empty sentinel, change nothing. Returns whether the candidate was
    /// accepted.
    pub(crate) fn report_new_head(self: &Arc<Self>, candidate: Head) -> bool {
        if candidate.is_empty() {
            tracing::debug!("fetch observed no head records; keeping current state");
            return false;
        }

        let mut core = self.lock_core();
        if let Some(current) = core.cached {
            if candidate <= current {
                tracing::trace!(
                    %candidate,
                    %current,
                    "candidate is not newer than cached head; skipping"
                );
                return false;
            }
        }

        core.cached = Some(candidate);
        self.arm_reset_timer_locked(&mut core);
        let delivered = core
            .subscribers
            .emit(EventKind::LatestHead, &TrackerEvent::LatestHead(candidate));
        drop(core);

        self.telemetry.record_head_notified();
        tracing::debug!(%candidate, delivered, "latest head advanced");
        true
    }

    /// Fans a fetch failure out to `error` subscribers.
    ///
    /// When no subscriber receives it, the failure is logged directly so it is
    /// never silently dropped.
    pub(crate) fn emit_error(&self, error: Arc<anyhow::Error>) {
        let delivered = self
            .lock_core()
            .subscribers
            .emit(EventKind::Error, &TrackerEvent::Error(error.clone()));
        if delivered == 0 {
            self.telemetry.record_emission_failure();
            tracing::error!(error = %error, "fetch failure had no error subscribers");
        }
    }

    /// Cancels the pending staleness timer. The recorded deadline is kept, so
    /// an already-cached head still expires through the getter check.
    pub(crate) fn cancel_reset_timer(&self) {
        if let Some(handle) = self.lock_core().reset_timer.take() {
            handle.abort();
        }
    }

    fn arm_reset_timer_locked(self: &Arc<Self>, core: &mut TrackerCore) {
        if let Some(previous) = core.reset_timer.take() {
            previous.abort();
        }

        let duration = self.block_reset_duration;
        core.stale_deadline = Some(Instant::now() + duration);
        let weak = Arc::downgrade(self);
        core.reset_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(shared) = weak.upgrade() {
                shared.clear_if_stale();
            }
        }));
    }

    /// Timer-task entry point. The deadline is re-checked under the lock so a
    /// late firing never clobbers a cache that was re-armed in the meantime.
    fn clear_if_stale(&self) {
        let mut core = self.lock_core();
        let Some(deadline) = core.stale_deadline else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }

        if let Some(expired) = core.cached.take() {
            self.telemetry.record_stale_reset();
            tracing::debug!(%expired, "cached head expired without fresh confirmation");
        }
        core.stale_deadline = None;
        core.reset_timer = None;
    }

    fn lock_core(&self) -> std::sync::MutexGuard<'_, TrackerCore> {
        self.core.lock().expect("tracker state poisoned")
    }
}
