//! Deduplication of concurrent fetch-and-update cycles.
//!
//! Only one cycle may execute at a time per tracker. A forced
//! `check_for_latest_head` that lands while the polling loop's cycle is in
//! flight must reuse that cycle's result instead of issuing a second RPC, so
//! the gate hands out leader/follower roles: the leader runs the operation
//! and publishes the outcome over a `watch` channel, followers await it.

use crate::tracker::head::Head;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Outcome shared between the leader and its followers. Errors are wrapped in
/// `Arc` so one failure can be cloned to every waiter.
pub(crate) type UpdateOutcome = Result<Head, Arc<anyhow::Error>>;

struct GateSlot {
    generation: u64,
    inflight: Option<watch::Receiver<Option<UpdateOutcome>>>,
}

pub(crate) struct UpdateGate {
    slot: Mutex<GateSlot>,
}

enum Role {
    Leader(watch::Sender<Option<UpdateOutcome>>),
    Follower(u64, watch::Receiver<Option<UpdateOutcome>>),
}

impl UpdateGate {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(GateSlot {
                generation: 0,
                inflight: None,
            }),
        }
    }

    /// Runs `operation` unless a cycle is already in flight, in which case the
    /// in-flight cycle's outcome is awaited and returned instead.
    ///
    /// If the leader is dropped mid-flight (its caller was cancelled), one of
    /// the waiters claims leadership and runs its own operation.
    pub(crate) async fn run<F, Fut>(&self, operation: F) -> UpdateOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Head>>,
    {
        let mut operation = Some(operation);

        loop {
            let role = {
                let mut slot = self.lock_slot();
                match slot.inflight.as_ref() {
                    Some(rx) => Role::Follower(slot.generation, rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        slot.generation += 1;
                        slot.inflight = Some(rx);
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Leader(tx) => {
                    let run = operation.take().expect("leader role claimed twice");
                    let outcome = match run().await {
                        Ok(head) => Ok(head),
                        Err(err) => Err(Arc::new(err)),
                    };
                    // Clear before publishing so the next caller starts a
                    // fresh cycle instead of following a finished one.
                    self.lock_slot().inflight = None;
                    let _ = tx.send(Some(outcome.clone()));
                    return outcome;
                }
                Role::Follower(generation, mut rx) => {
                    loop {
                        if let Some(outcome) = rx.borrow_and_update().clone() {
                            return outcome;
                        }
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }
                    // Leader vanished without publishing; clean up its slot
                    // (unless a newer flight already replaced it) and retry.
                    let mut slot = self.lock_slot();
                    if slot.generation == generation {
                        slot.inflight = None;
                    }
                }
            }
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, GateSlot> {
        self.slot.lock().expect("update gate poisoned")
    }
}

/// Converts a shared outcome error back into an owned `anyhow::Error` for
/// callers that surface it directly.
pub(crate) fn into_error(shared: Arc<anyhow::Error>) -> anyhow::Error {
    anyhow::Error::new(SharedCycleError { inner: shared })
}

#[derive(Clone)]
struct SharedCycleError {
    inner: Arc<anyhow::Error>,
}

impl fmt::Debug for SharedCycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner.as_ref(), f)
    }
}

impl fmt::Display for SharedCycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.inner.as_ref(), f)
    }
}

impl std::error::Error for SharedCycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref().as_ref())
    }
}
