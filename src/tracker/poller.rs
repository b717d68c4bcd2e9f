//! Background polling loop driving the fetch-and-update cycle.

use crate::tracker::fetcher::HeadFetcher;
use crate::tracker::head::Head;
use crate::tracker::single_flight::UpdateGate;
use crate::tracker::state::TrackerShared;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub(crate) struct PollerParams {
    pub shared: Arc<TrackerShared>,
    pub fetcher: Arc<HeadFetcher>,
    pub gate: Arc<UpdateGate>,
    pub polling_interval: Duration,
    pub retry_timeout: Duration,
    pub run_token: CancellationToken,
    /// Loops started by subscriber arrival cancel themselves once every
    /// subscriber is gone (including receivers pruned mid-emission); loops
    /// started explicitly keep running until told to stop.
    pub stop_when_subscriberless: bool,
}

/// One fetch plus the resulting comparison/notification step.
///
/// Shared between the polling loop and forced `check_for_latest_head` calls;
/// both go through the tracker's update gate so only one cycle runs at a time.
pub(crate) async fn update_cycle(
    fetcher: Arc<HeadFetcher>,
    shared: Arc<TrackerShared>,
) -> Result<Head> {
    match fetcher.fetch_latest().await {
        Ok(head) => {
            shared.telemetry().record_fetch_success();
            shared.report_new_head(head);
            Ok(head)
        }
        Err(err) => {
            shared.telemetry().record_fetch_failure();
            Err(err).context("encountered an error while attempting to update latest head")
        }
    }
}

/// Spawns the polling loop.
///
/// The loop re-checks the run token at the top of each cycle and races both
/// inter-cycle waits against it, so stopping skips any pending delay while an
/// RPC already in flight is left to finish.
pub(crate) fn spawn_polling_loop(params: PollerParams) -> JoinHandle<()> {
    let PollerParams {
        shared,
        fetcher,
        gate,
        polling_interval,
        retry_timeout,
        run_token,
        stop_when_subscriberless,
    } = params;

    tokio::spawn(async move {
        tracing::debug!(
            ?polling_interval,
            ?retry_timeout,
            "polling loop started"
        );

        loop {
            if run_token.is_cancelled() {
                break;
            }
            if stop_when_subscriberless && shared.subscriber_count() == 0 {
                tracing::debug!("all subscribers gone; polling loop winding down");
                run_token.cancel();
                break;
            }

            let fetcher = fetcher.clone();
            let cycle_shared = shared.clone();
            let outcome = gate
                .run(move || update_cycle(fetcher, cycle_shared))
                .await;

            let delay = match outcome {
                Ok(_) => polling_interval,
                Err(err) => {
                    shared.emit_error(err);
                    retry_timeout
                }
            };

            if !wait_or_cancelled(delay, &run_token).await {
                break;
            }
        }

        tracing::debug!("polling loop stopped");
    })
}

/// Returns `false` when the wait was cut short by cancellation.
async fn wait_or_cancelled(delay: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = sleep(delay) => true,
    }
}
