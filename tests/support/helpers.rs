use std::time::Duration;

use anyhow::{bail, Result};
use headwatch::{Head, Subscription, TrackerEvent};
use once_cell::sync::Lazy;
use tokio::time::{sleep, timeout, Instant};

use super::mock_provider::MockProvider;

static TRACING: Lazy<()> = Lazy::new(headwatch::init_tracing);

pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Receives the next `latest-head` event within `limit`.
pub async fn next_head(subscription: &mut Subscription, limit: Duration) -> Result<Head> {
    match timeout(limit, subscription.recv()).await {
        Ok(Some(TrackerEvent::LatestHead(head))) => Ok(head),
        Ok(Some(other)) => bail!("expected a head event, got {other:?}"),
        Ok(None) => bail!("subscription closed while waiting for a head"),
        Err(_) => bail!("no head event within {limit:?}"),
    }
}

/// Receives `count` consecutive `latest-head` events.
pub async fn collect_heads(
    subscription: &mut Subscription,
    count: usize,
    limit: Duration,
) -> Result<Vec<Head>> {
    let mut heads = Vec::with_capacity(count);
    for _ in 0..count {
        heads.push(next_head(subscription, limit).await?);
    }
    Ok(heads)
}

/// Receives the next `error` event within `limit`.
pub async fn next_error(
    subscription: &mut Subscription,
    limit: Duration,
) -> Result<std::sync::Arc<anyhow::Error>> {
    match timeout(limit, subscription.recv()).await {
        Ok(Some(TrackerEvent::Error(error))) => Ok(error),
        Ok(Some(other)) => bail!("expected an error event, got {other:?}"),
        Ok(None) => bail!("subscription closed while waiting for an error"),
        Err(_) => bail!("no error event within {limit:?}"),
    }
}

/// Polls until the mock provider has served at least `target` requests.
pub async fn wait_for_request_count(
    provider: &MockProvider,
    target: usize,
    limit: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        if provider.request_count() >= target {
            return Ok(());
        }
        if start.elapsed() > limit {
            bail!(
                "provider served {} requests, expected {target} within {limit:?}",
                provider.request_count()
            );
        }
        sleep(Duration::from_millis(10)).await;
    }
}
