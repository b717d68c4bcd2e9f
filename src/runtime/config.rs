use anyhow::{bail, Context, Result};
use std::time::Duration;

const DEFAULT_POLLING_INTERVAL_SECS: u64 = 20;
const DEFAULT_RECENT_WINDOW_LIMIT: usize = 20;
/// Dividing a short polling interval by ten can round a retry delay down to
/// zero; it is clamped up to this floor instead.
const MIN_RETRY_TIMEOUT: Duration = Duration::from_millis(1);

/// Runtime configuration for the head tracker.
///
/// All instances must be constructed via [`TrackerConfig::builder`] or
/// [`TrackerConfig::new`] so invariants are validated before any consumer
/// observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    polling_interval: Duration,
    retry_timeout: Duration,
    block_reset_duration: Duration,
    keep_process_alive: bool,
    use_cache_bypass: bool,
    recent_window_limit: usize,
}

pub struct TrackerConfigParams {
    pub polling_interval: Duration,
    pub retry_timeout: Duration,
    pub block_reset_duration: Duration,
    pub keep_process_alive: bool,
    pub use_cache_bypass: bool,
    pub recent_window_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfigBuilder::default()
            .build()
            .expect("default tracker configuration must validate")
    }
}

impl TrackerConfig {
    /// Returns a builder to incrementally construct and validate a
    /// configuration.
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    ///
    /// Prefer [`TrackerConfig::builder`], which derives the dependent
    /// defaults (`retry_timeout`, `block_reset_duration`) from the polling
    /// interval when they are not set explicitly.
    pub fn new(params: TrackerConfigParams) -> Result<Self> {
        let TrackerConfigParams {
            polling_interval,
            retry_timeout,
            block_reset_duration,
            keep_process_alive,
            use_cache_bypass,
            recent_window_limit,
        } = params;

        let config = Self {
            polling_interval,
            retry_timeout,
            block_reset_duration,
            keep_process_alive,
            use_cache_bypass,
            recent_window_limit,
        };

        config.validate()?;
        Ok(config)
    }

    /// Steady-state delay between successful fetch-and-update cycles.
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    /// Delay before the next attempt after a failed fetch.
    pub fn retry_timeout(&self) -> Duration {
        self.retry_timeout
    }

    /// How long a cached head stays trusted with no fresh confirmation.
    pub fn block_reset_duration(&self) -> Duration {
        self.block_reset_duration
    }

    /// Whether teardown waits for background tasks instead of aborting them.
    pub fn keep_process_alive(&self) -> bool {
        self.keep_process_alive
    }

    /// Whether fetches ask the RPC layer for fresh, non-cached data.
    pub fn use_cache_bypass(&self) -> bool {
        self.use_cache_bypass
    }

    /// Number of recent ledger records requested per fetch.
    pub fn recent_window_limit(&self) -> usize {
        self.recent_window_limit
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.polling_interval.is_zero() {
            bail!("polling_interval must be greater than 0");
        }

        if self.retry_timeout.is_zero() {
            bail!("retry_timeout must be greater than 0");
        }

        if self.retry_timeout >= self.polling_interval {
            bail!(
                "retry_timeout ({:?}) must be shorter than polling_interval ({:?})",
                self.retry_timeout,
                self.polling_interval,
            );
        }

        if self.block_reset_duration.is_zero() {
            bail!("block_reset_duration must be greater than 0");
        }

        if self.recent_window_limit == 0 {
            bail!("recent_window_limit must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct TrackerConfigBuilder {
    polling_interval: Option<Duration>,
    retry_timeout: Option<Duration>,
    block_reset_duration: Option<Duration>,
    keep_process_alive: Option<bool>,
    use_cache_bypass: Option<bool>,
    recent_window_limit: Option<usize>,
}

impl TrackerConfigBuilder {
    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = Some(interval);
        self
    }

    pub fn retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = Some(timeout);
        self
    }

    pub fn block_reset_duration(mut self, duration: Duration) -> Self {
        self.block_reset_duration = Some(duration);
        self
    }

    pub fn keep_process_alive(mut self, keep: bool) -> Self {
        self.keep_process_alive = Some(keep);
        self
    }

    pub fn use_cache_bypass(mut self, bypass: bool) -> Self {
        self.use_cache_bypass = Some(bypass);
        self
    }

    pub fn recent_window_limit(mut self, limit: usize) -> Self {
        self.recent_window_limit = Some(limit);
        self
    }

    pub fn build(self) -> Result<TrackerConfig> {
        let polling_interval = self
            .polling_interval
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_POLLING_INTERVAL_SECS));
        let retry_timeout = self
            .retry_timeout
            .unwrap_or_else(|| (polling_interval / 10).max(MIN_RETRY_TIMEOUT));
        let block_reset_duration = self.block_reset_duration.unwrap_or(polling_interval);

        let params = TrackerConfigParams {
            polling_interval,
            retry_timeout,
            block_reset_duration,
            keep_process_alive: self.keep_process_alive.unwrap_or(true),
            use_cache_bypass: self.use_cache_bypass.unwrap_or(false),
            recent_window_limit: self
                .recent_window_limit
                .unwrap_or(DEFAULT_RECENT_WINDOW_LIMIT),
        };

        TrackerConfig::new(params).context("invalid tracker configuration")
    }
}
