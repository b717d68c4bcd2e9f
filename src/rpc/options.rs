//! Configurable knobs for the HTTP provider along with validation so callers
//! can reason about timeouts and payload limits.

use anyhow::{bail, Result};
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 32;
const DEFAULT_HTTP_BODY_LIMIT_BYTES: u32 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpProviderOptions {
    /// Upper bound applied to every call, both in the underlying client and
    /// as an outer `tokio::time::timeout` so a wedged connection cannot
    /// stall the polling loop indefinitely.
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub max_response_body_bytes: u32,
}

impl Default for HttpProviderOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_response_body_bytes: DEFAULT_HTTP_BODY_LIMIT_BYTES,
        }
    }
}

impl HttpProviderOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }
        if self.max_concurrent_requests == 0 {
            bail!("max_concurrent_requests must be greater than 0");
        }
        if self.max_response_body_bytes == 0 {
            bail!("max_response_body_bytes must be greater than 0");
        }
        Ok(())
    }
}
