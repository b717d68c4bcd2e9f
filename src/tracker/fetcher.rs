//! Fetch adapter: one request/response cycle against the ledger RPC
//! capability, normalized into a [`Head`].
//!
//! The backing API has no cheap "current head" query, so the adapter asks for
//! a bounded window of the most recent confirmed records and picks the newest
//! block-metadata entry out of it.

use crate::rpc::{Provider, ProviderRequest};
use crate::tracker::head::Head;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Record type marking a ledger checkpoint; all other entry types in the
/// window are discarded.
const HEAD_RECORD_TYPE: &str = "block_metadata_transaction";
const TRANSACTIONS_METHOD: &str = "transactions";

#[derive(Debug, Deserialize)]
struct LedgerRecord {
    #[serde(rename = "type")]
    kind: String,
    /// The ledger encodes versions as JSON numbers or decimal strings
    /// depending on the endpoint revision; both forms are accepted.
    #[serde(default)]
    version: Option<Value>,
}

/// Issues `transactions` window requests and selects the newest head record.
pub struct HeadFetcher {
    provider: Arc<dyn Provider>,
    skip_cache: bool,
    window_limit: usize,
    request_ids: AtomicU64,
}

impl HeadFetcher {
    pub fn new(provider: Arc<dyn Provider>, skip_cache: bool, window_limit: usize) -> Self {
        Self {
            provider,
            skip_cache,
            window_limit,
            request_ids: AtomicU64::new(0),
        }
    }

    /// Performs exactly one fetch and returns the newest observed head, or
    /// [`Head::EMPTY`] when the window contains no qualifying record.
    pub async fn fetch_latest(&self) -> Result<Head> {
        let request = ProviderRequest {
            id: self.request_ids.fetch_add(1, Ordering::Relaxed),
            method: TRANSACTIONS_METHOD.to_owned(),
            params: json!({ "limit": self.window_limit }),
            skip_cache: self.skip_cache,
        };

        let response = self
            .provider
            .send(request)
            .await
            .map_err(anyhow::Error::new)
            .context("failed to fetch recent ledger records")?;

        let records: Vec<LedgerRecord> = serde_json::from_value(response)
            .context("ledger returned a malformed transactions payload")?;

        // The window arrives oldest-first; the newest head record wins.
        let Some(record) = records
            .iter()
            .rev()
            .find(|record| record.kind == HEAD_RECORD_TYPE)
        else {
            tracing::trace!(
                window = records.len(),
                "no head records in the recent window"
            );
            return Ok(Head::EMPTY);
        };

        let head = match &record.version {
            Some(version) => Head::new(
                parse_version(version)
                    .context("head record carried an unreadable version number")?,
            ),
            None => Head::EMPTY,
        };
        tracing::trace!(%head, "selected head record from window");
        Ok(head)
    }
}

fn parse_version(value: &Value) -> Result<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .with_context(|| format!("version {number} is not an unsigned integer")),
        Value::String(text) => text
            .parse::<u64>()
            .with_context(|| format!("version {text:?} is not a decimal integer")),
        other => bail!("unsupported version encoding: {other}"),
    }
}
