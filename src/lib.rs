//! Polling chain-head tracker.
//!
//! `headwatch` watches a ledger RPC endpoint for the newest block-metadata
//! record and notifies subscribers exactly once per new head. Transient RPC
//! failures are retried on a shorter interval and reported on a dedicated
//! `error` channel; a staleness timer invalidates the cached head when no
//! fresh confirmation arrives in time.

pub mod rpc;
pub mod runtime;
pub mod tracker;

pub use rpc::{HttpProvider, HttpProviderOptions, Provider, ProviderRequest, RpcError};
pub use runtime::config::{TrackerConfig, TrackerConfigBuilder, TrackerConfigParams};
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use tracker::core::{HeadTracker, HeadTrackerBuilder};
pub use tracker::events::{EventKind, Subscription, SubscriptionId, TrackerEvent};
pub use tracker::fetcher::HeadFetcher;
pub use tracker::head::Head;
