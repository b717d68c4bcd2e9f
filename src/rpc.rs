//! Ledger RPC plumbing: the provider capability trait consumed by the
//! tracker and the HTTP JSON-RPC implementation shipped with the crate.

pub mod http;
pub mod options;
pub mod provider;

pub use http::HttpProvider;
pub use options::HttpProviderOptions;
pub use provider::{Provider, ProviderRequest, RpcError};
