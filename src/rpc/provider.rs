//! The ledger RPC capability consumed by the tracker.
//!
//! The tracker never talks to a transport directly; it holds a
//! [`Provider`] trait object and shapes [`ProviderRequest`]s for it. The
//! crate ships one implementation ([`HttpProvider`](super::HttpProvider));
//! embedders with their own RPC plumbing implement the trait themselves.

use futures::future::BoxFuture;
use serde_json::Value;

/// One request against the ledger endpoint.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Correlation id, stamped by the caller. Providers that multiplex
    /// requests may use it; others are free to ignore it.
    pub id: u64,
    /// Logical method or resource name, e.g. `transactions`.
    pub method: String,
    /// Method parameters as a JSON object or array.
    pub params: Value,
    /// Hint asking the RPC layer to skip any intermediate response cache.
    pub skip_cache: bool,
}

/// Asynchronous ledger RPC client capability.
///
/// `send` resolves to the response's result payload, or an [`RpcError`]
/// carrying the underlying transport or endpoint error.
pub trait Provider: Send + Sync {
    fn send(&self, request: ProviderRequest) -> BoxFuture<'_, Result<Value, RpcError>>;
}

/// Failure reported by the RPC capability during a fetch.
#[derive(Debug)]
pub enum RpcError {
    /// The call did not resolve within the provider's per-call bound.
    Timeout { method: String },
    /// The transport failed before a response payload was produced.
    Transport { method: String, message: String },
    /// The endpoint answered with an error payload.
    Endpoint {
        method: String,
        code: i32,
        message: String,
        data: Option<Value>,
    },
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Timeout { method } => write!(f, "rpc method {method} timed out"),
            RpcError::Transport { method, message } => {
                write!(f, "rpc {method} transport failed: {message}")
            }
            RpcError::Endpoint {
                method,
                code,
                message,
                data,
            } => {
                write!(f, "rpc {method} call failed (code={code}, message={message}")?;
                if let Some(data) = data {
                    write!(f, ", data={data}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl std::error::Error for RpcError {}
