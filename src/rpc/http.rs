//! JSON-RPC HTTP implementation of the [`Provider`] capability.

use crate::rpc::options::HttpProviderOptions;
use crate::rpc::provider::{Provider, ProviderRequest, RpcError};
use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use jsonrpsee::core::client::{ClientT, Error as JsonRpcError};
use jsonrpsee::core::params::{ArrayParams, ObjectParams};
use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient, HttpClientBuilder};
use serde_json::Value;
use tokio::time::timeout;

/// [`Provider`] backed by `jsonrpsee`'s HTTP client.
///
/// Two clients are built at construction time: the default one and a
/// cache-bypass twin carrying `Cache-Control: no-cache` headers. Requests
/// flagged with `skip_cache` go through the twin, since per-request headers
/// cannot be attached after the client is built.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: HttpClient,
    bypass_client: HttpClient,
    options: HttpProviderOptions,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(url, HttpProviderOptions::default())
    }

    pub fn with_options(url: impl Into<String>, options: HttpProviderOptions) -> Result<Self> {
        options.validate()?;
        let url = url.into();
        validate_url(&url)?;

        let client = build_client(&url, &options, HeaderMap::new())?;
        let bypass_client = build_client(&url, &options, cache_bypass_headers()?)?;

        Ok(Self {
            client,
            bypass_client,
            options,
        })
    }

    async fn dispatch(&self, request: ProviderRequest) -> Result<Value, RpcError> {
        let client = if request.skip_cache {
            &self.bypass_client
        } else {
            &self.client
        };
        let method = request.method;

        // The client enforces its own request timeout; the outer bound covers
        // anything the transport layer fails to account for.
        let call = async {
            match request.params {
                Value::Object(fields) => {
                    let mut params = ObjectParams::new();
                    for (name, value) in fields {
                        params
                            .insert(&name, value)
                            .map_err(|err| serialize_error(&method, err))?;
                    }
                    client.request::<Value, _>(&method, params).await
                }
                Value::Array(items) => {
                    let mut params = ArrayParams::new();
                    for value in items {
                        params
                            .insert(value)
                            .map_err(|err| serialize_error(&method, err))?;
                    }
                    client.request::<Value, _>(&method, params).await
                }
                Value::Null => {
                    client
                        .request::<Value, _>(&method, ArrayParams::new())
                        .await
                }
                other => {
                    return Err(serialize_error(
                        &method,
                        anyhow!("unsupported params shape: {other}"),
                    ))
                }
            }
        };

        match timeout(self.options.request_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(map_rpc_error(&method, err)),
            Err(_) => Err(RpcError::Timeout { method }),
        }
    }
}

impl Provider for HttpProvider {
    fn send(&self, request: ProviderRequest) -> BoxFuture<'_, Result<Value, RpcError>> {
        Box::pin(self.dispatch(request))
    }
}

fn build_client(
    url: &str,
    options: &HttpProviderOptions,
    headers: HeaderMap,
) -> Result<HttpClient> {
    HttpClientBuilder::default()
        .set_headers(headers)
        .request_timeout(options.request_timeout)
        .max_concurrent_requests(options.max_concurrent_requests)
        .max_response_size(options.max_response_body_bytes)
        .build(url)
        .map_err(|err| anyhow!("failed to build ledger RPC client: {err}"))
}

fn cache_bypass_headers() -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let no_cache = HeaderValue::from_static("no-cache");
    headers.insert("Cache-Control", no_cache.clone());
    headers.insert("Pragma", no_cache);
    Ok(headers)
}

fn validate_url(url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("ledger RPC url must start with http:// or https://");
    }
    Ok(())
}

fn serialize_error(method: &str, err: impl std::fmt::Display) -> JsonRpcError {
    JsonRpcError::Custom(format!("failed to serialize {method} params: {err}"))
}

fn map_rpc_error(method: &str, err: JsonRpcError) -> RpcError {
    match err {
        JsonRpcError::Call(object) => {
            let data = object
                .data()
                .and_then(|raw| serde_json::from_str(raw.get()).ok());
            RpcError::Endpoint {
                method: method.to_owned(),
                code: object.code(),
                message: object.message().to_owned(),
                data,
            }
        }
        JsonRpcError::RequestTimeout => RpcError::Timeout {
            method: method.to_owned(),
        },
        other => RpcError::Transport {
            method: method.to_owned(),
            message: other.to_string(),
        },
    }
}
