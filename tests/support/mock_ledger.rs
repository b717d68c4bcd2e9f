use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct LedgerRecord {
    kind: &'static str,
    version: u64,
}

/// Scriptable ledger state served over JSON-RPC by [`MockLedgerServer`].
#[derive(Clone)]
pub struct MockLedger {
    records: Arc<RwLock<Vec<LedgerRecord>>>,
    error_message: Arc<RwLock<Option<String>>>,
    saw_cache_bypass: Arc<AtomicBool>,
    request_count: Arc<AtomicU64>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            error_message: Arc::new(RwLock::new(None)),
            saw_cache_bypass: Arc::new(AtomicBool::new(false)),
            request_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Appends a block-metadata record, i.e. a new chain head.
    pub fn push_block(&self, version: u64) {
        self.records.write().expect("mock ledger poisoned").push(LedgerRecord {
            kind: "block_metadata_transaction",
            version,
        });
    }

    /// Appends a record the tracker must ignore.
    pub fn push_user_transaction(&self, version: u64) {
        self.records.write().expect("mock ledger poisoned").push(LedgerRecord {
            kind: "user_transaction",
            version,
        });
    }

    /// Makes every `transactions` call fail with an endpoint error until
    /// [`clear_error`](Self::clear_error).
    pub fn set_error(&self, message: impl Into<String>) {
        *self.error_message.write().expect("mock ledger poisoned") = Some(message.into());
    }

    pub fn clear_error(&self) {
        *self.error_message.write().expect("mock ledger poisoned") = None;
    }

    pub fn saw_cache_bypass(&self) -> bool {
        self.saw_cache_bypass.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    fn window(&self, limit: usize) -> Value {
        let records = self.records.read().expect("mock ledger poisoned");
        let start = records.len().saturating_sub(limit);
        Value::Array(
            records[start..]
                .iter()
                .map(|record| json!({ "type": record.kind, "version": record.version }))
                .collect(),
        )
    }
}

pub struct MockLedgerServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockLedgerServer {
    pub async fn start(ledger: MockLedger) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock ledger listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let ledger = ledger.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| serve_request(ledger.clone(), req)))
            }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock ledger server stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(
    ledger: MockLedger,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::POST {
        let mut response = Response::new(Body::from("Unsupported method"));
        *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        return Ok(response);
    }

    let bypass_requested = req
        .headers()
        .get(hyper::header::CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("no-cache"))
        .unwrap_or(false);
    if bypass_requested {
        ledger.saw_cache_bypass.store(true, Ordering::SeqCst);
    }

    let bytes = match body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let mut response = Response::new(Body::from(format!("failed to read body: {err}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            let mut response = Response::new(Body::from(format!("invalid JSON payload: {err}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let response_value = handle_call(&ledger, payload);
    let mut response = Response::new(Body::from(response_value.to_string()));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

fn handle_call(ledger: &MockLedger, call: Value) -> Value {
    ledger.request_count.fetch_add(1, Ordering::SeqCst);

    let id = call.get("id").cloned().unwrap_or(Value::Null);
    let method = call
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(message) = ledger
        .error_message
        .read()
        .expect("mock ledger poisoned")
        .clone()
    {
        return error(id, -32000, message);
    }

    match method.as_str() {
        "transactions" => {
            let limit = call
                .get("params")
                .and_then(|params| params.get("limit"))
                .and_then(Value::as_u64)
                .unwrap_or(20) as usize;
            success(id, ledger.window(limit))
        }
        _ => error(id, -32601, format!("unknown method {method}")),
    }
}

fn success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id,
    })
}

fn error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message.into(),
        },
        "id": id,
    })
}
