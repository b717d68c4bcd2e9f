use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use headwatch::{Provider, ProviderRequest, RpcError};
use serde_json::{json, Value};
use tokio::time::Instant;

/// One scripted fetch outcome.
#[derive(Debug, Clone)]
pub enum Step {
    /// A window whose newest record is a head with this version.
    Head(u64),
    /// A raw transactions window payload.
    Window(Value),
    /// An endpoint failure with this message.
    Fail(&'static str),
}

impl Step {
    fn into_response(self, method: String) -> Result<Value, RpcError> {
        match self {
            Step::Head(version) => Ok(json!([
                { "type": "user_transaction", "version": version.saturating_sub(1) },
                { "type": "block_metadata_transaction", "version": version },
            ])),
            Step::Window(window) => Ok(window),
            Step::Fail(message) => Err(RpcError::Endpoint {
                method,
                code: -32000,
                message: message.to_owned(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: ProviderRequest,
    pub at: Instant,
}

/// In-process provider that replays a script of fetch outcomes and records
/// every request with its (tokio-clock) arrival time, so paused-time tests
/// can assert exact retry spacing.
pub struct MockProvider {
    steps: Mutex<VecDeque<Step>>,
    fallback: Mutex<Step>,
    requests: Mutex<Vec<RecordedRequest>>,
    response_delay: Duration,
}

impl MockProvider {
    /// Provider that replays `steps` then keeps returning `fallback`.
    pub fn scripted(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback: Mutex::new(fallback),
            requests: Mutex::new(Vec::new()),
            response_delay: Duration::ZERO,
        })
    }

    /// Provider that always returns the same outcome.
    pub fn repeating(step: Step) -> Arc<Self> {
        Self::scripted([], step)
    }

    /// Same as [`scripted`](Self::scripted), with every response delayed so
    /// tests can overlap calls deliberately.
    pub fn scripted_with_delay(
        steps: impl IntoIterator<Item = Step>,
        fallback: Step,
        response_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback: Mutex::new(fallback),
            requests: Mutex::new(Vec::new()),
            response_delay,
        })
    }

    pub fn set_fallback(&self, step: Step) {
        *self.fallback.lock().unwrap() = step;
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Gaps between consecutive requests, in arrival order.
    pub fn request_gaps(&self) -> Vec<Duration> {
        let requests = self.requests.lock().unwrap();
        requests
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }
}

impl Provider for MockProvider {
    fn send(&self, request: ProviderRequest) -> BoxFuture<'_, Result<Value, RpcError>> {
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone());
        let method = request.method.clone();
        self.requests.lock().unwrap().push(RecordedRequest {
            request,
            at: Instant::now(),
        });
        let delay = self.response_delay;

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            step.into_response(method)
        })
    }
}
