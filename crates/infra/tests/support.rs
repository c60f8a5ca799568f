//! Shared helpers for dispatcher integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_domain::DispatcherConfig;
use courier_infra::http::{
    Transport, TransportError, TransportErrorKind, TransportRequest, TransportResponse,
};
use courier_infra::Dispatcher;
use parking_lot::Mutex;
use tokio::time::Instant;

/// What the scripted transport does for one call
#[derive(Debug, Clone)]
pub enum Step {
    Respond { status: u16, body: String },
    Fail(TransportErrorKind),
    /// Never answers; only a deadline ends the call
    Hang,
}

impl Step {
    pub fn ok(body: &str) -> Self {
        Self::Respond { status: 200, body: body.to_string() }
    }

    pub fn status(status: u16) -> Self {
        Self::Respond { status, body: String::new() }
    }
}

/// A call the transport received and when
#[derive(Debug, Clone)]
pub struct Call {
    pub at: Instant,
    pub request: TransportRequest,
}

/// In-memory transport replaying a script, then a fallback step forever
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Mutex<Step>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new(fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Queue a one-off step ahead of the fallback
    pub fn push(&self, step: Step) {
        self.script.lock().push_back(step);
    }

    pub fn set_fallback(&self, step: Step) {
        *self.fallback.lock() = step;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Offsets of every call from `start`, in arrival order
    pub fn offsets_since(&self, start: Instant) -> Vec<Duration> {
        self.calls.lock().iter().map(|call| call.at.saturating_duration_since(start)).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push(Call { at: Instant::now(), request });

        let step = self.script.lock().pop_front().unwrap_or_else(|| self.fallback.lock().clone());
        match step {
            Step::Respond { status, body } => Ok(TransportResponse::new(status, body)),
            Step::Fail(kind) => Err(TransportError::new(kind, "scripted failure")),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// Config with small, test-friendly numbers
pub fn test_config() -> DispatcherConfig {
    let mut config = DispatcherConfig::new("https://api.example.test");
    config.retry.initial_delay = Duration::from_millis(1_000);
    config.retry.max_delay = Duration::from_millis(10_000);
    config.circuit.failure_threshold = 3;
    config.circuit.reset_timeout = Duration::from_secs(10);
    config.rate_limit.queue_delay = Duration::ZERO;
    config
}

pub fn dispatcher_with(config: DispatcherConfig, transport: Arc<ScriptedTransport>) -> Dispatcher {
    Dispatcher::builder()
        .config(config)
        .transport(transport)
        .build()
        .expect("dispatcher should build")
}
