// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker behaviours for deterministic tests.

use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use handoff_core::{GenerationRequest, HandoffError, HealthStatus, WorkerBehavior, WorkerReply};

/// A worker behaviour that replays a queue of outcomes.
///
/// Each call pops the next entry: `Ok` is returned as the reply, `Err` as a
/// generation error. When the queue is empty, a default "mock response" is
/// returned. Every request is recorded for later assertions.
pub struct ScriptedWorker {
    script: Mutex<VecDeque<Result<WorkerReply, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    health: StdMutex<HealthStatus>,
}

impl ScriptedWorker {
    pub fn new() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<Result<WorkerReply, String>>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from(script)),
            requests: Mutex::new(Vec::new()),
            health: StdMutex::new(HealthStatus::Healthy),
        }
    }

    /// Pre-loaded with plain text replies.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(
            replies
                .into_iter()
                .map(|text| Ok(WorkerReply::text(text)))
                .collect(),
        )
    }

    pub async fn push_reply(&self, reply: WorkerReply) {
        self.script.lock().await.push_back(Ok(reply));
    }

    pub async fn push_failure(&self, message: impl Into<String>) {
        self.script.lock().await.push_back(Err(message.into()));
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub fn set_health(&self, status: HealthStatus) {
        if let Ok(mut health) = self.health.lock() {
            *health = status;
        }
    }
}

impl Default for ScriptedWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerBehavior for ScriptedWorker {
    async fn handle(&self, request: &GenerationRequest) -> Result<WorkerReply, HandoffError> {
        self.requests.lock().await.push(request.clone());
        match self.script.lock().await.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(HandoffError::generation(message)),
            None => Ok(WorkerReply::text("mock response")),
        }
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        self.health
            .lock()
            .map(|h| h.clone())
            .map_err(|_| HandoffError::Internal("health lock poisoned".into()))
    }
}

/// A worker behaviour that always fails.
#[derive(Default)]
pub struct FailingWorker {
    calls: AtomicUsize,
}

impl FailingWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerBehavior for FailingWorker {
    async fn handle(&self, _request: &GenerationRequest) -> Result<WorkerReply, HandoffError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(HandoffError::generation("upstream model unavailable"))
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Unhealthy("always failing".into()))
    }
}

/// A worker behaviour that parks every request until released.
///
/// [`entered`](GatedWorker::entered) resolves once a request is inside
/// `handle`; [`release`](GatedWorker::release) lets one request finish.
pub struct GatedWorker {
    reply: WorkerReply,
    entered: Notify,
    gate: Notify,
}

impl GatedWorker {
    pub fn new(reply: WorkerReply) -> Self {
        Self {
            reply,
            entered: Notify::new(),
            gate: Notify::new(),
        }
    }

    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl WorkerBehavior for GatedWorker {
    async fn handle(&self, _request: &GenerationRequest) -> Result<WorkerReply, HandoffError> {
        self.entered.notify_one();
        self.gate.notified().await;
        Ok(self.reply.clone())
    }
}
