// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker behaviour contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HandoffError;
use crate::message::Message;
use crate::types::HealthStatus;

/// Input handed to a worker for one customer message.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub session_id: String,
    /// The customer message being answered.
    pub message: String,
    /// Recent history, oldest first, excluding `message`.
    pub history: Vec<Message>,
}

/// What a worker produced for a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerReply {
    pub text: String,
    /// Worker type the conversation should be handed to, if any.
    pub escalate_to: Option<String>,
}

impl WorkerReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            escalate_to: None,
        }
    }

    pub fn escalating(text: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            escalate_to: Some(target.into()),
        }
    }
}

/// Pluggable conversation handler.
///
/// Implementations wrap response generation and escalation detection; the
/// coordinator only sees the reply text and the optional target type.
#[async_trait]
pub trait WorkerBehavior: Send + Sync + 'static {
    /// Produces a reply for the request. Errors are retried by the caller.
    async fn handle(&self, request: &GenerationRequest) -> Result<WorkerReply, HandoffError>;

    /// Reports whether the behaviour can currently serve requests.
    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Healthy)
    }
}
