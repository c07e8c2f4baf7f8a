// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Handoff coordinator.
//!
//! Only [`SessionNotFound`](HandoffError::SessionNotFound),
//! [`TerminalSession`](HandoffError::TerminalSession),
//! [`InvalidSatisfactionScore`](HandoffError::InvalidSatisfactionScore) and the
//! request validation variants ever reach a caller of the coordinator. The
//! remaining variants are produced by collaborators and degrade into an
//! alternate successful state inside the coordinator.

use thiserror::Error;

use crate::types::SessionStatus;

/// The primary error type used across all Handoff traits and core operations.
#[derive(Debug, Error)]
pub enum HandoffError {
    /// No session with the given id is known.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// The session already reached a terminal status.
    #[error("session {session_id} is already {status}")]
    TerminalSession {
        session_id: String,
        status: SessionStatus,
    },

    /// Satisfaction score outside `[0, 10]`.
    #[error("satisfaction score must be between 0 and 10, got {score}")]
    InvalidSatisfactionScore { score: f64 },

    /// A session can only be ended with a terminal status.
    #[error("{status} is not a terminal resolution")]
    InvalidResolution { status: SessionStatus },

    /// Request validation errors (empty message content, empty worker type).
    #[error("validation error: {0}")]
    Validation(String),

    /// No worker is registered for the requested worker type.
    #[error("no worker available for type {worker_type}")]
    WorkerUnavailable { worker_type: String },

    /// The external generation collaborator failed.
    #[error("generation error: {message}")]
    Generation {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Key-value backend errors (connection, query, serialization).
    #[error("persistence error: {source}")]
    Persistence {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandoffError {
    /// Builds a [`HandoffError::Generation`] without an underlying source.
    pub fn generation(message: impl Into<String>) -> Self {
        HandoffError::Generation {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a [`HandoffError::Persistence`].
    pub fn persistence(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        HandoffError::Persistence {
            source: source.into(),
        }
    }

    /// Whether this error is meant to be surfaced to the API-facing caller.
    pub fn is_caller_visible(&self) -> bool {
        matches!(
            self,
            HandoffError::SessionNotFound { .. }
                | HandoffError::TerminalSession { .. }
                | HandoffError::InvalidSatisfactionScore { .. }
                | HandoffError::InvalidResolution { .. }
                | HandoffError::Validation(_)
        )
    }
}
