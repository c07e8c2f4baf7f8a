// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Handoff session coordinator.
//!
//! This crate provides the error taxonomy, the domain types (sessions,
//! messages, workers, metrics) and the collaborator traits the coordinator
//! is built against.

pub mod error;
pub mod message;
pub mod session;
pub mod traits;
pub mod types;
pub mod worker;

// Re-export key items at crate root for ergonomic imports.
pub use error::HandoffError;
pub use message::{ConversationContext, Message};
pub use session::{EscalationRecord, Session, SessionMetrics, SessionSummary};
pub use traits::{GenerationRequest, KeyValueStore, WorkerBehavior, WorkerReply};
pub use types::{
    EscalationOutcome, HealthStatus, MessageRole, SessionStatus, SystemMetrics, WorkerMetrics,
    WorkerWorkload, new_id,
};
pub use worker::Worker;
