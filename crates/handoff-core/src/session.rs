// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session records, their metrics and escalation history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::ConversationContext;
use crate::types::{EscalationOutcome, MessageRole, SessionStatus, new_id};

/// One hand-off between worker types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub from_type: Option<String>,
    pub to_type: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: EscalationOutcome,
}

/// Counters kept per session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub total_messages: u64,
    pub inbound_messages: u64,
    pub outbound_messages: u64,
    pub system_messages: u64,
    pub escalation_count: u64,
    /// Seconds from creation to the end of the session.
    pub resolution_time: Option<f64>,
    /// Seconds between the first and the last message.
    pub interaction_time: f64,
    pub satisfaction_score: Option<f64>,
    pub workers_involved: Vec<String>,
}

impl SessionMetrics {
    /// Recomputes the message-derived counters from the history.
    ///
    /// `escalation_count`, `resolution_time` and `satisfaction_score` are
    /// owned by the lifecycle and left untouched.
    pub fn update_from_context(&mut self, context: &ConversationContext) {
        self.total_messages = context.len() as u64;
        self.inbound_messages = context.count_role(MessageRole::Inbound);
        self.outbound_messages = context.count_role(MessageRole::Outbound);
        self.system_messages = context.count_role(MessageRole::System);
        self.interaction_time = context.interaction_time();
        self.workers_involved = context.workers_involved();
    }
}

/// A customer conversation routed through the coordinator.
///
/// For a non-terminal session `status == Waiting` holds exactly when
/// `current_worker_type` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub customer_id: Option<String>,
    pub status: SessionStatus,
    pub current_worker_type: Option<String>,
    /// Worker type the session asked for, or was escalated to last.
    pub requested_worker_type: String,
    /// Concrete worker whose load was incremented for this session.
    pub assigned_worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metrics: SessionMetrics,
    #[serde(default)]
    pub escalation_history: Vec<EscalationRecord>,
}

impl Session {
    /// Creates an unassigned session. The scheduler moves it out of `Waiting`.
    pub fn new(
        customer_id: Option<String>,
        requested_worker_type: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            customer_id,
            status: SessionStatus::Waiting,
            current_worker_type: None,
            requested_worker_type: requested_worker_type.into(),
            assigned_worker_id: None,
            created_at: now,
            updated_at: now,
            ended_at: None,
            metadata,
            tags: Vec::new(),
            metrics: SessionMetrics::default(),
            escalation_history: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Adds a tag unless already present, keeping insertion order.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn last_escalation(&self) -> Option<&EscalationRecord> {
        self.escalation_history.last()
    }

    /// Whole seconds since creation, or until `ended_at` once ended.
    pub fn duration_seconds(&self, now: DateTime<Utc>) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        (end - self.created_at).num_seconds().max(0)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            customer_id: self.customer_id.clone(),
            status: self.status,
            current_worker_type: self.current_worker_type.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            ended_at: self.ended_at,
            duration_seconds: self.duration_seconds(now),
            total_messages: self.metrics.total_messages,
            escalation_count: self.metrics.escalation_count,
            workers_involved: self.metrics.workers_involved.clone(),
            tags: self.tags.clone(),
            satisfaction_score: self.metrics.satisfaction_score,
            resolution_time: self.metrics.resolution_time,
        }
    }
}

/// Read-only view returned by `get_session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub customer_id: Option<String>,
    pub status: SessionStatus,
    pub current_worker_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub total_messages: u64,
    pub escalation_count: u64,
    pub workers_involved: Vec<String>,
    pub tags: Vec<String>,
    pub satisfaction_score: Option<f64>,
    pub resolution_time: Option<f64>,
}
