// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messages and the per-session conversation history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HandoffError;
use crate::types::{MessageRole, new_id};

/// A single entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Id of the worker that produced an outbound message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    /// Type of the worker that produced an outbound message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_type: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Creates a message, rejecting empty or whitespace-only content.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Result<Self, HandoffError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(HandoffError::Validation(
                "message content cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            id: new_id(),
            role,
            content,
            timestamp: Utc::now(),
            worker_id: None,
            worker_type: None,
            metadata: HashMap::new(),
        })
    }

    pub fn with_worker(mut self, worker_id: impl Into<String>, worker_type: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self.worker_type = Some(worker_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Formats the message as a single transcript line.
    pub fn transcript_line(&self) -> String {
        let speaker = match (self.role, self.worker_type.as_deref()) {
            (MessageRole::Inbound, _) => "Customer".to_string(),
            (MessageRole::Outbound, Some(worker_type)) => format!("Worker ({worker_type})"),
            (MessageRole::Outbound, None) => "Worker".to_string(),
            (MessageRole::System, _) => "System".to_string(),
        };
        format!(
            "[{}] {speaker}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.content
        )
    }
}

/// Ordered, append-only message history of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.updated_at = message.timestamp.max(self.updated_at);
        self.messages.push(message);
    }

    /// The last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn count_role(&self, role: MessageRole) -> u64 {
        self.messages.iter().filter(|m| m.role == role).count() as u64
    }

    /// Seconds between the first and the last message.
    pub fn interaction_time(&self) -> f64 {
        match (self.messages.first(), self.messages.last()) {
            (Some(first), Some(last)) => {
                let elapsed = last.timestamp - first.timestamp;
                (elapsed.num_milliseconds() as f64 / 1000.0).max(0.0)
            }
            _ => 0.0,
        }
    }

    /// Distinct worker types that produced output, in order of first appearance.
    pub fn workers_involved(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for worker_type in self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Outbound)
            .filter_map(|m| m.worker_type.as_ref())
        {
            if !seen.iter().any(|s| s == worker_type) {
                seen.push(worker_type.clone());
            }
        }
        seen
    }

    pub fn to_transcript(&self) -> Vec<String> {
        self.messages.iter().map(Message::transcript_line).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_is_rejected() {
        assert!(matches!(
            Message::new(MessageRole::Inbound, ""),
            Err(HandoffError::Validation(_))
        ));
        assert!(Message::new(MessageRole::Inbound, "   \n\t").is_err());
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let mut ctx = ConversationContext::new("s1");
        for i in 0..15 {
            ctx.push(Message::new(MessageRole::Inbound, format!("msg {i}")).unwrap());
        }
        let recent = ctx.recent(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].content, "msg 5");
        assert_eq!(recent[9].content, "msg 14");
        assert_eq!(ctx.recent(100).len(), 15);
    }

    #[test]
    fn transcript_labels_speakers() {
        let mut ctx = ConversationContext::new("s1");
        ctx.push(Message::new(MessageRole::Inbound, "hello").unwrap());
        ctx.push(
            Message::new(MessageRole::Outbound, "hi there")
                .unwrap()
                .with_worker("cs-1", "customer_service"),
        );
        ctx.push(Message::new(MessageRole::System, "transferring").unwrap());

        let lines = ctx.to_transcript();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("] Customer: hello"));
        assert!(lines[1].ends_with("] Worker (customer_service): hi there"));
        assert!(lines[2].ends_with("] System: transferring"));
        assert!(lines[0].starts_with('['));
    }

    #[test]
    fn workers_involved_is_distinct_and_ordered() {
        let mut ctx = ConversationContext::new("s1");
        for worker_type in ["customer_service", "technical_support", "customer_service"] {
            ctx.push(
                Message::new(MessageRole::Outbound, "reply")
                    .unwrap()
                    .with_worker("w", worker_type),
            );
        }
        assert_eq!(
            ctx.workers_involved(),
            vec!["customer_service".to_string(), "technical_support".to_string()]
        );
    }

    #[test]
    fn serde_skips_empty_optionals() {
        let msg = Message::new(MessageRole::Inbound, "hello").unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("worker_id"));
        assert!(json.contains("\"role\":\"inbound\""));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
