// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template-driven worker behaviour.

use std::sync::Arc;

use async_trait::async_trait;

use handoff_config::WorkerConfig;
use handoff_core::{GenerationRequest, HandoffError, Worker, WorkerBehavior, WorkerReply};

use crate::escalation::{EscalationPolicy, KeywordEscalationPolicy};

/// Default reply template for a worker type.
pub fn default_template(worker_type: &str) -> &'static str {
    match worker_type {
        "customer_service" => {
            "Thanks for reaching out! I'm happy to help with \"{message}\". Could you share a few more details?"
        }
        "technical_support" => {
            "Let's troubleshoot \"{message}\" together. Which version are you running, and what have you tried so far?"
        }
        "sales_specialist" => {
            "Great question about \"{message}\". I can walk you through our plans and find the best fit for your team."
        }
        "supervisor" => {
            "I'm sorry about the trouble so far. I've reviewed your conversation and will personally make sure \"{message}\" gets resolved."
        }
        _ => "The {worker_type} team has received \"{message}\" and is looking into it.",
    }
}

/// Answers with a fixed template and asks its policy whether to escalate.
pub struct TemplateBehavior {
    worker_type: String,
    template: String,
    policy: Arc<dyn EscalationPolicy>,
}

impl TemplateBehavior {
    pub fn new(
        worker_type: impl Into<String>,
        template: impl Into<String>,
        policy: Arc<dyn EscalationPolicy>,
    ) -> Self {
        Self {
            worker_type: worker_type.into(),
            template: template.into(),
            policy,
        }
    }

    /// Behaviour with the default template and built-in rules for the type.
    pub fn for_worker_type(worker_type: &str) -> Self {
        Self::new(
            worker_type,
            default_template(worker_type),
            Arc::new(KeywordEscalationPolicy::for_worker_type(worker_type)),
        )
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        let template = config
            .reply_template
            .clone()
            .unwrap_or_else(|| default_template(&config.worker_type).to_string());
        Self::new(
            config.worker_type.clone(),
            template,
            Arc::new(KeywordEscalationPolicy::from_config(config)),
        )
    }

    fn render(&self, message: &str) -> String {
        self.template
            .replace("{worker_type}", &self.worker_type)
            .replace("{message}", message.trim())
    }
}

#[async_trait]
impl WorkerBehavior for TemplateBehavior {
    async fn handle(&self, request: &GenerationRequest) -> Result<WorkerReply, HandoffError> {
        Ok(WorkerReply {
            text: self.render(&request.message),
            escalate_to: self.policy.detect(&request.message),
        })
    }
}

/// Builds a registered worker from a `[[workers]]` entry.
pub fn worker_from_config(config: &WorkerConfig) -> Worker {
    Worker::new(
        config.id.clone(),
        config.worker_type.clone(),
        Arc::new(TemplateBehavior::from_config(config)),
    )
}

/// Roster used when no `[[workers]]` are configured.
pub fn default_roster() -> Vec<WorkerConfig> {
    [
        ("cs-1", "customer_service"),
        ("cs-2", "customer_service"),
        ("ts-1", "technical_support"),
        ("sales-1", "sales_specialist"),
        ("supervisor-1", "supervisor"),
    ]
    .into_iter()
    .map(|(id, worker_type)| WorkerConfig {
        id: id.to_string(),
        worker_type: worker_type.to_string(),
        reply_template: None,
        escalation_rules: Vec::new(),
        builtin_rules: true,
        frustration_target: (worker_type != "supervisor").then(|| "supervisor".to_string()),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message: &str) -> GenerationRequest {
        GenerationRequest {
            session_id: "s1".into(),
            message: message.into(),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn renders_template_and_detects_escalation() {
        let behavior = TemplateBehavior::for_worker_type("customer_service");
        let reply = behavior.handle(&request("  my login is broken ")).await.unwrap();
        assert!(reply.text.contains("\"my login is broken\""));
        assert_eq!(reply.escalate_to.as_deref(), Some("technical_support"));
    }

    #[tokio::test]
    async fn custom_template_from_config() {
        let mut config = default_roster().remove(0);
        config.reply_template = Some("[{worker_type}] got: {message}".into());
        let worker = worker_from_config(&config);
        assert_eq!(worker.id(), "cs-1");
        let reply = worker.behavior().handle(&request("hello")).await.unwrap();
        assert_eq!(reply.text, "[customer_service] got: hello");
        assert_eq!(reply.escalate_to, None);
    }

    #[test]
    fn default_roster_covers_builtin_types() {
        let roster = default_roster();
        for worker_type in ["customer_service", "technical_support", "sales_specialist", "supervisor"] {
            assert!(roster.iter().any(|w| w.worker_type == worker_type));
        }
        let supervisor = roster.iter().find(|w| w.worker_type == "supervisor").unwrap();
        assert_eq!(supervisor.frustration_target, None);
    }
}
