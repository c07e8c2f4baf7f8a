// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword-based escalation detection.
//!
//! Rules are substring matches on the lowercased message, checked in order;
//! the first match names the target worker type. No NLU, no network.

use handoff_config::WorkerConfig;

/// Decides whether a customer message should be handed to another worker type.
pub trait EscalationPolicy: Send + Sync {
    /// Returns the target worker type, or `None` to keep the conversation.
    fn detect(&self, message: &str) -> Option<String>;
}

/// Routing rules of the `customer_service` worker type.
const CUSTOMER_SERVICE_RULES: &[(&str, &str)] = &[
    ("not working", "technical_support"),
    ("broken", "technical_support"),
    ("error", "technical_support"),
    ("bug", "technical_support"),
    ("crash", "technical_support"),
    ("technical issue", "technical_support"),
    ("troubleshoot", "technical_support"),
    ("installation", "technical_support"),
    ("configuration", "technical_support"),
    ("buy", "sales_specialist"),
    ("purchase", "sales_specialist"),
    ("pricing", "sales_specialist"),
    ("cost", "sales_specialist"),
    ("discount", "sales_specialist"),
    ("quote", "sales_specialist"),
    ("proposal", "sales_specialist"),
    ("compare products", "sales_specialist"),
    ("upgrade", "sales_specialist"),
    ("subscription", "sales_specialist"),
    ("speak to manager", "supervisor"),
    ("supervisor", "supervisor"),
    ("escalate", "supervisor"),
    ("file complaint", "supervisor"),
    ("very frustrated", "supervisor"),
    ("legal", "supervisor"),
    ("lawsuit", "supervisor"),
];

/// Routing rules of the `technical_support` worker type.
const TECHNICAL_SUPPORT_RULES: &[(&str, &str)] = &[
    ("system down", "development_team"),
    ("outage", "development_team"),
    ("all users affected", "development_team"),
    ("critical bug", "development_team"),
    ("data corruption", "development_team"),
    ("security breach", "security_team"),
    ("vulnerability", "security_team"),
    ("still not working", "senior_technical_support"),
    ("tried everything", "senior_technical_support"),
    ("production down", "senior_technical_support"),
    ("data loss", "senior_technical_support"),
    ("refund", "customer_service"),
    ("cancel subscription", "customer_service"),
    ("pricing", "sales_specialist"),
    ("upgrade", "sales_specialist"),
    ("different product", "sales_specialist"),
];

/// Routing rules of the `sales_specialist` worker type.
const SALES_SPECIALIST_RULES: &[(&str, &str)] = &[
    ("enterprise", "account_manager"),
    ("large company", "account_manager"),
    ("custom contract", "account_manager"),
    ("bulk pricing", "account_manager"),
    ("negotiate", "account_manager"),
    ("custom development", "solutions_architect"),
    ("api integration", "solutions_architect"),
    ("special requirements", "solutions_architect"),
    ("modify product", "solutions_architect"),
    ("technical integration", "technical_sales_engineer"),
    ("contract terms", "legal_team"),
    ("legal question", "legal_team"),
    ("liability", "legal_team"),
    ("compliance", "legal_team"),
    ("data privacy", "legal_team"),
    ("technical issue", "technical_support"),
    ("not working", "technical_support"),
    ("bug", "technical_support"),
    ("implementation help", "technical_support"),
];

/// Signals of an unhappy customer, routed to the frustration target.
const FRUSTRATION_INDICATORS: &[&str] = &[
    "frustrated",
    "angry",
    "upset",
    "terrible",
    "worst",
    "horrible",
    "unacceptable",
    "speak to manager",
];

/// Built-in rules for a worker type; empty for unknown types.
pub fn builtin_rules(worker_type: &str) -> &'static [(&'static str, &'static str)] {
    match worker_type {
        "customer_service" => CUSTOMER_SERVICE_RULES,
        "technical_support" => TECHNICAL_SUPPORT_RULES,
        "sales_specialist" => SALES_SPECIALIST_RULES,
        _ => &[],
    }
}

/// Ordered keyword rules plus an optional frustration fallback.
#[derive(Debug, Clone, Default)]
pub struct KeywordEscalationPolicy {
    rules: Vec<(String, String)>,
    frustration_target: Option<String>,
}

impl KeywordEscalationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy with the built-in rules for `worker_type` and the `supervisor`
    /// frustration target.
    pub fn for_worker_type(worker_type: &str) -> Self {
        Self::new()
            .with_rules(builtin_rules(worker_type).iter().copied())
            .with_frustration_target("supervisor")
    }

    /// Policy described by a `[[workers]]` entry: configured rules first,
    /// then the built-in ones when enabled.
    pub fn from_config(config: &WorkerConfig) -> Self {
        let mut policy = Self::new().with_rules(
            config
                .escalation_rules
                .iter()
                .map(|r| (r.pattern.as_str(), r.target.as_str())),
        );
        if config.builtin_rules {
            policy = policy.with_rules(builtin_rules(&config.worker_type).iter().copied());
        }
        if let Some(target) = &config.frustration_target {
            policy = policy.with_frustration_target(target.clone());
        }
        policy
    }

    pub fn with_rules<'a>(mut self, rules: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.rules.extend(
            rules
                .into_iter()
                .map(|(pattern, target)| (pattern.to_lowercase(), target.to_string())),
        );
        self
    }

    pub fn with_frustration_target(mut self, target: impl Into<String>) -> Self {
        self.frustration_target = Some(target.into());
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl EscalationPolicy for KeywordEscalationPolicy {
    fn detect(&self, message: &str) -> Option<String> {
        let lower = message.to_lowercase();

        if let Some((pattern, target)) = self.rules.iter().find(|(p, _)| lower.contains(p.as_str())) {
            tracing::debug!(%pattern, %target, "escalation rule matched");
            return Some(target.clone());
        }

        let target = self.frustration_target.as_ref()?;
        FRUSTRATION_INDICATORS
            .iter()
            .any(|indicator| lower.contains(indicator))
            .then(|| target.clone())
    }
}
