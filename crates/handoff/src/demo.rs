// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `handoff demo` command implementation.
//!
//! Plays scripted customer conversations through an in-process coordinator
//! and prints each exchange, the session analytics and the system rollup.

use std::collections::HashMap;

use colored::Colorize;

use handoff_config::{HandoffConfig, PersistenceBackend};
use handoff_coordinator::{Coordinator, MessageOutcome};
use handoff_core::{HandoffError, SessionStatus, SessionSummary, SystemMetrics};

use crate::serve::build_coordinator;

/// One scripted conversation.
pub(crate) struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub messages: &'static [&'static str],
    pub satisfaction: f64,
}

pub(crate) const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "Technical Support Issue",
        description: "Customer experiences a software crash and gets routed to technical support",
        messages: &[
            "Hi, I need help with your software",
            "The application keeps crashing when I try to export data",
            "I get an error code: EX-500",
            "I've tried restarting but it's still not working",
            "This is affecting our entire team's productivity",
        ],
        satisfaction: 8.0,
    },
    Scenario {
        name: "Enterprise Sales Inquiry",
        description: "Large company inquiring about pricing and features",
        messages: &[
            "Hello, I'm interested in your enterprise solution",
            "We're a Fortune 500 company with 10,000 employees",
            "What's your pricing for large organizations?",
            "Do you offer volume discounts?",
            "We'd also need API integration with our existing systems",
        ],
        satisfaction: 8.0,
    },
    Scenario {
        name: "Frustrated Customer",
        description: "Customer is upset and asks for a manager",
        messages: &[
            "This is absolutely unacceptable!",
            "I've been having issues for weeks now",
            "I want to speak to a manager immediately",
            "I'm considering switching to your competitor",
        ],
        satisfaction: 4.0,
    },
    Scenario {
        name: "Mixed Technical and Sales Inquiry",
        description: "Customer with both technical questions and purchasing interest",
        messages: &[
            "Hi, I'm evaluating your product",
            "First, I have some technical questions",
            "Does your API support webhook notifications?",
            "What's the rate limit for API calls?",
            "Now, about pricing - what's the cost for 50 users?",
            "Do you have a free trial available?",
        ],
        satisfaction: 8.0,
    },
];

/// Runs the `handoff demo` command.
pub async fn run_demo(mut config: HandoffConfig, use_color: bool) -> Result<(), HandoffError> {
    if config.persistence.backend == PersistenceBackend::Sqlite {
        // Keep demo sessions out of the real database.
        config.persistence.backend = PersistenceBackend::Memory;
    }
    colored::control::set_override(use_color);

    let coordinator = build_coordinator(&config).await?;
    for (index, scenario) in SCENARIOS.iter().enumerate() {
        let customer_id = format!("demo_{}", 1000 + index);
        let (outcomes, summary) = play(&coordinator, scenario, customer_id).await?;
        print_scenario(scenario, &outcomes, &summary);
    }

    print_system_metrics(&coordinator.get_system_metrics().await);
    Ok(())
}

/// Plays one scenario from session creation to its end.
pub(crate) async fn play(
    coordinator: &Coordinator,
    scenario: &Scenario,
    customer_id: String,
) -> Result<(Vec<(String, MessageOutcome)>, SessionSummary), HandoffError> {
    let created = coordinator
        .create_session(Some(customer_id), None, HashMap::new())
        .await?;

    let mut outcomes = Vec::with_capacity(scenario.messages.len());
    for message in scenario.messages {
        let outcome = coordinator.send_message(&created.session_id, message).await?;
        outcomes.push((message.to_string(), outcome));
    }

    let summary = coordinator
        .end_session(
            &created.session_id,
            SessionStatus::Resolved,
            Some(scenario.satisfaction),
        )
        .await?;
    Ok((outcomes, summary))
}

fn print_scenario(
    scenario: &Scenario,
    outcomes: &[(String, MessageOutcome)],
    summary: &SessionSummary,
) {
    println!();
    println!("  {}", "=".repeat(60));
    println!("  {}", scenario.name.bold());
    println!("  {}", scenario.description.dimmed());
    println!("  {}", "=".repeat(60));
    println!("  Session: {}", summary.session_id);

    for (message, outcome) in outcomes {
        println!();
        println!("    {} {message}", "Customer:".cyan());
        let speaker = outcome
            .responding_worker_type
            .as_deref()
            .unwrap_or("system");
        println!("    {} {}", format!("{speaker}:").green(), outcome.response_text);
        if outcome.escalated {
            println!("      {}", "escalated to a specialist".yellow());
        }
        if outcome.fallback {
            println!("      {}", "fallback reply".red());
        }
    }

    println!();
    println!(
        "  Ended: {} (satisfaction {}/10)",
        summary.status.to_string().green(),
        scenario.satisfaction
    );
    println!("    Total messages:   {}", summary.total_messages);
    println!("    Escalations:      {}", summary.escalation_count);
    println!("    Workers involved: {}", summary.workers_involved.join(", "));
    println!("    Tags:             {}", summary.tags.join(", "));
}

fn print_system_metrics(rollup: &SystemMetrics) {
    println!();
    println!("  {}", "System Metrics".bold());
    println!("  {}", "-".repeat(35));
    println!("    Total sessions:      {}", rollup.total_sessions);
    println!("    Active sessions:     {}", rollup.active_sessions);
    println!("    Completed sessions:  {}", rollup.completed_sessions);
    println!("    Total escalations:   {}", rollup.total_escalations);
    println!("    Escalation rate:     {:.2}", rollup.escalation_rate);
    println!(
        "    Avg resolution time: {:.1}s",
        rollup.average_resolution_time_secs
    );
    println!("    Avg worker latency:  {:.2}ms", rollup.average_latency_ms);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn coordinator() -> Coordinator {
        let mut config = HandoffConfig::default();
        config.persistence.backend = PersistenceBackend::None;
        build_coordinator(&config).await.unwrap()
    }

    #[tokio::test]
    async fn technical_scenario_escalates_to_support() {
        let coordinator = coordinator().await;
        let (outcomes, summary) = play(&coordinator, &SCENARIOS[0], "demo_1".into())
            .await
            .unwrap();

        assert_eq!(
            outcomes[0].1.responding_worker_type.as_deref(),
            Some("customer_service")
        );
        assert!(outcomes[1].1.escalated);
        assert_eq!(
            outcomes[2].1.responding_worker_type.as_deref(),
            Some("technical_support")
        );
        assert_eq!(summary.status, SessionStatus::Resolved);
        assert!(summary.escalation_count >= 1);
        assert!(summary.tags.contains(&"technical-support".to_string()));
        assert!(summary.tags.contains(&"escalated".to_string()));
    }

    #[tokio::test]
    async fn frustrated_scenario_reaches_supervisor_once() {
        let coordinator = coordinator().await;
        let (outcomes, summary) = play(&coordinator, &SCENARIOS[2], "demo_3".into())
            .await
            .unwrap();

        assert!(outcomes[0].1.escalated);
        assert_eq!(summary.escalation_count, 1);
        assert_eq!(
            outcomes[1].1.responding_worker_type.as_deref(),
            Some("supervisor")
        );
        assert_eq!(summary.tags, vec!["technical-support", "escalated"]);
    }

    #[tokio::test]
    async fn every_scenario_completes() {
        let coordinator = coordinator().await;
        for (index, scenario) in SCENARIOS.iter().enumerate() {
            play(&coordinator, scenario, format!("demo_{index}"))
                .await
                .unwrap();
        }
        let rollup = coordinator.get_system_metrics().await;
        assert_eq!(rollup.total_sessions, SCENARIOS.len() as u64);
        assert_eq!(rollup.completed_sessions, SCENARIOS.len() as u64);
        assert_eq!(rollup.active_sessions + rollup.waiting_sessions, 0);
    }
}
