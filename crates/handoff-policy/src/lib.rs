// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Escalation policies and worker behaviours for Handoff.
//!
//! This crate provides:
//! - [`KeywordEscalationPolicy`]: ordered keyword rules per worker type, with
//!   a frustration fallback
//! - [`TemplateBehavior`]: a [`WorkerBehavior`](handoff_core::WorkerBehavior)
//!   that answers from a template and consults its policy

pub mod behavior;
pub mod escalation;

pub use behavior::{TemplateBehavior, default_roster, default_template, worker_from_config};
pub use escalation::{EscalationPolicy, KeywordEscalationPolicy, builtin_rules};
