// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Handoff integration tests.
//!
//! Provides scripted worker behaviours, a failing key-value store and a
//! harness that wires a coordinator with fast retry settings.
//!
//! # Components
//!
//! - [`ScriptedWorker`] - Worker behaviour replaying queued replies and failures
//! - [`GatedWorker`] - Worker behaviour that blocks until released
//! - [`FailingKvStore`] - Key-value store whose every call fails
//! - [`TestHarness`] - Coordinator with in-memory persistence and test workers

pub mod failing_store;
pub mod harness;
pub mod scripted_worker;

pub use failing_store::FailingKvStore;
pub use harness::{TestHarness, TestHarnessBuilder, fast_config};
pub use scripted_worker::{FailingWorker, GatedWorker, ScriptedWorker};
