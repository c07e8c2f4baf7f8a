// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator contracts used by the coordinator.
//!
//! Both traits use `#[async_trait]` so implementations can be held as
//! `Arc<dyn Trait>`.

pub mod kv;
pub mod worker;

pub use kv::KeyValueStore;
pub use worker::{GenerationRequest, WorkerBehavior, WorkerReply};
