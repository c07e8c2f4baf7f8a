// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment, release and escalation of sessions.
//!
//! These functions hold no state of their own: they mutate the
//! [`WorkerDirectory`] and the [`Session`] they are given, and must be called
//! with the coordination lock held. Callers reject terminal sessions before
//! calling in.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use handoff_core::{EscalationOutcome, EscalationRecord, Session, SessionStatus, Worker};

use crate::directory::WorkerDirectory;

/// Binds the session to the least-loaded worker of `worker_type`.
///
/// Any existing binding is released first. On success the worker's load is
/// incremented and `current_worker_type` set; on failure the session is left
/// unassigned and the caller decides the status.
pub fn assign(
    directory: &mut WorkerDirectory,
    session: &mut Session,
    worker_type: &str,
    now: DateTime<Utc>,
) -> Option<Arc<Worker>> {
    release(directory, session);
    session.requested_worker_type = worker_type.to_string();

    let worker = directory.least_loaded(worker_type)?;
    directory.increment_load(worker.id());
    session.current_worker_type = Some(worker_type.to_string());
    session.assigned_worker_id = Some(worker.id().to_string());
    session.touch(now);

    debug!(
        session_id = %session.id,
        worker_id = worker.id(),
        worker_type,
        load = directory.load(worker.id()).unwrap_or_default(),
        "session assigned"
    );
    Some(worker)
}

/// Unbinds the session, decrementing the bound worker's load.
///
/// Returns `false` when the session was already unassigned.
pub fn release(directory: &mut WorkerDirectory, session: &mut Session) -> bool {
    session.current_worker_type = None;
    let Some(worker_id) = session.assigned_worker_id.take() else {
        return false;
    };
    if !directory.decrement_load(&worker_id) {
        debug!(
            session_id = %session.id,
            worker_id = %worker_id,
            "released session from a worker that is no longer registered"
        );
    }
    true
}

/// Moves the session to `target_type`, recording exactly one escalation.
///
/// With a worker available the session becomes `Escalated`; otherwise it
/// becomes `Waiting`, stays queued for `target_type`, and the record's
/// outcome is [`EscalationOutcome::Unassigned`].
pub fn escalate(
    directory: &mut WorkerDirectory,
    session: &mut Session,
    target_type: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> EscalationOutcome {
    let from_type = session.current_worker_type.clone();
    release(directory, session);

    let outcome = match assign(directory, session, target_type, now) {
        Some(_) => {
            session.status = SessionStatus::Escalated;
            EscalationOutcome::Success
        }
        None => {
            session.status = SessionStatus::Waiting;
            EscalationOutcome::Unassigned
        }
    };

    session.escalation_history.push(EscalationRecord {
        from_type: from_type.clone(),
        to_type: target_type.to_string(),
        reason: reason.to_string(),
        timestamp: now,
        outcome,
    });
    session.metrics.escalation_count += 1;
    session.touch(now);

    info!(
        session_id = %session.id,
        from_type = from_type.as_deref().unwrap_or("none"),
        to_type = target_type,
        %outcome,
        "session escalated"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use handoff_test_utils::ScriptedWorker;

    fn directory(workers: &[(&str, &str)]) -> WorkerDirectory {
        let mut dir = WorkerDirectory::new();
        for (id, worker_type) in workers {
            dir.register(Arc::new(Worker::new(
                *id,
                *worker_type,
                Arc::new(ScriptedWorker::new()),
            )));
        }
        dir
    }

    fn session() -> Session {
        Session::new(None, "support", HashMap::new())
    }

    #[test]
    fn three_assigns_over_two_workers() {
        let mut dir = directory(&[("w1", "support"), ("w2", "support")]);
        let mut sessions: Vec<Session> = (0..3).map(|_| session()).collect();
        for s in &mut sessions {
            assert!(assign(&mut dir, s, "support", Utc::now()).is_some());
        }
        let loads = [dir.load("w1").unwrap(), dir.load("w2").unwrap()];
        assert_eq!(loads.iter().sum::<u32>(), 3);
        assert!(loads.iter().all(|&l| l <= 2));
        assert_eq!(loads, [2, 1]);
    }

    #[test]
    fn release_is_idempotent() {
        let mut dir = directory(&[("w1", "support")]);
        let mut s = session();
        assign(&mut dir, &mut s, "support", Utc::now());
        let mut other = session();
        assign(&mut dir, &mut other, "support", Utc::now());
        assert_eq!(dir.load("w1"), Some(2));

        assert!(release(&mut dir, &mut s));
        assert_eq!(dir.load("w1"), Some(1));
        assert!(!release(&mut dir, &mut s));
        assert_eq!(dir.load("w1"), Some(1));
        assert!(s.current_worker_type.is_none());
    }

    #[test]
    fn reassign_releases_previous_binding() {
        let mut dir = directory(&[("w1", "support"), ("s1", "sales")]);
        let mut s = session();
        assign(&mut dir, &mut s, "support", Utc::now());
        assign(&mut dir, &mut s, "sales", Utc::now());
        assert_eq!(dir.load("w1"), Some(0));
        assert_eq!(dir.load("s1"), Some(1));
        assert_eq!(s.requested_worker_type, "sales");
    }

    #[test]
    fn escalate_to_missing_type_waits() {
        let mut dir = directory(&[("w1", "support")]);
        let mut s = session();
        assign(&mut dir, &mut s, "support", Utc::now());
        s.status = SessionStatus::Active;

        let outcome = escalate(&mut dir, &mut s, "legal", "needs review", Utc::now());

        assert_eq!(outcome, EscalationOutcome::Unassigned);
        assert_eq!(s.status, SessionStatus::Waiting);
        assert!(s.current_worker_type.is_none());
        assert_eq!(s.requested_worker_type, "legal");
        assert_eq!(dir.load("w1"), Some(0));
        let record = s.escalation_history.last().unwrap();
        assert_eq!(record.from_type.as_deref(), Some("support"));
        assert_eq!(record.to_type, "legal");
        assert_eq!(record.outcome, EscalationOutcome::Unassigned);
    }

    #[test]
    fn every_escalate_appends_one_record() {
        let mut dir = directory(&[("w1", "support"), ("l1", "legal")]);
        let mut s = session();
        assign(&mut dir, &mut s, "support", Utc::now());

        for (i, target) in ["legal", "missing", "support", "support"].iter().enumerate() {
            escalate(&mut dir, &mut s, target, "reason", Utc::now());
            assert_eq!(s.escalation_history.len(), i + 1);
            assert_eq!(s.metrics.escalation_count, (i + 1) as u64);
        }
        assert_eq!(s.status, SessionStatus::Escalated);
        assert_eq!(dir.load("w1"), Some(1));
        assert_eq!(dir.load("l1"), Some(0));
    }
}
