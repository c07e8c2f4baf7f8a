// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle: create, message, end, and read-back.
//!
//! Message handling runs in three phases. Admission and assignment happen
//! under the coordination lock; the worker call runs with only the
//! per-session gate held; escalation and counter updates re-take the lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use handoff_core::{
    EscalationOutcome, GenerationRequest, HandoffError, Message, MessageRole, Session,
    SessionStatus, SessionSummary, Worker,
};

use crate::{Coordinator, generation, scheduler, tags};

const WAITING_NOTICE: &str = "All of our representatives are currently busy. You'll be connected as soon as one becomes available.";
const ESCALATION_REASON: &str = "Worker recommended escalation";

fn transfer_notice(target: &str) -> String {
    format!("Transferring you to our {target} team for better assistance.")
}

fn target_busy_notice(target: &str) -> String {
    format!(
        "All of our {target} representatives are currently busy. You'll be connected as soon as one becomes available."
    )
}

/// Result of [`Coordinator::create_session`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub status: SessionStatus,
    pub assigned_worker_type: Option<String>,
}

/// Result of [`Coordinator::send_message`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageOutcome {
    /// Id of the recorded customer message.
    pub message_id: String,
    pub response_text: String,
    /// `None` when no worker was available and a waiting notice was returned.
    pub responding_worker_type: Option<String>,
    /// The worker's reply asked for a hand-off.
    pub escalated: bool,
    pub escalation: Option<EscalationOutcome>,
    /// Status after the message was handled.
    pub status: SessionStatus,
    /// The reply is the fallback text after generation failed.
    pub fallback: bool,
}

/// Outcome of the first, locked phase of `send_message`.
enum Admission {
    Missing,
    Ready(Option<Arc<Worker>>),
}

impl Coordinator {
    /// Opens a session and binds it to the least-loaded worker of
    /// `worker_type` (the configured default when `None`).
    ///
    /// Without an available worker the session starts `Waiting`.
    pub async fn create_session(
        &self,
        customer_id: Option<String>,
        worker_type: Option<&str>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<SessionCreated, HandoffError> {
        let worker_type = worker_type
            .unwrap_or(&self.inner.settings.default_worker_type)
            .trim();
        if worker_type.is_empty() {
            return Err(HandoffError::Validation(
                "worker type must not be empty".into(),
            ));
        }

        let now = Utc::now();
        let mut session = Session::new(customer_id, worker_type, metadata);
        {
            let mut state = self.inner.state.lock().await;
            let st = &mut *state;
            session.status =
                match scheduler::assign(&mut st.directory, &mut session, worker_type, now) {
                    Some(_) => SessionStatus::Active,
                    None => SessionStatus::Waiting,
                };
            st.counters.total_sessions += 1;
            st.sessions.insert(session.id.clone(), session.clone());
        }

        self.inner.conversations.create(&session.id).await;
        self.inner.conversations.persist_session(&session).await;

        if session.status == SessionStatus::Waiting {
            warn!(
                session_id = %session.id,
                worker_type,
                "no worker available, session waiting"
            );
        }
        info!(
            session_id = %session.id,
            customer_id = session.customer_id.as_deref().unwrap_or("anonymous"),
            worker_type,
            status = %session.status,
            "session created"
        );
        #[cfg(feature = "prometheus")]
        handoff_prometheus::record_session_created(worker_type);

        Ok(SessionCreated {
            session_id: session.id,
            status: session.status,
            assigned_worker_type: session.current_worker_type,
        })
    }

    /// Records a customer message and answers it with the bound worker.
    ///
    /// Messages for the same session are handled one at a time. A waiting
    /// session first retries assignment; if no worker is free the message is
    /// recorded and a waiting notice returned. Worker failures are retried
    /// and finally answered with the fallback text.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<MessageOutcome, HandoffError> {
        let inbound = Message::new(MessageRole::Inbound, text)?;
        let gate = self.gate(session_id);
        let _turn = gate.lock().await;

        let worker = match self.admit(session_id, Utc::now()).await? {
            Admission::Ready(worker) => worker,
            Admission::Missing => return Err(self.missing_session(session_id).await),
        };

        let conversations = &self.inner.conversations;
        let history = conversations
            .recent(session_id, self.inner.settings.history_window)
            .await;
        conversations.append(session_id, inbound.clone()).await;
        #[cfg(feature = "prometheus")]
        handoff_prometheus::record_message("inbound");

        let Some(worker) = worker else {
            conversations
                .append(session_id, Message::new(MessageRole::System, WAITING_NOTICE)?)
                .await;
            #[cfg(feature = "prometheus")]
            handoff_prometheus::record_message("system");
            let status = self.finish_turn(session_id).await;
            debug!(session_id, "message recorded, no worker available");
            return Ok(MessageOutcome {
                message_id: inbound.id,
                response_text: WAITING_NOTICE.to_string(),
                responding_worker_type: None,
                escalated: false,
                escalation: None,
                status,
                fallback: false,
            });
        };

        let request = GenerationRequest {
            session_id: session_id.to_string(),
            message: inbound.content.clone(),
            history,
        };
        let generated = generation::generate(&worker, &request, &self.inner.retry).await;

        let mut reply = Message::new(MessageRole::Outbound, generated.reply.text.clone())?
            .with_worker(worker.id(), worker.worker_type());
        if generated.fallback {
            reply = reply.with_metadata("fallback", serde_json::Value::Bool(true));
        }
        conversations.append(session_id, reply).await;
        #[cfg(feature = "prometheus")]
        handoff_prometheus::record_message("outbound");

        let target = generated
            .reply
            .escalate_to
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let escalation = match target {
            Some(target) => self.escalate_session(session_id, target).await,
            None => None,
        };
        if let (Some(target), Some(outcome)) = (target, escalation) {
            let notice = match outcome {
                EscalationOutcome::Success => transfer_notice(target),
                EscalationOutcome::Unassigned => target_busy_notice(target),
            };
            conversations
                .append(session_id, Message::new(MessageRole::System, notice)?)
                .await;
            #[cfg(feature = "prometheus")]
            {
                handoff_prometheus::record_message("system");
                handoff_prometheus::record_escalation(target, &outcome.to_string());
            }
        }

        let status = self.finish_turn(session_id).await;
        debug!(
            session_id,
            worker_id = worker.id(),
            fallback = generated.fallback,
            escalated = escalation.is_some(),
            "message handled"
        );

        Ok(MessageOutcome {
            message_id: inbound.id,
            response_text: generated.reply.text,
            responding_worker_type: Some(worker.worker_type().to_string()),
            escalated: target.is_some(),
            escalation,
            status,
            fallback: generated.fallback,
        })
    }

    /// Ends a live session with a terminal `resolution`.
    ///
    /// Every check runs before any state changes: an invalid score leaves
    /// the session exactly as it was.
    pub async fn end_session(
        &self,
        session_id: &str,
        resolution: SessionStatus,
        satisfaction_score: Option<f64>,
    ) -> Result<SessionSummary, HandoffError> {
        let gate = self.gate(session_id);
        let _turn = gate.lock().await;

        let context = self.inner.conversations.get(session_id).await;
        let now = Utc::now();

        let ended = {
            let mut state = self.inner.state.lock().await;
            let st = &mut *state;
            match st.sessions.get_mut(session_id) {
                None => None,
                Some(session) => {
                    if session.is_terminal() {
                        return Err(HandoffError::TerminalSession {
                            session_id: session_id.to_string(),
                            status: session.status,
                        });
                    }
                    if !resolution.is_terminal() {
                        return Err(HandoffError::InvalidResolution { status: resolution });
                    }
                    if let Some(score) = satisfaction_score {
                        if !(score.is_finite() && (0.0..=10.0).contains(&score)) {
                            return Err(HandoffError::InvalidSatisfactionScore { score });
                        }
                    }

                    scheduler::release(&mut st.directory, session);
                    let resolution_time = close(session, resolution, now);
                    session.metrics.satisfaction_score = satisfaction_score;
                    if let Some(context) = &context {
                        session.metrics.update_from_context(context);
                        for tag in tags::derive_tags(context, !session.escalation_history.is_empty())
                        {
                            session.add_tag(tag);
                        }
                    } else if !session.escalation_history.is_empty() {
                        session.add_tag("escalated");
                    }
                    st.counters.record_completion(resolution_time);
                    Some(session.clone())
                }
            }
        };
        let Some(session) = ended else {
            return Err(self.missing_session(session_id).await);
        };

        self.inner.conversations.persist_session(&session).await;
        self.schedule_cleanup(session_id);

        info!(
            session_id,
            resolution = %resolution,
            resolution_time = session.metrics.resolution_time.unwrap_or_default(),
            satisfaction_score = ?satisfaction_score,
            tags = ?session.tags,
            "session ended"
        );
        #[cfg(feature = "prometheus")]
        handoff_prometheus::record_session_ended(&resolution.to_string());

        Ok(session.summary(now))
    }

    /// Summary of a session, falling back to the persisted record once the
    /// session has left the live table.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionSummary, HandoffError> {
        let now = Utc::now();
        if let Some(session) = self.inner.state.lock().await.sessions.get(session_id) {
            return Ok(session.summary(now));
        }
        self.inner
            .conversations
            .load_session(session_id)
            .await
            .map(|session| session.summary(now))
            .ok_or_else(|| HandoffError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    /// Formatted message history, oldest first.
    pub async fn get_transcript(&self, session_id: &str) -> Result<Vec<String>, HandoffError> {
        self.inner
            .conversations
            .get(session_id)
            .await
            .map(|context| context.to_transcript())
            .ok_or_else(|| HandoffError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    /// Rejects unknown and terminal sessions, then makes sure a waiting
    /// session gets a worker if one is free.
    async fn admit(&self, session_id: &str, now: DateTime<Utc>) -> Result<Admission, HandoffError> {
        let mut state = self.inner.state.lock().await;
        let st = &mut *state;
        let Some(session) = st.sessions.get_mut(session_id) else {
            return Ok(Admission::Missing);
        };
        if session.is_terminal() {
            return Err(HandoffError::TerminalSession {
                session_id: session_id.to_string(),
                status: session.status,
            });
        }
        session.touch(now);

        if session.status == SessionStatus::Waiting {
            let requested = session.requested_worker_type.clone();
            if scheduler::assign(&mut st.directory, session, &requested, now).is_some() {
                let escalated_here = session
                    .last_escalation()
                    .is_some_and(|record| record.to_type == requested);
                session.status = if escalated_here {
                    SessionStatus::Escalated
                } else {
                    SessionStatus::Active
                };
                info!(session_id, worker_type = %requested, "waiting session assigned");
            }
        }

        let worker = session
            .assigned_worker_id
            .as_deref()
            .and_then(|id| st.directory.get(id))
            .cloned();
        Ok(Admission::Ready(worker))
    }

    /// Re-takes the lock to escalate. `None` when the session is gone or
    /// already terminal.
    async fn escalate_session(&self, session_id: &str, target: &str) -> Option<EscalationOutcome> {
        let mut state = self.inner.state.lock().await;
        let st = &mut *state;
        let session = st.sessions.get_mut(session_id)?;
        if session.is_terminal() {
            return None;
        }
        let outcome = scheduler::escalate(
            &mut st.directory,
            session,
            target,
            ESCALATION_REASON,
            Utc::now(),
        );
        st.counters.total_escalations += 1;
        Some(outcome)
    }

    /// Refreshes message counters from the history and persists the session.
    async fn finish_turn(&self, session_id: &str) -> SessionStatus {
        let context = self.inner.conversations.get(session_id).await;
        let snapshot = {
            let mut state = self.inner.state.lock().await;
            state.sessions.get_mut(session_id).map(|session| {
                if let Some(context) = &context {
                    session.metrics.update_from_context(context);
                }
                session.touch(Utc::now());
                session.clone()
            })
        };
        match snapshot {
            Some(session) => {
                self.inner.conversations.persist_session(&session).await;
                session.status
            }
            None => SessionStatus::Closed,
        }
    }

    /// Error for a session that is not in the live table: terminal if a
    /// persisted record says so, not found otherwise.
    async fn missing_session(&self, session_id: &str) -> HandoffError {
        self.inner.gates.remove(session_id);
        match self.inner.conversations.load_session(session_id).await {
            Some(session) if session.is_terminal() => HandoffError::TerminalSession {
                session_id: session_id.to_string(),
                status: session.status,
            },
            _ => HandoffError::SessionNotFound {
                session_id: session_id.to_string(),
            },
        }
    }

    /// Drops the cached history, the gate and the table entry of a finished
    /// session after the configured delay.
    pub(crate) fn schedule_cleanup(&self, session_id: &str) {
        let coordinator = self.clone();
        let session_id = session_id.to_string();
        let delay = self.inner.settings.cleanup_delay;
        let cancel = self.inner.cancel.clone();
        self.inner.tracker.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return,
            }
            coordinator.evict(&session_id).await;
        });
    }

    pub(crate) async fn evict(&self, session_id: &str) {
        self.inner.conversations.evict(session_id).await;
        self.inner.gates.remove(session_id);
        let mut state = self.inner.state.lock().await;
        if state
            .sessions
            .get(session_id)
            .is_some_and(Session::is_terminal)
        {
            state.sessions.remove(session_id);
        }
        debug!(session_id, "finished session evicted from memory");
    }
}

/// Stamps the terminal status and end time. Returns the resolution time in
/// seconds, never negative.
pub(crate) fn close(session: &mut Session, status: SessionStatus, now: DateTime<Utc>) -> f64 {
    session.status = status;
    session.ended_at = Some(now);
    let resolution_time = ((now - session.created_at).num_milliseconds() as f64 / 1000.0).max(0.0);
    session.metrics.resolution_time = Some(resolution_time);
    session.touch(now);
    resolution_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_config::HandoffConfig;
    use handoff_test_utils::{FailingKvStore, ScriptedWorker};
    use tracing_test::traced_test;

    async fn coordinator_with(workers: &[(&str, &str)]) -> Coordinator {
        let coordinator = Coordinator::new(&HandoffConfig::default(), None);
        for (id, worker_type) in workers {
            coordinator
                .register_worker(Worker::new(*id, *worker_type, Arc::new(ScriptedWorker::new())))
                .await;
        }
        coordinator
    }

    #[test]
    fn close_never_goes_negative() {
        let mut session = Session::new(None, "support", HashMap::new());
        let before = session.created_at - chrono::Duration::seconds(5);
        assert_eq!(close(&mut session, SessionStatus::Resolved, before), 0.0);
        assert_eq!(session.ended_at, Some(before));
    }

    #[tokio::test]
    async fn create_uses_default_type_and_rejects_blank() {
        let coordinator = coordinator_with(&[("cs-1", "customer_service")]).await;
        let created = coordinator
            .create_session(Some("cust".into()), None, HashMap::new())
            .await
            .unwrap();
        assert_eq!(created.status, SessionStatus::Active);
        assert_eq!(created.assigned_worker_type.as_deref(), Some("customer_service"));

        let err = coordinator
            .create_session(None, Some("  "), HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::Validation(_)));
    }

    #[tokio::test]
    async fn invalid_score_leaves_session_untouched() {
        let coordinator = coordinator_with(&[("w1", "support")]).await;
        let created = coordinator
            .create_session(None, Some("support"), HashMap::new())
            .await
            .unwrap();
        let before = coordinator.get_session(&created.session_id).await.unwrap();

        for score in [11.0, -0.5, f64::NAN] {
            let err = coordinator
                .end_session(&created.session_id, SessionStatus::Resolved, Some(score))
                .await
                .unwrap_err();
            assert!(matches!(err, HandoffError::InvalidSatisfactionScore { .. }));
        }
        let err = coordinator
            .end_session(&created.session_id, SessionStatus::Active, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::InvalidResolution { .. }));

        let after = coordinator.get_session(&created.session_id).await.unwrap();
        assert_eq!(after.status, before.status);
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(after.ended_at, None);
        assert_eq!(coordinator.worker_load("w1").await, Some(1));
    }

    #[tokio::test]
    async fn end_session_only_once() {
        let coordinator = coordinator_with(&[("w1", "support")]).await;
        let created = coordinator
            .create_session(None, Some("support"), HashMap::new())
            .await
            .unwrap();
        let summary = coordinator
            .end_session(&created.session_id, SessionStatus::Resolved, Some(9.0))
            .await
            .unwrap();
        assert_eq!(summary.status, SessionStatus::Resolved);
        assert_eq!(summary.satisfaction_score, Some(9.0));
        assert!(summary.resolution_time.unwrap() >= 0.0);
        assert_eq!(coordinator.worker_load("w1").await, Some(0));

        let err = coordinator
            .end_session(&created.session_id, SessionStatus::Closed, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HandoffError::TerminalSession { status: SessionStatus::Resolved, .. }
        ));
        let err = coordinator
            .send_message(&created.session_id, "hello?")
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::TerminalSession { .. }));
    }

    #[tokio::test]
    async fn waiting_session_picks_up_new_worker() {
        let coordinator = coordinator_with(&[]).await;
        let created = coordinator
            .create_session(None, Some("support"), HashMap::new())
            .await
            .unwrap();
        assert_eq!(created.status, SessionStatus::Waiting);

        let outcome = coordinator
            .send_message(&created.session_id, "anyone there?")
            .await
            .unwrap();
        assert_eq!(outcome.responding_worker_type, None);
        assert_eq!(outcome.status, SessionStatus::Waiting);
        assert_eq!(outcome.response_text, WAITING_NOTICE);

        coordinator
            .register_worker(Worker::new("w1", "support", Arc::new(ScriptedWorker::new())))
            .await;
        let outcome = coordinator
            .send_message(&created.session_id, "hello again")
            .await
            .unwrap();
        assert_eq!(outcome.responding_worker_type.as_deref(), Some("support"));
        assert_eq!(outcome.status, SessionStatus::Active);
        assert_eq!(outcome.response_text, "mock response");

        let transcript = coordinator.get_transcript(&created.session_id).await.unwrap();
        assert_eq!(transcript.len(), 4);
        assert!(transcript[1].contains("System: All of our representatives"));
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_lookup() {
        let coordinator = coordinator_with(&[]).await;
        let err = coordinator.send_message("nope", "   ").await.unwrap_err();
        assert!(matches!(err, HandoffError::Validation(_)));
        let err = coordinator.send_message("nope", "hi").await.unwrap_err();
        assert!(matches!(err, HandoffError::SessionNotFound { .. }));
    }

    #[tokio::test]
    #[traced_test]
    async fn store_outage_does_not_fail_requests() {
        let store = Arc::new(FailingKvStore::new());
        let coordinator = Coordinator::new(&HandoffConfig::default(), Some(store.clone()));
        coordinator
            .register_worker(Worker::new("w1", "support", Arc::new(ScriptedWorker::new())))
            .await;

        let created = coordinator
            .create_session(None, Some("support"), HashMap::new())
            .await
            .unwrap();
        let outcome = coordinator
            .send_message(&created.session_id, "hello")
            .await
            .unwrap();
        assert_eq!(outcome.response_text, "mock response");
        coordinator
            .end_session(&created.session_id, SessionStatus::Resolved, None)
            .await
            .unwrap();

        assert!(store.set_attempts() > 0);
        assert!(logs_contain("failed to persist conversation (non-fatal)"));
        assert!(logs_contain("failed to persist session (non-fatal)"));
    }
}
