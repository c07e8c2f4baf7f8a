// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Abandons sessions that have been idle longer than the configured timeout
//! and purges expired entries from the key-value store.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use handoff_core::{Session, SessionStatus};

use crate::{Coordinator, lifecycle, scheduler};

fn is_idle(session: &Session, now: DateTime<Utc>, idle_timeout: TimeDelta) -> bool {
    !session.is_terminal() && now - session.updated_at > idle_timeout
}

impl Coordinator {
    /// Abandons every live session idle for longer than the idle timeout at
    /// `now`. Returns the ids of the abandoned sessions.
    ///
    /// Candidates are picked from a snapshot; each is re-checked under the
    /// lock before it is abandoned. Sessions with a message in flight are
    /// skipped until the next pass.
    pub async fn reap_idle(&self, now: DateTime<Utc>) -> Vec<String> {
        let idle_timeout =
            TimeDelta::from_std(self.inner.settings.idle_timeout).unwrap_or(TimeDelta::MAX);

        let candidates: Vec<String> = {
            let state = self.inner.state.lock().await;
            state
                .sessions
                .values()
                .filter(|s| is_idle(s, now, idle_timeout))
                .map(|s| s.id.clone())
                .collect()
        };

        let mut reaped = Vec::new();
        for session_id in candidates {
            let gate = self.gate(&session_id);
            let Ok(_turn) = gate.try_lock() else {
                debug!(session_id = %session_id, "session busy, not reaping");
                continue;
            };

            let abandoned = {
                let mut state = self.inner.state.lock().await;
                let st = &mut *state;
                match st.sessions.get_mut(&session_id) {
                    Some(session) if is_idle(session, now, idle_timeout) => {
                        let idle_secs = (now - session.updated_at).num_seconds();
                        scheduler::release(&mut st.directory, session);
                        let resolution_time =
                            lifecycle::close(session, SessionStatus::Abandoned, now);
                        st.counters.record_completion(resolution_time);
                        Some((session.clone(), idle_secs))
                    }
                    _ => None,
                }
            };
            let Some((session, idle_secs)) = abandoned else {
                continue;
            };

            self.inner.conversations.persist_session(&session).await;
            self.schedule_cleanup(&session_id);
            info!(session_id = %session_id, idle_secs, "session abandoned");
            #[cfg(feature = "prometheus")]
            handoff_prometheus::record_session_ended("abandoned");
            reaped.push(session_id);
        }

        if !reaped.is_empty() {
            info!(count = reaped.len(), "reaper abandoned idle sessions");
        }
        reaped
    }

    pub(crate) async fn run_reaper(&self) {
        let mut interval = tokio::time::interval(self.inner.settings.reaper_interval);
        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.reap_idle(Utc::now()).await;
                    self.inner.conversations.purge_expired().await;
                }
                _ = self.inner.cancel.cancelled() => {
                    info!("session reaper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::Duration;
    use handoff_config::HandoffConfig;
    use handoff_core::Worker;
    use handoff_test_utils::ScriptedWorker;

    async fn coordinator() -> Coordinator {
        let coordinator = Coordinator::new(&HandoffConfig::default(), None);
        coordinator
            .register_worker(Worker::new("w1", "support", Arc::new(ScriptedWorker::new())))
            .await;
        coordinator
    }

    async fn backdate(coordinator: &Coordinator, session_id: &str, by: Duration) {
        let mut state = coordinator.inner.state.lock().await;
        let session = state.sessions.get_mut(session_id).unwrap();
        session.updated_at -= by;
    }

    #[tokio::test]
    async fn reaps_only_sessions_past_the_idle_timeout() {
        let coordinator = coordinator().await;
        let stale = coordinator
            .create_session(None, Some("support"), HashMap::new())
            .await
            .unwrap();
        let fresh = coordinator
            .create_session(None, Some("support"), HashMap::new())
            .await
            .unwrap();
        backdate(&coordinator, &stale.session_id, Duration::minutes(31)).await;
        backdate(&coordinator, &fresh.session_id, Duration::minutes(29)).await;
        assert_eq!(coordinator.worker_load("w1").await, Some(2));

        let reaped = coordinator.reap_idle(Utc::now()).await;

        assert_eq!(reaped, vec![stale.session_id.clone()]);
        let stale = coordinator.get_session(&stale.session_id).await.unwrap();
        assert_eq!(stale.status, SessionStatus::Abandoned);
        assert!(stale.ended_at.is_some());
        let fresh = coordinator.get_session(&fresh.session_id).await.unwrap();
        assert_eq!(fresh.status, SessionStatus::Active);
        assert_eq!(coordinator.worker_load("w1").await, Some(1));

        assert!(coordinator.reap_idle(Utc::now()).await.is_empty());
    }

    #[tokio::test]
    async fn busy_sessions_are_skipped() {
        let coordinator = coordinator().await;
        let created = coordinator
            .create_session(None, Some("support"), HashMap::new())
            .await
            .unwrap();
        backdate(&coordinator, &created.session_id, Duration::hours(2)).await;

        let gate = coordinator.gate(&created.session_id);
        let held = gate.lock().await;
        assert!(coordinator.reap_idle(Utc::now()).await.is_empty());
        drop(held);

        assert_eq!(coordinator.reap_idle(Utc::now()).await.len(), 1);
    }

    #[tokio::test]
    async fn terminal_sessions_are_ignored() {
        let coordinator = coordinator().await;
        let created = coordinator
            .create_session(None, Some("support"), HashMap::new())
            .await
            .unwrap();
        coordinator
            .end_session(&created.session_id, SessionStatus::Resolved, None)
            .await
            .unwrap();
        assert!(
            coordinator
                .reap_idle(Utc::now() + Duration::hours(5))
                .await
                .is_empty()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_tick_purges_expired_store_entries() {
        let mut config = HandoffConfig::default();
        config.coordinator.reaper_interval_secs = 30;
        config.persistence.ttl_secs = 60;
        let kv = Arc::new(handoff_storage::MemoryKvStore::new());
        let coordinator = Coordinator::new(&config, Some(kv.clone()));
        coordinator
            .register_worker(Worker::new("w1", "support", Arc::new(ScriptedWorker::new())))
            .await;
        let created = coordinator
            .create_session(None, Some("support"), HashMap::new())
            .await
            .unwrap();
        coordinator
            .end_session(&created.session_id, SessionStatus::Resolved, None)
            .await
            .unwrap();
        assert!(!kv.is_empty());

        coordinator.start();
        tokio::time::sleep(std::time::Duration::from_secs(45)).await;
        assert!(!kv.is_empty());

        tokio::time::sleep(std::time::Duration::from_secs(50)).await;
        assert!(kv.is_empty());

        coordinator.stop().await;
    }
}
