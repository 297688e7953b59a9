// Copyright (c) 2025 - Cowboy AI, Inc.
//! Start-time/end-time driven axis transitions.
//!
//! `Reserve`'s success path arms two timers per connection: one that flips
//! the activation axis to `Active` at `start_time`, and one that drives the
//! lifecycle axis to `TerminatedEndtime` at `end_time`. `Release` cancels
//! the pending end-time timer for a connection it is tearing down
//! out-of-band. Firing is best-effort: if the connection has moved to a
//! state the scheduled transition no longer applies to (e.g. it was
//! explicitly terminated first), the fire is a no-op, logged at `debug`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::model::{ActivationState, ConnectionId, LifecycleState};
use crate::state_machine::Axis;
use crate::store::ConnectionStore;

/// Owns the background timers for every connection with a pending
/// scheduled transition. Dropping the scheduler aborts all outstanding
/// timers.
pub struct TransitionScheduler {
    store: Arc<dyn ConnectionStore>,
    handles: Mutex<HashMap<ConnectionId, Vec<JoinHandle<()>>>>,
}

impl TransitionScheduler {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self {
            store,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Arm both the activation (`start_time`) and lifecycle (`end_time`)
    /// timers for a connection, relative to `now`.
    pub async fn schedule_connection_window(
        &self,
        connection_id: ConnectionId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.schedule_activation(connection_id.clone(), start_time, now).await;
        self.schedule_endtime(connection_id, end_time, now).await;
    }

    async fn schedule_activation(&self, connection_id: ConnectionId, at: DateTime<Utc>, now: DateTime<Utc>) {
        let delay = duration_until(at, now);
        let store = self.store.clone();
        let id = connection_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire_activation(&*store, &id).await;
        });
        self.handles.lock().await.entry(connection_id).or_default().push(handle);
    }

    async fn schedule_endtime(&self, connection_id: ConnectionId, at: DateTime<Utc>, now: DateTime<Utc>) {
        let delay = duration_until(at, now);
        let store = self.store.clone();
        let id = connection_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire_endtime(&*store, &id).await;
        });
        self.handles.lock().await.entry(connection_id).or_default().push(handle);
    }

    /// Cancel every outstanding timer for a connection (used by `Release`
    /// and `Terminate`, which take the connection out of the scheduled
    /// window explicitly).
    pub async fn cancel(&self, connection_id: &ConnectionId) {
        if let Some(handles) = self.handles.lock().await.remove(connection_id) {
            for handle in handles {
                handle.abort();
            }
        }
    }
}

fn duration_until(at: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
    (at - now).to_std().unwrap_or(std::time::Duration::ZERO)
}

async fn fire_activation(store: &dyn ConnectionStore, id: &ConnectionId) {
    let Ok(connection) = store.load_connection(id).await else {
        tracing::debug!(connection = %id, "activation timer fired for unknown connection");
        return;
    };

    if connection.states.activation != ActivationState::Inactive {
        tracing::debug!(connection = %id, "activation timer fired but connection left Inactive already");
        return;
    }

    // The timer fires a single instant, but the axis only allows Inactive ->
    // Activating -> Active; walk both hops through `Axis::transition` so an
    // illegal jump can never sneak past the state machine's own rules, then
    // persist just the final state with one compare-and-set.
    let activated = match connection
        .states
        .activation
        .transition(ActivationState::Activating)
        .and_then(|s| s.transition(ActivationState::Active))
    {
        Ok(state) => state,
        Err(err) => {
            tracing::warn!(connection = %id, error = %err, "activation timer could not walk Inactive -> Active");
            return;
        }
    };

    let mut next = connection.states;
    next.activation = activated;

    if let Err(err) = store
        .compare_and_set_connection(id, connection.states, next)
        .await
    {
        tracing::warn!(connection = %id, error = %err, "activation timer compare-and-set lost a race");
    }
}

async fn fire_endtime(store: &dyn ConnectionStore, id: &ConnectionId) {
    let Ok(connection) = store.load_connection(id).await else {
        tracing::debug!(connection = %id, "end-time timer fired for unknown connection");
        return;
    };

    if connection.states.lifecycle.is_terminal() {
        tracing::debug!(connection = %id, "end-time timer fired but connection already terminal");
        return;
    }

    let mut next = connection.states;
    next.lifecycle = LifecycleState::TerminatedEndtime;

    if let Err(err) = store
        .compare_and_set_connection(id, connection.states, next)
        .await
    {
        tracing::warn!(connection = %id, error = %err, "end-time timer compare-and-set lost a race");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bandwidth, ConnectionStates, Labels, RequesterIdentity, ServiceConnection, Stp};
    use crate::store::InMemoryConnectionStore;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;

    fn fixed_time(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn sample_connection(id: &str, start_ms: i64, end_ms: i64) -> ServiceConnection {
        ServiceConnection {
            connection_id: ConnectionId::from_raw(id),
            revision: 0,
            global_reservation_id: None,
            description: None,
            requester_identity: RequesterIdentity("urn:requester:test".into()),
            reserve_time: fixed_time(0),
            states: ConnectionStates::initial(),
            source: Stp::new("A", "a1", Labels::empty()),
            dest: Stp::new("B", "b2", Labels::empty()),
            start_time: fixed_time(start_ms),
            end_time: fixed_time(end_ms),
            bandwidth: Bandwidth::default(),
        }
    }

    #[tokio::test]
    async fn activation_timer_flips_state_after_start_time() {
        let store: Arc<dyn ConnectionStore> = Arc::new(InMemoryConnectionStore::new());
        let conn = sample_connection("abc", 50, 5_000);
        let id = conn.connection_id.clone();
        store.save_connection(conn).await.unwrap();

        let scheduler = TransitionScheduler::new(store.clone());
        scheduler
            .schedule_activation(id.clone(), fixed_time(50), fixed_time(0))
            .await;

        tokio::time::sleep(StdDuration::from_millis(150)).await;

        let loaded = store.load_connection(&id).await.unwrap();
        assert_eq!(loaded.states.activation, ActivationState::Active);
    }

    #[tokio::test]
    async fn cancel_aborts_pending_endtime_timer() {
        let store: Arc<dyn ConnectionStore> = Arc::new(InMemoryConnectionStore::new());
        let conn = sample_connection("abc", 50, 100);
        let id = conn.connection_id.clone();
        store.save_connection(conn).await.unwrap();

        let scheduler = TransitionScheduler::new(store.clone());
        scheduler
            .schedule_endtime(id.clone(), fixed_time(100), fixed_time(0))
            .await;
        scheduler.cancel(&id).await;

        tokio::time::sleep(StdDuration::from_millis(200)).await;

        let loaded = store.load_connection(&id).await.unwrap();
        assert_eq!(loaded.states.lifecycle, LifecycleState::Initial);
    }
}
