// Copyright (c) 2025 - Cowboy AI, Inc.
//! Connection persistence.
//!
//! A transition is committed by compare-and-set: the caller reads a
//! connection's current states, computes a next value for exactly one axis,
//! and submits it back along with the states it was read at. The store
//! rejects the write if another writer has moved the states in the
//! meantime. This is the aggregator's only concurrency primitive — there is
//! no connection-level lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::errors::StoreError;
use crate::model::{ConnectionId, ConnectionStates, ServiceConnection, SubConnection};

/// Persistence and compare-and-set transitions for parent connections and
/// their legs.
#[async_trait::async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn save_connection(&self, connection: ServiceConnection) -> Result<(), StoreError>;

    async fn load_connection(&self, id: &ConnectionId) -> Result<ServiceConnection, StoreError>;

    async fn save_legs(&self, legs: Vec<SubConnection>) -> Result<(), StoreError>;

    async fn load_legs(&self, parent_id: &ConnectionId) -> Result<Vec<SubConnection>, StoreError>;

    /// Atomically move a connection's states from `expected` to `next`.
    /// Fails with [`StoreError::CompareAndSetFailed`] if the stored states
    /// no longer equal `expected`.
    async fn compare_and_set_connection(
        &self,
        id: &ConnectionId,
        expected: ConnectionStates,
        next: ConnectionStates,
    ) -> Result<(), StoreError>;

    /// Same as [`ConnectionStore::compare_and_set_connection`] but for a
    /// single leg, identified by its parent and order within the path.
    async fn compare_and_set_leg(
        &self,
        parent_id: &ConnectionId,
        order_id: usize,
        expected: ConnectionStates,
        next: ConnectionStates,
    ) -> Result<(), StoreError>;

    /// Bump the parent record's monotonic `revision` counter. Distinct from
    /// the state-axis compare-and-set: per §3/§4.4, `revision` only advances
    /// on a successful `ReserveCommit`, not on every state transition.
    async fn bump_revision(&self, id: &ConnectionId) -> Result<u32, StoreError>;
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, ServiceConnection>,
    legs: HashMap<ConnectionId, Vec<SubConnection>>,
}

/// Reference in-memory store. Adequate for a single broker process; a
/// production deployment would back this with a durable table keyed the
/// same way.
#[derive(Default, Clone)]
pub struct InMemoryConnectionStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn save_connection(&self, connection: ServiceConnection) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.connections.contains_key(&connection.connection_id) {
            return Err(StoreError::AlreadyExists(connection.connection_id));
        }
        inner
            .connections
            .insert(connection.connection_id.clone(), connection);
        Ok(())
    }

    async fn load_connection(&self, id: &ConnectionId) -> Result<ServiceConnection, StoreError> {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn save_legs(&self, legs: Vec<SubConnection>) -> Result<(), StoreError> {
        if legs.is_empty() {
            return Ok(());
        }
        let parent_id = legs[0].parent_id.clone();
        let mut inner = self.inner.write().await;
        inner.legs.insert(parent_id, legs);
        Ok(())
    }

    async fn load_legs(&self, parent_id: &ConnectionId) -> Result<Vec<SubConnection>, StoreError> {
        let inner = self.inner.read().await;
        inner
            .legs
            .get(parent_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(parent_id.clone()))
    }

    async fn compare_and_set_connection(
        &self,
        id: &ConnectionId,
        expected: ConnectionStates,
        next: ConnectionStates,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let connection = inner
            .connections
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if connection.states != expected {
            return Err(StoreError::CompareAndSetFailed {
                connection: id.clone(),
                expected: format!("{expected:?}"),
                actual: format!("{:?}", connection.states),
            });
        }

        connection.states = next;
        Ok(())
    }

    async fn bump_revision(&self, id: &ConnectionId) -> Result<u32, StoreError> {
        let mut inner = self.inner.write().await;
        let connection = inner
            .connections
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        connection.revision += 1;
        Ok(connection.revision)
    }

    async fn compare_and_set_leg(
        &self,
        parent_id: &ConnectionId,
        order_id: usize,
        expected: ConnectionStates,
        next: ConnectionStates,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let legs = inner
            .legs
            .get_mut(parent_id)
            .ok_or_else(|| StoreError::NotFound(parent_id.clone()))?;

        let leg = legs
            .iter_mut()
            .find(|leg| leg.order_id == order_id)
            .ok_or_else(|| StoreError::NotFound(parent_id.clone()))?;

        if leg.states != expected {
            return Err(StoreError::CompareAndSetFailed {
                connection: leg.connection_id.clone(),
                expected: format!("{expected:?}"),
                actual: format!("{:?}", leg.states),
            });
        }

        leg.states = next;
        Ok(())
    }
}
