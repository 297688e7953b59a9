// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event/locality dispatch to leg handlers.
//!
//! One handler object per [`Locality`] registers for every [`Event`] it
//! supports; the handler dispatches internally by event. This collapses the
//! `(event, locality)` key space into handler-selection-by-locality plus
//! method-selection-by-event — the same dispatch surface as a literal 2-D
//! table, expressed as a trait instead of a map of closures.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::LegError;
use crate::model::{
    ConnectionId, ProviderIdentity, RequesterIdentity, SecurityAttrs, ServiceParameters,
};

pub type LegResult<T> = Result<T, LegError>;

/// Locality of a path leg relative to this broker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locality {
    Local,
    Remote,
}

/// The five (well, six — `Query` is carried for key-space completeness but
/// not wired to any aggregator operation) operations a leg can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Reserve,
    ReserveCommit,
    Provision,
    Release,
    Terminate,
    Query,
}

/// Acknowledgement returned by a successful `reserve` leg dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveAck {
    pub connection_id: ConnectionId,
}

/// A single leg's lifecycle, dispatched either to this broker's own
/// provisioning backend (`Locality::Local`) or across the wire to a peer
/// broker (`Locality::Remote`).
#[async_trait]
pub trait LegHandler: Send + Sync {
    async fn reserve(
        &self,
        requester: RequesterIdentity,
        provider: ProviderIdentity,
        security: SecurityAttrs,
        global_reservation_id: Option<String>,
        description: Option<String>,
        connection_id: Option<ConnectionId>,
        params: ServiceParameters,
    ) -> LegResult<ReserveAck>;

    async fn reserve_commit(
        &self,
        requester: RequesterIdentity,
        provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> LegResult<ConnectionId>;

    async fn provision(
        &self,
        requester: RequesterIdentity,
        provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> LegResult<ConnectionId>;

    async fn release(
        &self,
        requester: RequesterIdentity,
        provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> LegResult<ConnectionId>;

    async fn terminate(
        &self,
        requester: RequesterIdentity,
        provider: ProviderIdentity,
        security: SecurityAttrs,
        connection_id: ConnectionId,
    ) -> LegResult<ConnectionId>;
}

/// Maps a leg's locality to the handler responsible for it.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    handlers: HashMap<Locality, Arc<dyn LegHandler>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, locality: Locality, handler: Arc<dyn LegHandler>) {
        self.handlers.insert(locality, handler);
    }

    pub fn handler(&self, locality: Locality) -> Option<Arc<dyn LegHandler>> {
        self.handlers.get(&locality).cloned()
    }
}
