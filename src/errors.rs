// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error taxonomy for circuit broker operations
//!
//! Mirrors the distinction the broker makes operationally: input errors are
//! returned to the requester unchanged, operation errors are returned after
//! compensation has been attempted, and internal errors indicate the
//! connection has been left in a state that needs operator attention.

use thiserror::Error;

use crate::model::ConnectionId;

/// Errors raised while resolving or searching the topology graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("No network named {0}")]
    UnknownNetwork(String),

    #[error("No port named {port} on network {network}")]
    UnknownPort { network: String, port: String },

    #[error("Cannot connect STP {0} to itself")]
    SelfLoop(String),

    #[error("Could not find a path for route {source_network}:{source_port} -> {dest_network}:{dest_port}")]
    NoPath {
        source_network: String,
        source_port: String,
        dest_network: String,
        dest_port: String,
    },

    #[error("Network name must be unique (name: {0})")]
    DuplicateNetwork(String),
}

/// Errors raised by a state-axis transition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {axis} transition: from {from} to {to} (connection held at {actual})")]
pub struct StateTransitionError {
    pub axis: &'static str,
    pub from: String,
    pub to: String,
    pub actual: String,
}

/// Errors raised by `ConnectionStore` operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("connection {0} already exists")]
    AlreadyExists(ConnectionId),

    #[error("connection {0} not found")]
    NotFound(ConnectionId),

    #[error("compare-and-set failed for connection {connection}: expected {expected}, found {actual}")]
    CompareAndSetFailed {
        connection: ConnectionId,
        expected: String,
        actual: String,
    },
}

/// A single leg's failure, as reported by a `LegHandler`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{provider_nsa} {source}->{dest}: {message}")]
pub struct LegError {
    pub provider_nsa: String,
    pub source: String,
    pub dest: String,
    pub message: String,
}

impl LegError {
    pub fn new(
        provider_nsa: impl Into<String>,
        source: impl Into<String>,
        dest: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider_nsa: provider_nsa.into(),
            source: source.into(),
            dest: dest.into(),
            message: message.into(),
        }
    }
}

/// Formats the aggregate failure message shared by Reserve, Provision,
/// Release and Terminate: a single failure is reported verbatim, multiple
/// failures are folded into a summary naming each leg. `total` is the
/// number of legs dispatched (not just the ones that failed), so the
/// leading `<F>/<N>` reflects the whole fan-out.
pub fn format_aggregate_error(action: &str, total: usize, failures: &[LegError]) -> String {
    match failures {
        [] => format!("{action} failed with no recorded leg errors"),
        [only] => only.message.clone(),
        many => {
            let joined = many
                .iter()
                .map(|f| format!("{} {}->{} {}", f.provider_nsa, f.source, f.dest, f.message))
                .collect::<Vec<_>>()
                .join(". ");
            format!("{}/{total} {action} failed: {joined}", many.len())
        }
    }
}

/// Top-level error type returned by aggregator operations.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    StateTransition(#[from] StateTransitionError),

    #[error("connection with id {0} already exists")]
    ConnectionExists(ConnectionId),

    #[error("no connection with id {0}")]
    ConnectionNonExistent(ConnectionId),

    #[error("connection {0} has been terminated")]
    ConnectionGone(ConnectionId),

    #[error("reservation failed: {0}")]
    ConnectionCreate(String),

    #[error("provision failed: {0}")]
    Provision(String),

    #[error("release failed: {0}")]
    Release(String),

    #[error("terminate failed: {0}")]
    Terminate(String),

    #[error("internal server error: {0}")]
    InternalServer(String),
}

impl From<StoreError> for AggregatorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(id) => AggregatorError::ConnectionExists(id),
            StoreError::NotFound(id) => AggregatorError::ConnectionNonExistent(id),
            StoreError::CompareAndSetFailed { .. } => {
                AggregatorError::InternalServer(err.to_string())
            }
        }
    }
}

pub type AggregatorResult<T> = Result<T, AggregatorError>;
