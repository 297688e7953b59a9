//! Wire payloads for the NATS request/reply transport.
//!
//! [`LegHandler`](circuit_broker::registry::LegHandler)'s methods already
//! operate on `circuit_broker::model` types that derive `Serialize`/
//! `Deserialize`; this module only adds the envelope around them (one
//! request struct per method, taking the method's arguments by value) and a
//! wire-safe mirror of [`LegError`](circuit_broker::errors::LegError),
//! which does not itself derive `serde` traits since the core crate has no
//! reason to serialize it internally.

use serde::{Deserialize, Serialize};

use circuit_broker::errors::LegError;
use circuit_broker::model::{
    ConnectionId, ProviderIdentity, RequesterIdentity, SecurityAttrs, ServiceParameters,
};
use circuit_broker::registry::ReserveAck;

/// Serializable mirror of [`LegError`]; round-trips field-for-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireLegError {
    pub provider_nsa: String,
    pub source: String,
    pub dest: String,
    pub message: String,
}

impl From<LegError> for WireLegError {
    fn from(err: LegError) -> Self {
        Self {
            provider_nsa: err.provider_nsa,
            source: err.source,
            dest: err.dest,
            message: err.message,
        }
    }
}

impl From<WireLegError> for LegError {
    fn from(err: WireLegError) -> Self {
        LegError::new(err.provider_nsa, err.source, err.dest, err.message)
    }
}

/// A `LegHandler` call result as it travels over the wire: `Ok`/`Err` with
/// a serializable payload on either side.
pub type WireResult<T> = Result<T, WireLegError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub requester: RequesterIdentity,
    pub provider: ProviderIdentity,
    pub security: SecurityAttrs,
    pub global_reservation_id: Option<String>,
    pub description: Option<String>,
    pub connection_id: Option<ConnectionId>,
    pub params: ServiceParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveAckWire {
    pub connection_id: ConnectionId,
}

impl From<ReserveAck> for ReserveAckWire {
    fn from(ack: ReserveAck) -> Self {
        Self {
            connection_id: ack.connection_id,
        }
    }
}

impl From<ReserveAckWire> for ReserveAck {
    fn from(ack: ReserveAckWire) -> Self {
        ReserveAck {
            connection_id: ack.connection_id,
        }
    }
}

/// Shared request shape for `reserve_commit`/`provision`/`release`/
/// `terminate`, which all take the same four arguments ending in a
/// connection id and return a connection id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionIdRequest {
    pub requester: RequesterIdentity,
    pub provider: ProviderIdentity,
    pub security: SecurityAttrs,
    pub connection_id: ConnectionId,
}
