// Copyright (c) 2025 - Cowboy AI, Inc.
//! Core data model: STPs, links, paths and the connection records an
//! aggregator operation reads and writes.
//!
//! Value objects here follow the same invariant-at-construction discipline
//! as the domain value objects this crate was modeled on: validation lives
//! in the constructor, not scattered through call sites.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::state_machine::{ActivationState, LifecycleState, ProvisionState, ReservationState};

/// Opaque 12-hex-digit connection identifier.
///
/// Unique across the store (§3 invariant). Generated from the first 16 hex
/// digits (`0-9a-f`), matching the original's `string.hexdigits[:16]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(String);

const HEX_DIGITS: &[u8] = b"0123456789abcdef";
const CONNECTION_ID_LEN: usize = 12;

impl ConnectionId {
    /// Draw a fresh random 12-character hex id.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let s: String = (0..CONNECTION_ID_LEN)
            .map(|_| HEX_DIGITS[rng.gen_range(0..HEX_DIGITS.len())] as char)
            .collect();
        Self(s)
    }

    /// Wrap a caller-supplied id without validation (used when parsing a
    /// request that names an existing connection).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Managing NSA identity of a network; the remote endpoint of a delegated
/// leg's RPC invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nsa(String);

impl Nsa {
    pub fn new(urn: impl Into<String>) -> Self {
        Self(urn.into())
    }

    pub fn urn(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the entity making a request. Kept as a distinct type from
/// [`ProviderIdentity`] so the two cannot be accidentally transposed at a
/// call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterIdentity(pub String);

/// Identity of the entity a request is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity(pub String);

/// Opaque security/authentication attributes threaded through every handler
/// call but never interpreted by the core (authentication is an external
/// collaborator's concern).
pub type SecurityAttrs = Option<Vec<(String, String)>>;

/// A set of VLAN label values attached to an STP. A label set with exactly
/// one value is "single-valued" / fully specified; any other cardinality
/// (zero, or more than one) makes the STP a *candidate* to be narrowed
/// during path selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels(BTreeSet<u16>);

impl Labels {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn single(value: u16) -> Self {
        let mut set = BTreeSet::new();
        set.insert(value);
        Self(set)
    }

    pub fn from_values(values: impl IntoIterator<Item = u16>) -> Self {
        Self(values.into_iter().collect())
    }

    /// True when exactly one VLAN value is present.
    pub fn single_value(&self) -> bool {
        self.0.len() == 1
    }

    pub fn values(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{rendered}")
    }
}

/// Service Termination Point: an immutable triple `(network, port, labels)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stp {
    pub network: String,
    pub port: String,
    pub labels: Labels,
}

impl Stp {
    pub fn new(network: impl Into<String>, port: impl Into<String>, labels: Labels) -> Self {
        Self {
            network: network.into(),
            port: port.into(),
            labels,
        }
    }
}

impl fmt::Display for Stp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.network, self.port, self.labels)
    }
}

/// An ordered pair of STPs within one network (source port -> dest port),
/// carrying each endpoint's label set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub network: String,
    pub src_port: String,
    pub dst_port: String,
    pub src_labels: Labels,
    pub dst_labels: Labels,
}

impl Link {
    pub fn new(
        network: impl Into<String>,
        src_port: impl Into<String>,
        dst_port: impl Into<String>,
        src_labels: Labels,
        dst_labels: Labels,
    ) -> Self {
        Self {
            network: network.into(),
            src_port: src_port.into(),
            dst_port: dst_port.into(),
            src_labels,
            dst_labels,
        }
    }
}

/// An end-to-end, ordered, non-empty sequence of links, one per traversed
/// network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path(Vec<Link>);

impl Path {
    pub fn new(links: Vec<Link>) -> Self {
        debug_assert!(!links.is_empty(), "a Path must contain at least one Link");
        Self(links)
    }

    pub fn links(&self) -> &[Link] {
        &self.0
    }

    pub fn hop_count(&self) -> usize {
        self.0.len()
    }
}

/// Minimum-bandwidth requirement on a reservation. `desired`/`maximum` are
/// carried for forward compatibility with the richer NSI bandwidth triple
/// but are not consulted by path-finding, which only filters on `minimum`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bandwidth {
    pub desired: Option<u32>,
    pub minimum: Option<u32>,
    pub maximum: Option<u32>,
}

/// Directionality of a requested service. Carried through the API surface
/// because requesters legitimately set it; the core does not branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directionality {
    Bidirectional,
    Unidirectional,
}

/// Service parameters for a (sub-)reservation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceParameters {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub source_stp: Stp,
    pub dest_stp: Stp,
    pub bandwidth: Bandwidth,
    pub directionality: Directionality,
}

/// The aggregate of a connection's four orthogonal state axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStates {
    pub reservation: ReservationState,
    pub provision: ProvisionState,
    pub activation: ActivationState,
    pub lifecycle: LifecycleState,
}

impl ConnectionStates {
    /// The states a freshly-persisted connection (parent or leg) starts in.
    pub fn initial() -> Self {
        Self {
            reservation: ReservationState::Initial,
            provision: ProvisionState::Scheduled,
            activation: ActivationState::Inactive,
            lifecycle: LifecycleState::Initial,
        }
    }
}

/// Parent record: one per end-to-end reservation, spanning one or more
/// administrative domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConnection {
    pub connection_id: ConnectionId,
    pub revision: u32,
    pub global_reservation_id: Option<String>,
    pub description: Option<String>,
    pub requester_identity: RequesterIdentity,
    pub reserve_time: DateTime<Utc>,
    pub states: ConnectionStates,
    pub source: Stp,
    pub dest: Stp,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub bandwidth: Bandwidth,
}

/// Leg record: one per link on the selected path, in path order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubConnection {
    pub parent_id: ConnectionId,
    pub order_id: usize,
    pub provider_nsa: Nsa,
    pub local_link: bool,
    pub connection_id: ConnectionId,
    pub states: ConnectionStates,
    pub source: Stp,
    pub dest: Stp,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub bandwidth: Bandwidth,
}

impl SubConnection {
    pub fn path_label(&self) -> String {
        format!("{}:{}->{}:{}", self.source.network, self.source.port, self.dest.network, self.dest.port)
    }
}
