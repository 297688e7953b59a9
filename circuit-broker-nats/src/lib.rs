//! NATS request/reply transport for `circuit-broker`'s remote-locality legs.
//!
//! The core crate's `ServiceRegistry` dispatches a leg to either a `Local`
//! in-process backend or a `Remote` handler without caring which; this
//! crate supplies that `Remote` handler by layering NATS request/reply
//! under the shared `LegHandler` trait both localities implement.
//!
//! - [`client::NatsLegHandler`] — the side an aggregator registers under
//!   `Locality::Remote` to reach a peer.
//! - [`server::NatsLegResponder`] — the side a peer runs to expose its own
//!   `Local` handler to other aggregators over the same subjects.
//! - [`subjects`] — the `circuit.{provider_nsa}.{event}` subject scheme both
//!   sides agree on.
//! - [`wire`] — serializable request/response envelopes around the core
//!   crate's already-`Serialize`/`Deserialize` model types.

pub mod client;
pub mod server;
pub mod subjects;
pub mod wire;

pub use client::NatsLegHandler;
pub use server::{NatsLegResponder, ResponderError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
