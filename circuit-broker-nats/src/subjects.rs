//! NATS subject hierarchy for remote leg dispatch.
//!
//! Subject pattern: `circuit.{provider_nsa}.{event}`, one subject per
//! `(event, provider)` pair a peer aggregator subscribes to for its inbound
//! provider API. The provider NSA is sanitized (`:`/`.` replaced with `_`)
//! since NATS subject tokens may not contain the raw URN's `:` separators.

use std::fmt;

/// Root namespace for all remote-leg request subjects.
pub const CIRCUIT_ROOT: &str = "circuit";

/// The five outbound provider events a remote leg can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegEvent {
    Reserve,
    ReserveCommit,
    Provision,
    Release,
    Terminate,
}

impl fmt::Display for LegEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LegEvent::Reserve => "reserve",
            LegEvent::ReserveCommit => "reserve_commit",
            LegEvent::Provision => "provision",
            LegEvent::Release => "release",
            LegEvent::Terminate => "terminate",
        };
        write!(f, "{s}")
    }
}

/// Builds the request subject a [`crate::client::NatsLegHandler`] publishes
/// to and a [`crate::server::NatsLegResponder`] subscribes on, for a given
/// provider NSA and event.
pub fn leg_subject(provider_nsa: &str, event: LegEvent) -> String {
    format!("{CIRCUIT_ROOT}.{}.{event}", sanitize(provider_nsa))
}

fn sanitize(nsa: &str) -> String {
    nsa.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
