// Copyright (c) 2025 - Cowboy AI, Inc.
//! VLAN compatibility pruning.
//!
//! The default heuristic is a literal port of the original topology
//! resolver's port-name-derived VLAN guess. It is intentionally not "fixed"
//! to be more correct: networks that depend on its exact quirks (the
//! single `-4` clamp, never a full modulo reduction) would otherwise see
//! their live paths silently pruned.

/// Decides whether a hop between `src_port` and `dst_port` within `network`
/// is VLAN-compatible, given whether the network can rewrite VLAN tags.
pub trait VlanCompatibility {
    fn can_connect(&self, network: &str, src_port: &str, dst_port: &str, vlan_rewrite: bool) -> bool;
}

/// Default heuristic: guess an implied VLAN id from the trailing characters
/// of each port's name and require the two guesses to agree, unless the
/// network can rewrite VLAN tags in-flight.
///
/// Only networks whose name carries the `.ets` suffix are VLAN-capable in
/// the sense this check cares about; any other network's links are left
/// alone, matching the resolver's original scoping of the rule.
pub struct HeuristicVlanCompatibility;

const VLAN_CAPABLE_SUFFIX: &str = ".ets";

impl HeuristicVlanCompatibility {
    fn guess_vlan(port: &str) -> Option<u32> {
        if let Some(digit) = port.chars().rev().find(|c| c.is_ascii_digit()) {
            return digit.to_digit(10);
        }
        let last = port.chars().last()?;
        Some((last as u32) % 4)
    }
}

impl VlanCompatibility for HeuristicVlanCompatibility {
    fn can_connect(&self, network: &str, src_port: &str, dst_port: &str, vlan_rewrite: bool) -> bool {
        if vlan_rewrite || !network.ends_with(VLAN_CAPABLE_SUFFIX) {
            return true;
        }

        match (Self::guess_vlan(src_port), Self::guess_vlan(dst_port)) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}
