// Copyright (c) 2025 - Cowboy AI, Inc.
//! Static topology model and path-finder.
//!
//! The topology is built once (by an external loader this crate does not
//! define) and is read-only for the lifetime of the broker process. Path
//! search is a bounded depth-first enumeration; for the tens-of-networks
//! scale this broker targets, no further optimisation is needed.

mod vlan;

pub use vlan::{HeuristicVlanCompatibility, VlanCompatibility};

use std::collections::HashMap;

use crate::errors::TopologyError;
use crate::model::{Bandwidth, Labels, Link, Path, Stp};

/// A single port on a [`Network`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub available_capacity: Option<u32>,
    pub remote: Option<(String, String)>,
    pub labels: Labels,
}

impl Port {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available_capacity: None,
            remote: None,
            labels: Labels::empty(),
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.available_capacity = Some(capacity);
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    /// Pair this port with a port on a neighbouring network, forming an
    /// inter-domain link.
    pub fn with_remote(mut self, network: impl Into<String>, port: impl Into<String>) -> Self {
        self.remote = Some((network.into(), port.into()));
        self
    }
}

/// A named container of ports.
#[derive(Debug, Clone)]
pub struct Network {
    pub name: String,
    pub managing_nsa: String,
    pub vlan_rewrite: bool,
    ports: HashMap<String, Port>,
}

impl Network {
    pub fn new(name: impl Into<String>, managing_nsa: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            managing_nsa: managing_nsa.into(),
            vlan_rewrite: false,
            ports: HashMap::new(),
        }
    }

    pub fn with_vlan_rewrite(mut self, vlan_rewrite: bool) -> Self {
        self.vlan_rewrite = vlan_rewrite;
        self
    }

    pub fn add_port(mut self, port: Port) -> Self {
        self.ports.insert(port.name.clone(), port);
        self
    }

    pub fn get_port(&self, name: &str) -> Result<&Port, TopologyError> {
        self.ports.get(name).ok_or_else(|| TopologyError::UnknownPort {
            network: self.name.clone(),
            port: name.to_string(),
        })
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }
}

/// Static directed multigraph of networks.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    networks: HashMap<String, Network>,
}

impl Topology {
    pub fn new() -> Self {
        Self {
            networks: HashMap::new(),
        }
    }

    pub fn add_network(&mut self, network: Network) -> Result<(), TopologyError> {
        if self.networks.contains_key(&network.name) {
            return Err(TopologyError::DuplicateNetwork(network.name));
        }
        self.networks.insert(network.name.clone(), network);
        Ok(())
    }

    pub fn get_network(&self, name: &str) -> Result<&Network, TopologyError> {
        self.networks
            .get(name)
            .ok_or_else(|| TopologyError::UnknownNetwork(name.to_string()))
    }

    pub fn get_port(&self, network: &str, port: &str) -> Result<&Port, TopologyError> {
        self.get_network(network)?.get_port(port)
    }

    /// Find all routes from `source` to `dest`, sorted ascending by hop
    /// count, pruned by bandwidth (if given) and VLAN compatibility.
    pub fn find_paths(
        &self,
        source: &Stp,
        dest: &Stp,
        bandwidth: Option<Bandwidth>,
    ) -> Result<Vec<Path>, TopologyError> {
        self.find_paths_with(&HeuristicVlanCompatibility, source, dest, bandwidth)
    }

    /// Same as [`Topology::find_paths`] but with a pluggable VLAN
    /// compatibility predicate, so a richer label algebra can replace the
    /// heuristic without touching the search.
    pub fn find_paths_with(
        &self,
        vlan: &dyn VlanCompatibility,
        source: &Stp,
        dest: &Stp,
        bandwidth: Option<Bandwidth>,
    ) -> Result<Vec<Path>, TopologyError> {
        self.get_port(&source.network, &source.port)?;
        self.get_port(&dest.network, &dest.port)?;

        let mut routes = if source.network == dest.network {
            vec![vec![Link::new(
                source.network.clone(),
                source.port.clone(),
                dest.port.clone(),
                source.labels.clone(),
                dest.labels.clone(),
            )]]
        } else {
            let mut visited = vec![source.network.clone()];
            self.find_path_endpoints(source, dest, &mut visited)?
        };

        if let Some(bw) = bandwidth {
            routes.retain(|route| self.route_has_bandwidth(route, bw));
        }

        routes.retain(|route| self.route_is_vlan_compatible(vlan, route));

        routes.sort_by_key(|r| r.len());

        Ok(routes.into_iter().map(Path::new).collect())
    }

    fn find_path_endpoints(
        &self,
        source: &Stp,
        dest: &Stp,
        visited: &mut Vec<String>,
    ) -> Result<Vec<Vec<Link>>, TopologyError> {
        let network = self.get_network(&source.network)?;
        let mut routes = Vec::new();

        for port in network.ports() {
            let Some((peer_network, peer_port)) = &port.remote else {
                continue;
            };

            if visited.contains(peer_network) {
                continue;
            }

            let hop = Link::new(
                source.network.clone(),
                source.port.clone(),
                port.name.clone(),
                source.labels.clone(),
                port.labels.clone(),
            );

            if *peer_network == dest.network {
                let peer_port_obj = self.get_port(peer_network, peer_port)?;
                let dest_port_obj = self.get_port(&dest.network, &dest.port)?;
                let closing = Link::new(
                    peer_network.clone(),
                    peer_port.clone(),
                    dest.port.clone(),
                    peer_port_obj.labels.clone(),
                    dest_port_obj.labels.clone(),
                );
                routes.push(vec![hop, closing]);
            } else {
                let mut nested_visited = visited.clone();
                nested_visited.push(peer_network.clone());
                let peer_stp = Stp::new(
                    peer_network.clone(),
                    peer_port.clone(),
                    self.get_port(peer_network, peer_port)?.labels.clone(),
                );
                let subroutes = self.find_path_endpoints(&peer_stp, dest, &mut nested_visited)?;
                for mut sub in subroutes {
                    let mut route = vec![hop.clone()];
                    route.append(&mut sub);
                    routes.push(route);
                }
            }
        }

        Ok(routes)
    }

    fn route_has_bandwidth(&self, route: &[Link], bandwidth: Bandwidth) -> bool {
        let Some(minimum) = bandwidth.minimum else {
            return true;
        };

        for link in route {
            let Ok(network) = self.get_network(&link.network) else {
                return false;
            };
            for port_name in [&link.src_port, &link.dst_port] {
                if let Ok(port) = network.get_port(port_name) {
                    if let Some(capacity) = port.available_capacity {
                        if capacity < minimum {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    fn route_is_vlan_compatible(&self, vlan: &dyn VlanCompatibility, route: &[Link]) -> bool {
        route.iter().all(|link| {
            let rewrite_capable = self
                .get_network(&link.network)
                .map(|n| n.vlan_rewrite)
                .unwrap_or(false);
            vlan.can_connect(&link.network, &link.src_port, &link.dst_port, rewrite_capable)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_hop_topology() -> Topology {
        let mut topo = Topology::new();
        topo.add_network(
            Network::new("A", "urn:ogf:network:a")
                .add_port(Port::new("a1"))
                .add_port(Port::new("ax").with_remote("B", "bx")),
        )
        .unwrap();
        topo.add_network(
            Network::new("B", "urn:ogf:network:b")
                .add_port(Port::new("bx").with_remote("A", "ax"))
                .add_port(Port::new("b2")),
        )
        .unwrap();
        topo
    }

    fn three_hop_loop_topology() -> Topology {
        let mut topo = Topology::new();
        topo.add_network(
            Network::new("A", "urn:ogf:network:a")
                .add_port(Port::new("a1"))
                .add_port(Port::new("ax").with_remote("B", "bx"))
                .add_port(Port::new("az").with_remote("C", "cz")),
        )
        .unwrap();
        topo.add_network(
            Network::new("B", "urn:ogf:network:b")
                .add_port(Port::new("bx").with_remote("A", "ax"))
                .add_port(Port::new("by").with_remote("C", "cy")),
        )
        .unwrap();
        topo.add_network(
            Network::new("C", "urn:ogf:network:c")
                .add_port(Port::new("cy").with_remote("B", "by"))
                .add_port(Port::new("cz").with_remote("A", "az"))
                .add_port(Port::new("c1")),
        )
        .unwrap();
        topo
    }

    #[test]
    fn s1_local_link() {
        let mut topo = Topology::new();
        topo.add_network(
            Network::new("N1", "urn:ogf:network:n1")
                .add_port(Port::new("p1"))
                .add_port(Port::new("p2")),
        )
        .unwrap();

        let src = Stp::new("N1", "p1", Labels::empty());
        let dst = Stp::new("N1", "p2", Labels::empty());
        let paths = topo.find_paths(&src, &dst, None).unwrap();

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].hop_count(), 1);
    }

    #[test]
    fn s2_two_hop_path() {
        let topo = two_hop_topology();
        let src = Stp::new("A", "a1", Labels::empty());
        let dst = Stp::new("B", "b2", Labels::empty());

        let paths = topo.find_paths(&src, &dst, None).unwrap();
        assert_eq!(paths.len(), 1);
        let links = paths[0].links();
        assert_eq!(links.len(), 2);
        assert_eq!((links[0].network.as_str(), links[0].src_port.as_str(), links[0].dst_port.as_str()), ("A", "a1", "ax"));
        assert_eq!((links[1].network.as_str(), links[1].src_port.as_str(), links[1].dst_port.as_str()), ("B", "bx", "b2"));
    }

    #[test]
    fn s3_loop_avoidance() {
        let topo = three_hop_loop_topology();
        let src = Stp::new("A", "a1", Labels::empty());
        let dst = Stp::new("C", "c1", Labels::empty());

        let paths = topo.find_paths(&src, &dst, None).unwrap();
        assert_eq!(paths.len(), 1);
        let networks: Vec<&str> = paths[0].links().iter().map(|l| l.network.as_str()).collect();
        assert_eq!(networks, vec!["A", "B", "C"]);
    }

    #[test]
    fn sorted_ascending_by_hop_count() {
        let topo = two_hop_topology();
        let src = Stp::new("A", "a1", Labels::empty());
        let dst = Stp::new("B", "b2", Labels::empty());
        let paths = topo.find_paths(&src, &dst, None).unwrap();
        let hops: Vec<usize> = paths.iter().map(|p| p.hop_count()).collect();
        let mut sorted = hops.clone();
        sorted.sort();
        assert_eq!(hops, sorted);
    }

    #[test]
    fn bandwidth_prunes_insufficient_capacity() {
        let mut topo = Topology::new();
        topo.add_network(
            Network::new("N1", "urn:ogf:network:n1")
                .add_port(Port::new("p1").with_capacity(10))
                .add_port(Port::new("p2")),
        )
        .unwrap();

        let src = Stp::new("N1", "p1", Labels::empty());
        let dst = Stp::new("N1", "p2", Labels::empty());
        let paths = topo
            .find_paths(&src, &dst, Some(Bandwidth { desired: None, minimum: Some(100), maximum: None }))
            .unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn unknown_network_is_an_error() {
        let topo = Topology::new();
        let src = Stp::new("nope", "p1", Labels::empty());
        let dst = Stp::new("also-nope", "p2", Labels::empty());
        assert!(topo.find_paths(&src, &dst, None).is_err());
    }
}
