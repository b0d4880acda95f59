//! Concrete network topology and its structural statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::{AdopterCategory, TopologyKind};
use crate::ids::AgentId;

/// An undirected graph over node indices `0..node_count`, together with the
/// agent each node was mapped onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Family the graph was generated from.
    pub kind: TopologyKind,
    /// Number of nodes.
    pub node_count: u32,
    /// Undirected edges with `a < b`, sorted.
    pub edges: Vec<(u32, u32)>,
    /// `agents[i]` is the agent placed on node `i`. Empty until mapped.
    #[serde(default)]
    pub agents: Vec<AgentId>,
}

impl Topology {
    /// Number of undirected edges.
    pub fn edge_count(&self) -> u32 {
        u32::try_from(self.edges.len()).unwrap_or(u32::MAX)
    }

    /// The agent placed on `node`, once mapped.
    pub fn agent_at(&self, node: u32) -> Option<&AgentId> {
        usize::try_from(node).ok().and_then(|i| self.agents.get(i))
    }
}

/// Structural statistics of a generated network.
///
/// Path-based measures are `None` when the graph is disconnected or has at
/// most one node, where they are undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Topology family.
    pub network_type: TopologyKind,
    /// Undirected edge count.
    pub total_edges: u32,
    /// `2E / N`.
    pub avg_degree: f64,
    /// `2E / (N (N - 1))`.
    pub density: f64,
    /// Mean local clustering coefficient over all nodes.
    pub avg_clustering: f64,
    /// Whether every node is reachable from every other node.
    pub is_connected: bool,
    /// Number of connected components.
    pub num_components: u32,
    /// Mean shortest-path length over ordered node pairs.
    pub avg_shortest_path: Option<f64>,
    /// Longest shortest path.
    pub diameter: Option<u32>,
    /// Smallest node degree.
    pub min_degree: u32,
    /// Largest node degree.
    pub max_degree: u32,
    /// Population standard deviation of node degrees.
    pub std_degree: f64,
    /// Nodes with no edges.
    pub isolated_nodes: u32,
    /// Edges attributed to each category by [`AdopterCategory::PRIORITY`].
    pub edges_by_category: BTreeMap<AdopterCategory, u32>,
    /// Seconds spent generating and mapping the network.
    pub creation_time: f64,
    /// The graph these statistics describe.
    pub topology: Topology,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_lookup_by_node() {
        let topology = Topology {
            kind: TopologyKind::Random,
            node_count: 2,
            edges: vec![(0, 1)],
            agents: vec![AgentId::from("a"), AgentId::from("b")],
        };
        assert_eq!(topology.edge_count(), 1);
        assert_eq!(topology.agent_at(1).map(AgentId::as_str), Some("b"));
        assert!(topology.agent_at(2).is_none());
    }
}
