//! Consistency checks over a wired population.
//!
//! Validation reads only the agents' neighbor sets, so it can run at any
//! time: right after wiring, after loading a saved run, or in tests.

use std::collections::BTreeMap;

use diffusion_types::AgentId;
use serde::{Deserialize, Serialize};

use crate::NetworkNode;
use crate::graph::Graph;

/// Outcome of [`validate_network`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkValidation {
    /// `true` when `issues` is empty.
    pub valid: bool,
    /// `true` when every neighbor entry is known, mutual, and not a self-link.
    /// A consistent network may still be disconnected.
    pub consistent: bool,
    /// Structural problems.
    pub issues: Vec<String>,
    /// Suspicious but legal properties.
    pub warnings: Vec<String>,
    /// Agents inspected.
    pub total_agents: u32,
    /// Undirected connections (neighbor entries / 2).
    pub total_connections: u32,
    /// Neighbor entries without a matching reverse entry.
    pub asymmetric_links: u32,
    /// Whether the neighbor graph is connected.
    pub is_connected: bool,
    /// Connected components of the neighbor graph.
    pub num_components: u32,
}

/// Check that every neighbor exists, every link is mutual, no agent links
/// to itself, and the population forms a single component.
pub fn validate_network<N: NetworkNode>(nodes: &[N]) -> NetworkValidation {
    let index: BTreeMap<&AgentId, u32> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id(), u32::try_from(i).unwrap_or(u32::MAX)))
        .collect();

    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    let mut entries: u64 = 0;
    let mut asymmetric_links: u32 = 0;
    let mut graph = Graph::empty(u32::try_from(nodes.len()).unwrap_or(u32::MAX));

    for (i, node) in nodes.iter().enumerate() {
        let own = u32::try_from(i).unwrap_or(u32::MAX);
        for neighbor in node.neighbors() {
            entries = entries.saturating_add(1);
            if neighbor == node.id() {
                issues.push(format!("agent {} lists itself as a neighbor", node.id()));
                continue;
            }
            let Some(&other) = index.get(neighbor) else {
                issues.push(format!(
                    "agent {} has unknown neighbor {neighbor}",
                    node.id()
                ));
                continue;
            };
            let mutual = usize::try_from(other)
                .ok()
                .and_then(|j| nodes.get(j))
                .is_some_and(|peer| peer.neighbors().contains(node.id()));
            if !mutual {
                asymmetric_links = asymmetric_links.saturating_add(1);
                issues.push(format!(
                    "link {} -> {neighbor} has no reverse entry",
                    node.id()
                ));
            }
            graph.add_edge(own, other);
        }
    }

    let consistent = issues.is_empty();
    let num_components = u32::try_from(graph.components().len()).unwrap_or(u32::MAX);
    let is_connected = num_components <= 1;
    if !is_connected {
        issues.push(format!("network has {num_components} disconnected components"));
    }

    let total_agents = u32::try_from(nodes.len()).unwrap_or(u32::MAX);
    let total_connections = u32::try_from(entries / 2).unwrap_or(u32::MAX);
    if entries == 0 {
        warnings.push("network has no connections".to_owned());
    } else if total_agents > 0 {
        let avg = f64::from(u32::try_from(entries).unwrap_or(u32::MAX)) / f64::from(total_agents);
        if avg < 2.0 {
            warnings.push(format!("low average connectivity: {avg:.2} neighbors per agent"));
        }
    }

    NetworkValidation {
        valid: issues.is_empty(),
        consistent,
        issues,
        warnings,
        total_agents,
        total_connections,
        asymmetric_links,
        is_connected,
        num_components,
    }
}
