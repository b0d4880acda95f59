//! Structural statistics over a generated topology.

use std::collections::BTreeMap;

use diffusion_types::{AdopterCategory, AgentId, NetworkStats, Topology, TopologyKind};

use crate::graph::Graph;

/// Compute [`NetworkStats`] for `graph`.
///
/// `agents[i]` and `categories[i]` describe the agent placed on node `i`.
/// Path-based measures are only computed for a connected graph with more
/// than one node. `creation_time` is left at zero for the caller to fill.
pub fn compute_stats(
    graph: &Graph,
    kind: TopologyKind,
    agents: Vec<AgentId>,
    categories: &[AdopterCategory],
) -> NetworkStats {
    let n = graph.node_count();
    let edges = graph.edges();
    let total_edges = graph.edge_count();
    let nodes = f64::from(n);

    let avg_degree = if n > 0 {
        2.0 * f64::from(total_edges) / nodes
    } else {
        0.0
    };
    let density = if n > 1 {
        2.0 * f64::from(total_edges) / (nodes * (nodes - 1.0))
    } else {
        0.0
    };

    let avg_clustering = if n > 0 {
        (0..n).map(|u| graph.local_clustering(u)).sum::<f64>() / nodes
    } else {
        0.0
    };

    let components = graph.components();
    let num_components = u32::try_from(components.len()).unwrap_or(u32::MAX);
    let is_connected = num_components == 1;

    let (avg_shortest_path, diameter) = if is_connected && n > 1 {
        let (sum, longest) = path_lengths(graph);
        let pairs = nodes * (nodes - 1.0);
        (Some(sum / pairs), Some(longest))
    } else {
        (None, None)
    };

    let degrees: Vec<u32> = (0..n).map(|u| graph.degree(u)).collect();
    let min_degree = degrees.iter().copied().min().unwrap_or(0);
    let max_degree = degrees.iter().copied().max().unwrap_or(0);
    let std_degree = std_dev(&degrees);
    let isolated_nodes = u32::try_from(degrees.iter().filter(|&&d| d == 0).count()).unwrap_or(0);

    let edges_by_category = attribute_edges(&edges, categories);

    NetworkStats {
        network_type: kind,
        total_edges,
        avg_degree,
        density,
        avg_clustering,
        is_connected,
        num_components,
        avg_shortest_path,
        diameter,
        min_degree,
        max_degree,
        std_degree,
        isolated_nodes,
        edges_by_category,
        creation_time: 0.0,
        topology: Topology {
            kind,
            node_count: n,
            edges,
            agents,
        },
    }
}

/// Sum of all ordered-pair distances and the longest distance.
fn path_lengths(graph: &Graph) -> (f64, u32) {
    let mut sum = 0.0;
    let mut longest = 0_u32;
    for source in 0..graph.node_count() {
        for dist in graph.distances_from(source).into_iter().flatten() {
            sum += f64::from(dist);
            longest = longest.max(dist);
        }
    }
    (sum, longest)
}

fn std_dev(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let count = f64::from(u32::try_from(values.len()).unwrap_or(u32::MAX));
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|&v| {
            let diff = f64::from(v) - mean;
            diff * diff
        })
        .sum::<f64>()
        / count;
    variance.sqrt()
}

/// Count edges per category, attributing cross-category edges by
/// [`AdopterCategory::PRIORITY`].
fn attribute_edges(
    edges: &[(u32, u32)],
    categories: &[AdopterCategory],
) -> BTreeMap<AdopterCategory, u32> {
    let mut counts: BTreeMap<AdopterCategory, u32> =
        AdopterCategory::PRIORITY.iter().map(|&c| (c, 0)).collect();
    let category_of = |node: u32| usize::try_from(node).ok().and_then(|i| categories.get(i));
    for &(a, b) in edges {
        if let (Some(&ca), Some(&cb)) = (category_of(a), category_of(b)) {
            let entry = counts.entry(AdopterCategory::dominant(ca, cb)).or_insert(0);
            *entry = entry.saturating_add(1);
        }
    }
    counts
}
