//! Topology families and the network generator.
//!
//! Each family is generated over node indices `0..n` from a seeded
//! [`StdRng`]. The node-to-agent permutation uses a second RNG seeded the
//! same way, so the topology and the placement of agents on it are
//! independently reproducible.

use std::collections::BTreeSet;
use std::time::Instant;

use diffusion_types::{AgentId, NetworkStats, TopologyKind};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::NetworkError;
use crate::graph::Graph;
use crate::stats::compute_stats;
use crate::NetworkNode;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Topology family selector with its family-specific parameters.
///
/// Serialized as two keys, `network_type` and a `network_params` mapping,
/// so it can be flattened into a config document. Missing parameters take
/// the family defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TopologyFields", into = "TopologyFields")]
pub enum TopologyParams {
    /// Ring lattice of `k` nearest neighbors, each edge rewired with
    /// probability `rewiring_prob`.
    SmallWorld {
        /// Nearest neighbors per node before rewiring.
        k: u32,
        /// Per-edge rewiring probability.
        rewiring_prob: f64,
    },
    /// Preferential attachment where each new node links to `m` existing nodes.
    ScaleFree {
        /// Edges added per new node.
        m: u32,
        /// Degree-distribution exponent. Validated but not used by growth.
        alpha: f64,
    },
    /// Every pair linked independently with probability `p`.
    Random {
        /// Edge inclusion probability.
        p: f64,
    },
}

/// Wire shape of [`TopologyParams`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct TopologyFields {
    #[serde(default = "default_kind")]
    network_type: TopologyKind,
    #[serde(default)]
    network_params: ParamFields,
}

/// Family parameters; only the selected family's keys are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct ParamFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rewiring_prob: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    m: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alpha: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    p: Option<f64>,
}

impl From<TopologyFields> for TopologyParams {
    fn from(fields: TopologyFields) -> Self {
        let params = fields.network_params;
        match fields.network_type {
            TopologyKind::SmallWorld => Self::SmallWorld {
                k: params.k.unwrap_or_else(default_k),
                rewiring_prob: params.rewiring_prob.unwrap_or_else(default_rewiring_prob),
            },
            TopologyKind::ScaleFree => Self::ScaleFree {
                m: params.m.unwrap_or_else(default_m),
                alpha: params.alpha.unwrap_or_else(default_alpha),
            },
            TopologyKind::Random => Self::Random {
                p: params.p.unwrap_or_else(default_p),
            },
        }
    }
}

impl From<TopologyParams> for TopologyFields {
    fn from(params: TopologyParams) -> Self {
        let network_params = match params {
            TopologyParams::SmallWorld { k, rewiring_prob } => ParamFields {
                k: Some(k),
                rewiring_prob: Some(rewiring_prob),
                ..ParamFields::default()
            },
            TopologyParams::ScaleFree { m, alpha } => ParamFields {
                m: Some(m),
                alpha: Some(alpha),
                ..ParamFields::default()
            },
            TopologyParams::Random { p } => ParamFields {
                p: Some(p),
                ..ParamFields::default()
            },
        };
        Self {
            network_type: params.kind(),
            network_params,
        }
    }
}

impl TopologyParams {
    /// The family these parameters select.
    pub const fn kind(&self) -> TopologyKind {
        match self {
            Self::SmallWorld { .. } => TopologyKind::SmallWorld,
            Self::ScaleFree { .. } => TopologyKind::ScaleFree,
            Self::Random { .. } => TopologyKind::Random,
        }
    }

    /// Default parameters for a family.
    pub const fn defaults_for(kind: TopologyKind) -> Self {
        match kind {
            TopologyKind::SmallWorld => Self::SmallWorld {
                k: default_k(),
                rewiring_prob: default_rewiring_prob(),
            },
            TopologyKind::ScaleFree => Self::ScaleFree {
                m: default_m(),
                alpha: default_alpha(),
            },
            TopologyKind::Random => Self::Random { p: default_p() },
        }
    }
}

impl Default for TopologyParams {
    fn default() -> Self {
        Self::defaults_for(TopologyKind::SmallWorld)
    }
}

const fn default_kind() -> TopologyKind {
    TopologyKind::SmallWorld
}

const fn default_k() -> u32 {
    4
}

const fn default_rewiring_prob() -> f64 {
    0.3
}

const fn default_m() -> u32 {
    2
}

const fn default_alpha() -> f64 {
    2.5
}

const fn default_p() -> f64 {
    0.1
}

/// The neighbor count a small-world lattice over `n` nodes actually uses.
///
/// Clamped to `[2, n - 1]`, then made even: rounded up when there is room,
/// down otherwise.
pub fn effective_neighbor_count(k: u32, n: u32) -> u32 {
    let k = k.min(n.saturating_sub(1)).max(2);
    if k % 2 == 0 {
        k
    } else if k < n.saturating_sub(1) {
        k.saturating_add(1)
    } else {
        k.saturating_sub(1)
    }
}

/// The attachment count a scale-free graph over `n` nodes actually uses.
pub fn effective_attachment_count(m: u32, n: u32) -> u32 {
    m.clamp(1, n.saturating_sub(1).max(1))
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Builds a topology and wires it into a population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkGenerator {
    params: TopologyParams,
    seed: Option<u64>,
    shuffle: bool,
}

impl NetworkGenerator {
    /// Create a generator. `seed = None` draws fresh randomness per run.
    pub const fn new(params: TopologyParams, seed: Option<u64>, shuffle: bool) -> Self {
        Self {
            params,
            seed,
            shuffle,
        }
    }

    /// The configured topology parameters.
    pub const fn params(&self) -> &TopologyParams {
        &self.params
    }

    /// Generate the bare topology over `n` anonymous nodes.
    pub fn build_topology(&self, n: u32) -> Result<Graph, NetworkError> {
        let kind = self.params.kind();
        if n < 2 {
            return Err(NetworkError::TooFewAgents {
                kind,
                count: usize::try_from(n).unwrap_or(usize::MAX),
            });
        }

        let mut rng = seeded_rng(self.seed);
        let graph = match self.params {
            TopologyParams::SmallWorld { k, rewiring_prob } => {
                check_probability("rewiring_prob", rewiring_prob)?;
                let k = effective_neighbor_count(k, n);
                small_world(n, k, rewiring_prob, &mut rng)
            }
            TopologyParams::ScaleFree { m, .. } => {
                scale_free(n, effective_attachment_count(m, n), &mut rng)
            }
            TopologyParams::Random { p } => {
                check_probability("p", p)?;
                random(n, p, &mut rng)
            }
        };

        debug!(
            network_type = %kind,
            nodes = n,
            edges = graph.edge_count(),
            "topology generated"
        );
        Ok(graph)
    }

    /// Node-to-population-index mapping: `mapping[node]` is the index of
    /// the agent placed on `node`.
    ///
    /// Identity unless shuffling is enabled, in which case a seeded
    /// permutation decouples network position from creation order.
    pub fn node_mapping(&self, n: usize) -> Vec<usize> {
        let mut mapping: Vec<usize> = (0..n).collect();
        if self.shuffle {
            let mut rng = seeded_rng(self.seed);
            mapping.shuffle(&mut rng);
        }
        mapping
    }

    /// Build the topology, map it onto `nodes`, and add every edge to both
    /// endpoints' neighbor sets. Existing connections are cleared first, so
    /// regenerating onto the same nodes never keeps stale links. Returns the
    /// statistics of the result.
    pub fn generate<N: NetworkNode>(&self, nodes: &mut [N]) -> Result<NetworkStats, NetworkError> {
        let started = Instant::now();
        let kind = self.params.kind();
        let n = u32::try_from(nodes.len())
            .map_err(|_| NetworkError::TooManyAgents { count: nodes.len() })?;
        let graph = self.build_topology(n)?;

        let mapping = self.node_mapping(nodes.len());
        let ids: Vec<AgentId> = nodes.iter().map(|node| node.id().clone()).collect();

        for node in nodes.iter_mut() {
            node.clear_connections();
        }

        for (a, b) in graph.edges() {
            let (Some(&ia), Some(&ib)) = (node_slot(&mapping, a), node_slot(&mapping, b)) else {
                continue;
            };
            if let (Some(id_a), Some(id_b)) = (ids.get(ia), ids.get(ib)) {
                if let Some(node) = nodes.get_mut(ia) {
                    node.add_connection(id_b);
                }
                if let Some(node) = nodes.get_mut(ib) {
                    node.add_connection(id_a);
                }
            }
        }

        let agents = mapping
            .iter()
            .filter_map(|&i| ids.get(i).cloned())
            .collect();
        let categories = mapping
            .iter()
            .filter_map(|&i| nodes.get(i).map(NetworkNode::category))
            .collect::<Vec<_>>();

        let mut stats = compute_stats(&graph, kind, agents, &categories);
        stats.creation_time = started.elapsed().as_secs_f64();

        info!(
            network_type = %kind,
            agents = n,
            edges = stats.total_edges,
            avg_degree = stats.avg_degree,
            connected = stats.is_connected,
            components = stats.num_components,
            shuffled = self.shuffle,
            "network wired"
        );
        Ok(stats)
    }
}

fn node_slot(mapping: &[usize], node: u32) -> Option<&usize> {
    usize::try_from(node).ok().and_then(|i| mapping.get(i))
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

fn check_probability(name: &'static str, value: f64) -> Result<(), NetworkError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(NetworkError::InvalidProbability { name, value })
    }
}

// ---------------------------------------------------------------------------
// Topology families
// ---------------------------------------------------------------------------

/// Watts-Strogatz: ring lattice of `k` neighbors, then each lattice edge
/// `(u, u + j)` is rewired to a uniformly chosen non-neighbor of `u` with
/// probability `p`. A node already linked to every other node keeps its edge.
fn small_world(n: u32, k: u32, p: f64, rng: &mut StdRng) -> Graph {
    if k >= n {
        return Graph::complete(n);
    }
    let mut graph = Graph::empty(n);
    let half = k / 2;
    for j in 1..=half {
        for u in 0..n {
            graph.add_edge(u, ring_offset(u, j, n));
        }
    }

    for j in 1..=half {
        for u in 0..n {
            if rng.random::<f64>() >= p {
                continue;
            }
            let v = ring_offset(u, j, n);
            let mut w = rng.random_range(0..n);
            let mut saturated = false;
            while w == u || graph.has_edge(u, w) {
                w = rng.random_range(0..n);
                if graph.degree(u) >= n.saturating_sub(1) {
                    saturated = true;
                    break;
                }
            }
            if !saturated {
                graph.remove_edge(u, v);
                graph.add_edge(u, w);
            }
        }
    }
    graph
}

fn ring_offset(u: u32, j: u32, n: u32) -> u32 {
    let shifted = u64::from(u).saturating_add(u64::from(j)) % u64::from(n.max(1));
    u32::try_from(shifted).unwrap_or(0)
}

/// Barabasi-Albert: a star over the first `m + 1` nodes, then every new
/// node attaches to `m` distinct targets drawn proportionally to degree.
fn scale_free(n: u32, m: u32, rng: &mut StdRng) -> Graph {
    let mut graph = Graph::empty(n);
    for leaf in 1..=m {
        graph.add_edge(0, leaf);
    }

    // Each node appears once per incident edge end.
    let mut repeated: Vec<u32> = Vec::new();
    for node in 0..=m {
        for _ in 0..graph.degree(node) {
            repeated.push(node);
        }
    }

    for source in m.saturating_add(1)..n {
        let targets = sample_distinct(&repeated, m, rng);
        for &target in &targets {
            graph.add_edge(source, target);
        }
        repeated.extend(targets.iter().copied());
        repeated.extend(std::iter::repeat_n(source, usize::try_from(m).unwrap_or(0)));
    }
    graph
}

fn sample_distinct(pool: &[u32], count: u32, rng: &mut StdRng) -> BTreeSet<u32> {
    let mut chosen = BTreeSet::new();
    let wanted = usize::try_from(count).unwrap_or(0);
    let distinct = pool.iter().collect::<BTreeSet<_>>().len();
    if pool.is_empty() {
        return chosen;
    }
    while chosen.len() < wanted.min(distinct) {
        if let Some(&node) = pool.get(rng.random_range(0..pool.len())) {
            chosen.insert(node);
        }
    }
    chosen
}

/// Erdos-Renyi: every unordered pair linked with probability `p`.
fn random(n: u32, p: f64, rng: &mut StdRng) -> Graph {
    if p <= 0.0 {
        return Graph::empty(n);
    }
    if p >= 1.0 {
        return Graph::complete(n);
    }
    let mut graph = Graph::empty(n);
    for u in 0..n {
        for v in u.saturating_add(1)..n {
            if rng.random::<f64>() < p {
                graph.add_edge(u, v);
            }
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_count_is_even_and_in_range() {
        for n in 3..40 {
            for k in 1..45 {
                let eff = effective_neighbor_count(k, n);
                assert_eq!(eff % 2, 0, "k={k} n={n}");
                assert!(eff >= 2);
                assert!(eff < n, "k={k} n={n} eff={eff}");
            }
        }
        assert_eq!(effective_neighbor_count(3, 10), 4);
        assert_eq!(effective_neighbor_count(9, 10), 8);
        assert_eq!(effective_neighbor_count(1, 10), 2);
    }

    #[test]
    fn attachment_count_is_clamped() {
        assert_eq!(effective_attachment_count(0, 10), 1);
        assert_eq!(effective_attachment_count(50, 10), 9);
        assert_eq!(effective_attachment_count(3, 10), 3);
    }

    #[test]
    fn unrewired_ring_has_exact_degree() {
        let generator = NetworkGenerator::new(
            TopologyParams::SmallWorld { k: 4, rewiring_prob: 0.0 },
            Some(7),
            false,
        );
        let graph = generator.build_topology(12).unwrap_or_else(|_| Graph::empty(0));
        assert_eq!(graph.node_count(), 12);
        assert_eq!(graph.edge_count(), 24);
        assert!((0..12).all(|u| graph.degree(u) == 4));
        assert!(graph.has_edge(0, 11));
        assert!(graph.has_edge(0, 10));
    }

    #[test]
    fn rewiring_preserves_edge_count() {
        let generator = NetworkGenerator::new(
            TopologyParams::SmallWorld { k: 4, rewiring_prob: 0.5 },
            Some(99),
            false,
        );
        let graph = generator.build_topology(30).unwrap_or_else(|_| Graph::empty(0));
        assert_eq!(graph.edge_count(), 60);
    }

    #[test]
    fn scale_free_edge_count() {
        let generator =
            NetworkGenerator::new(TopologyParams::ScaleFree { m: 2, alpha: 2.5 }, Some(3), false);
        let graph = generator.build_topology(20).unwrap_or_else(|_| Graph::empty(0));
        // star of m edges, then m edges per remaining node
        assert_eq!(graph.edge_count(), 2 + 2 * 17);
        assert_eq!(graph.components().len(), 1);
    }

    #[test]
    fn random_extremes() {
        let empty = NetworkGenerator::new(TopologyParams::Random { p: 0.0 }, Some(1), false)
            .build_topology(10)
            .unwrap_or_else(|_| Graph::complete(1));
        assert_eq!(empty.edge_count(), 0);
        let full = NetworkGenerator::new(TopologyParams::Random { p: 1.0 }, Some(1), false)
            .build_topology(10)
            .unwrap_or_else(|_| Graph::empty(1));
        assert_eq!(full.edge_count(), 45);
    }

    #[test]
    fn too_few_nodes_is_an_error() {
        let generator = NetworkGenerator::new(TopologyParams::default(), None, true);
        assert!(matches!(
            generator.build_topology(1),
            Err(NetworkError::TooFewAgents { count: 1, .. })
        ));
    }

    #[test]
    fn invalid_probability_is_an_error() {
        let generator = NetworkGenerator::new(TopologyParams::Random { p: 1.5 }, Some(1), false);
        assert!(matches!(
            generator.build_topology(5),
            Err(NetworkError::InvalidProbability { name: "p", .. })
        ));
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let generator = NetworkGenerator::new(
            TopologyParams::SmallWorld { k: 4, rewiring_prob: 0.3 },
            Some(314),
            true,
        );
        let a = generator.build_topology(50).map(|g| g.edges()).unwrap_or_default();
        let b = generator.build_topology(50).map(|g| g.edges()).unwrap_or_default();
        assert_eq!(a, b);
        assert_eq!(generator.node_mapping(50), generator.node_mapping(50));
    }

    #[test]
    fn mapping_is_a_permutation() {
        let generator = NetworkGenerator::new(TopologyParams::default(), Some(5), true);
        let mut mapping = generator.node_mapping(25);
        mapping.sort_unstable();
        assert_eq!(mapping, (0..25).collect::<Vec<_>>());

        let identity = NetworkGenerator::new(TopologyParams::default(), Some(5), false);
        assert_eq!(identity.node_mapping(4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn params_deserialize_with_family_defaults() {
        let parsed: Result<TopologyParams, _> = serde_json::from_str(
            r#"{"network_type": "scale_free", "network_params": {"m": 3}}"#,
        );
        assert!(matches!(
            parsed,
            Ok(TopologyParams::ScaleFree { m: 3, alpha }) if (alpha - 2.5).abs() < f64::EPSILON
        ));

        let bare: Result<TopologyParams, _> = serde_json::from_str("{}");
        assert_eq!(bare.ok(), Some(TopologyParams::default()));
    }

    #[test]
    fn params_serialize_as_type_and_params() {
        let value = serde_json::to_value(TopologyParams::Random { p: 0.25 });
        assert_eq!(
            value.ok(),
            Some(serde_json::json!({"network_type": "random", "network_params": {"p": 0.25}}))
        );
    }
}
