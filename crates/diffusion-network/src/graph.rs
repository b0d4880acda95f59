//! Undirected simple graph over node indices `0..n`.
//!
//! Adjacency is stored as one [`BTreeSet`] per node so iteration order is
//! deterministic, which seeded generation relies on.

use std::collections::{BTreeSet, VecDeque};

/// An undirected graph without self-loops or parallel edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    adjacency: Vec<BTreeSet<u32>>,
}

impl Graph {
    /// A graph with `n` nodes and no edges.
    pub fn empty(n: u32) -> Self {
        Self {
            adjacency: (0..n).map(|_| BTreeSet::new()).collect(),
        }
    }

    /// The complete graph on `n` nodes.
    pub fn complete(n: u32) -> Self {
        let mut graph = Self::empty(n);
        for a in 0..n {
            for b in a.saturating_add(1)..n {
                graph.add_edge(a, b);
            }
        }
        graph
    }

    /// Rebuild a graph from an edge list.
    pub fn from_edges(n: u32, edges: &[(u32, u32)]) -> Self {
        let mut graph = Self::empty(n);
        for &(a, b) in edges {
            graph.add_edge(a, b);
        }
        graph
    }

    /// Number of nodes.
    pub fn node_count(&self) -> u32 {
        u32::try_from(self.adjacency.len()).unwrap_or(u32::MAX)
    }

    /// Add the edge `a-b`. Self-loops, out-of-range nodes, and existing
    /// edges are ignored. Returns `true` if the edge was added.
    pub fn add_edge(&mut self, a: u32, b: u32) -> bool {
        if a == b || a >= self.node_count() || b >= self.node_count() {
            return false;
        }
        let added = self.slot_mut(a).is_some_and(|set| set.insert(b));
        if added && let Some(set) = self.slot_mut(b) {
            set.insert(a);
        }
        added
    }

    /// Remove the edge `a-b` if present.
    pub fn remove_edge(&mut self, a: u32, b: u32) {
        if let Some(set) = self.slot_mut(a) {
            set.remove(&b);
        }
        if let Some(set) = self.slot_mut(b) {
            set.remove(&a);
        }
    }

    /// Whether `a-b` is an edge.
    pub fn has_edge(&self, a: u32, b: u32) -> bool {
        self.slot(a).is_some_and(|set| set.contains(&b))
    }

    /// Degree of `node` (zero for an unknown node).
    pub fn degree(&self, node: u32) -> u32 {
        self.slot(node)
            .map_or(0, |set| u32::try_from(set.len()).unwrap_or(u32::MAX))
    }

    /// Neighbors of `node` in ascending order.
    pub fn neighbors(&self, node: u32) -> impl Iterator<Item = u32> + '_ {
        self.slot(node).into_iter().flat_map(|set| set.iter().copied())
    }

    /// All edges as `(a, b)` with `a < b`, sorted.
    pub fn edges(&self) -> Vec<(u32, u32)> {
        (0..self.node_count())
            .flat_map(|a| self.neighbors(a).filter(move |&b| a < b).map(move |b| (a, b)))
            .collect()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> u32 {
        let endpoints = self
            .adjacency
            .iter()
            .fold(0_u64, |acc, set| acc.saturating_add(u64::try_from(set.len()).unwrap_or(u64::MAX)));
        u32::try_from(endpoints / 2).unwrap_or(u32::MAX)
    }

    /// Connected components, each listed in ascending node order.
    pub fn components(&self) -> Vec<Vec<u32>> {
        let mut seen = BTreeSet::new();
        let mut components = Vec::new();
        for start in 0..self.node_count() {
            if !seen.insert(start) {
                continue;
            }
            let mut members = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for next in self.neighbors(current) {
                    if seen.insert(next) {
                        members.push(next);
                        queue.push_back(next);
                    }
                }
            }
            members.sort_unstable();
            components.push(members);
        }
        components
    }

    /// Hop distances from `source` by breadth-first search.
    ///
    /// `result[i]` is `None` when node `i` is unreachable.
    pub fn distances_from(&self, source: u32) -> Vec<Option<u32>> {
        let mut distances: Vec<Option<u32>> = vec![None; self.adjacency.len()];
        let Some(slot) = usize::try_from(source).ok().and_then(|i| distances.get_mut(i)) else {
            return distances;
        };
        *slot = Some(0);

        let mut queue = VecDeque::from([(source, 0_u32)]);
        while let Some((current, dist)) = queue.pop_front() {
            let next_dist = dist.saturating_add(1);
            for next in self.neighbors(current) {
                if let Some(entry) = usize::try_from(next).ok().and_then(|i| distances.get_mut(i))
                    && entry.is_none()
                {
                    *entry = Some(next_dist);
                    queue.push_back((next, next_dist));
                }
            }
        }
        distances
    }

    /// Local clustering coefficient of `node`: the fraction of neighbor
    /// pairs that are themselves adjacent. Zero for degree below two.
    pub fn local_clustering(&self, node: u32) -> f64 {
        let neighbors: Vec<u32> = self.neighbors(node).collect();
        let degree = u32::try_from(neighbors.len()).unwrap_or(u32::MAX);
        if degree < 2 {
            return 0.0;
        }
        let mut links: u32 = 0;
        for (i, &a) in neighbors.iter().enumerate() {
            for &b in neighbors.iter().skip(i.saturating_add(1)) {
                if self.has_edge(a, b) {
                    links = links.saturating_add(1);
                }
            }
        }
        let possible = f64::from(degree) * f64::from(degree.saturating_sub(1)) / 2.0;
        f64::from(links) / possible
    }

    fn slot(&self, node: u32) -> Option<&BTreeSet<u32>> {
        usize::try_from(node).ok().and_then(|i| self.adjacency.get(i))
    }

    fn slot_mut(&mut self, node: u32) -> Option<&mut BTreeSet<u32>> {
        usize::try_from(node).ok().and_then(|i| self.adjacency.get_mut(i))
    }
}
