//! Network topology generation for the diffusion simulation.
//!
//! The generator builds an undirected graph over anonymous node indices,
//! maps the nodes onto agents (optionally through a seeded permutation),
//! and materializes every edge as a symmetric pair of neighbor-set entries.
//!
//! # Modules
//!
//! - [`graph`] -- Adjacency-set graph with BFS, components, and clustering
//! - [`generator`] -- Small-world, scale-free, and random topology families
//! - [`stats`] -- Structural statistics over a mapped topology
//! - [`validation`] -- Consistency checks over agent neighbor sets
//! - [`error`] -- Error types for network construction

pub mod error;
pub mod generator;
pub mod graph;
pub mod stats;
pub mod validation;

use std::collections::BTreeSet;

use diffusion_types::{AdopterCategory, AgentId};

pub use error::NetworkError;
pub use generator::{NetworkGenerator, TopologyParams};
pub use graph::Graph;
pub use validation::{NetworkValidation, validate_network};

/// Something the generator can wire into a network.
///
/// Implemented by the simulation's agents. Wiring replaces whatever
/// neighbor sets the nodes had before.
pub trait NetworkNode {
    /// The node's agent id.
    fn id(&self) -> &AgentId;

    /// The node's adopter category.
    fn category(&self) -> AdopterCategory;

    /// The current neighbor set.
    fn neighbors(&self) -> &BTreeSet<AgentId>;

    /// Add `other` as a neighbor. Returns `true` if the set changed.
    fn add_connection(&mut self, other: &AgentId) -> bool;

    /// Drop every neighbor.
    fn clear_connections(&mut self);
}
