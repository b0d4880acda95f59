//! Shared type definitions for the innovation diffusion simulation.
//!
//! Every crate in the workspace speaks in these types: the network
//! generator produces [`NetworkStats`], the orchestrator produces
//! [`StepResult`] values, and the result store persists all of them.
//!
//! # Modules
//!
//! - [`ids`] -- Agent identifiers
//! - [`enums`] -- Adopter categories, decisions, topology families, stop reasons
//! - [`structs`] -- Innovation attributes, decision payloads, step results
//! - [`topology`] -- Concrete topology and structural network statistics

pub mod enums;
pub mod ids;
pub mod structs;
pub mod topology;

pub use enums::{AdopterCategory, AdoptionDecision, StopReason, TopologyKind};
pub use ids::AgentId;
pub use structs::{
    AgentDecisionRecord, AgentStateSnapshot, CategoryAdoption, DecisionPayload,
    InnovationAttributes, RunMetadata, StepResult,
};
pub use topology::{NetworkStats, Topology};
