//! Core data structs: innovation attributes, decision payloads, and the
//! per-step and per-agent records accumulated by a run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{AdopterCategory, AdoptionDecision};
use crate::ids::AgentId;

// ---------------------------------------------------------------------------
// Innovation attributes
// ---------------------------------------------------------------------------

/// Rogers' five perceived attributes of an innovation, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InnovationAttributes {
    /// Perceived benefit over the current solution.
    #[serde(default = "default_relative_advantage")]
    pub relative_advantage: f64,
    /// Fit with existing values and practices.
    #[serde(default = "default_compatibility")]
    pub compatibility: f64,
    /// Difficulty to understand and use (0 is very easy).
    #[serde(default = "default_complexity")]
    pub complexity: f64,
    /// Ease of experimenting before committing.
    #[serde(default = "default_trialability")]
    pub trialability: f64,
    /// Visibility of results to others.
    #[serde(default = "default_observability")]
    pub observability: f64,
}

impl InnovationAttributes {
    /// Build a set of attributes from explicit scores.
    pub const fn new(
        relative_advantage: f64,
        compatibility: f64,
        complexity: f64,
        trialability: f64,
        observability: f64,
    ) -> Self {
        Self {
            relative_advantage,
            compatibility,
            complexity,
            trialability,
            observability,
        }
    }

    /// Named scores in a fixed order.
    pub const fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("relative_advantage", self.relative_advantage),
            ("compatibility", self.compatibility),
            ("complexity", self.complexity),
            ("trialability", self.trialability),
            ("observability", self.observability),
        ]
    }
}

impl Default for InnovationAttributes {
    fn default() -> Self {
        Self::new(
            default_relative_advantage(),
            default_compatibility(),
            default_complexity(),
            default_trialability(),
            default_observability(),
        )
    }
}

const fn default_relative_advantage() -> f64 {
    0.7
}

const fn default_compatibility() -> f64 {
    0.6
}

const fn default_complexity() -> f64 {
    0.4
}

const fn default_trialability() -> f64 {
    0.8
}

const fn default_observability() -> f64 {
    0.5
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// A validated decision returned by the Decision Oracle.
///
/// `decision` and `reasoning` are always present. The narrative and the
/// three 0-10 indicators are required on normal attempts but may be absent
/// when the payload was accepted in degraded mode on the final attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPayload {
    /// Free-form thought process.
    pub thinking: Option<String>,
    /// Adopt or not.
    pub decision: AdoptionDecision,
    /// Main factors behind the decision.
    pub reasoning: String,
    /// How much the agent's neighbors influenced the decision (0-10).
    pub network_influence_level: Option<u8>,
    /// How much the global adoption rate influenced the decision (0-10).
    pub global_influence_level: Option<u8>,
    /// Self-reported confidence (0-10).
    pub confidence_level: Option<u8>,
    /// Whether the payload was accepted with missing or invalid ancillary fields.
    #[serde(default)]
    pub degraded: bool,
}

/// One agent's entry in a [`StepResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecisionRecord {
    /// The deciding agent.
    pub agent_id: AgentId,
    /// The agent's category.
    pub category: AdopterCategory,
    /// True when the agent had adopted before this step and was not asked.
    pub adopted_before: bool,
    /// Adoption status after this step.
    pub has_adopted: bool,
    /// Step at which the agent first adopted, if any.
    pub adoption_step: Option<u32>,
    /// The validated payload, absent for adopted-before records.
    pub payload: Option<DecisionPayload>,
    /// The raw oracle text the payload was parsed from.
    pub raw_output: Option<String>,
    /// Oracle calls spent on this agent during the step.
    pub attempts: u32,
    /// Wall-clock seconds spent deciding.
    pub decision_time: f64,
}

impl AgentDecisionRecord {
    /// The decision made this step, if the agent was asked.
    pub fn decision(&self) -> Option<AdoptionDecision> {
        self.payload.as_ref().map(|p| p.decision)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Adoption figures for one category after one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryAdoption {
    /// Agents in the category.
    pub agents: u32,
    /// Cumulative adopters in the category.
    pub adopted: u32,
    /// Adopters gained this step.
    pub new_adoptions: u32,
    /// `adopted / agents`, zero for an empty category.
    pub cumulative_rate: f64,
    /// `new_adoptions / agents`, zero for an empty category.
    pub incremental_rate: f64,
}

/// Aggregated outcome of one simulation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based step number.
    pub step: u32,
    /// Adopters gained this step.
    pub new_adoptions: u32,
    /// Cumulative adopters after this step.
    pub total_adoptions: u32,
    /// `total_adoptions / population`.
    pub total_adoption_rate: f64,
    /// `new_adoptions / population`.
    pub adoption_rate: f64,
    /// Per-category figures, in canonical category order.
    pub per_category: BTreeMap<AdopterCategory, CategoryAdoption>,
    /// Agents not asked this step because of the speed-up shortcut.
    pub skipped_agents: u32,
    /// Per-agent records in population order.
    pub agents_results: Vec<AgentDecisionRecord>,
    /// Wall-clock seconds the step took.
    pub orchestration_time: f64,
}

// ---------------------------------------------------------------------------
// Terminal state
// ---------------------------------------------------------------------------

/// Final state of one agent at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStateSnapshot {
    /// The agent.
    pub agent_id: AgentId,
    /// The agent's category.
    pub adopter_category: AdopterCategory,
    /// Whether the agent adopted at any point.
    pub has_adopted: bool,
    /// Step of first adoption.
    pub adoption_step: Option<u32>,
    /// Accepted oracle decisions over the run.
    pub adoption_attempts: u32,
    /// Size of the agent's neighbor set.
    pub neighbor_count: u32,
}

/// Metadata stamped onto a run when it is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// When the run was saved.
    pub save_date: DateTime<Utc>,
    /// Version of the application that wrote the file.
    pub app_version: String,
    /// Human-readable description.
    pub description: String,
    /// Wall-clock seconds of the run.
    pub simulation_time: f64,
    /// Population size.
    pub total_agents: u32,
    /// Name of the config that produced the run.
    pub config_name: String,
}
