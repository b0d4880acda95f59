//! The result bundle of one run.

use std::collections::BTreeMap;

use diffusion_types::{AgentStateSnapshot, NetworkStats, RunMetadata, StepResult, StopReason};
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;

/// Everything a run produced, in the shape it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    /// The config the run used.
    pub config: SimulationConfig,
    /// Completed steps, keyed by step number.
    pub adoption_history: BTreeMap<u32, StepResult>,
    /// Structural statistics and the raw topology.
    pub network_metrics: NetworkStats,
    /// Cumulative adoption rate at the end of the run.
    pub total_adoption_rate: f64,
    /// Cumulative adopters at the end of the run.
    pub total_adoptions: u32,
    /// Last completed step; zero if none completed.
    pub final_step: u32,
    /// Wall-clock seconds spent stepping.
    pub simulation_time: f64,
    /// Terminal per-agent state, in population order.
    pub agent_states: Vec<AgentStateSnapshot>,
    /// Why the run stopped; absent for cancelled or failed runs.
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    /// Save metadata, stamped by the result store.
    #[serde(default)]
    pub metadata: Option<RunMetadata>,
}

impl SimulationResults {
    /// The result of `step`, if it completed.
    pub fn step(&self, step: u32) -> Option<&StepResult> {
        self.adoption_history.get(&step)
    }

    /// The last completed step's result.
    pub fn last_step(&self) -> Option<&StepResult> {
        self.adoption_history.values().next_back()
    }

    /// `(step, cumulative adoption rate)` for every completed step.
    pub fn adoption_curve(&self) -> Vec<(u32, f64)> {
        self.adoption_history
            .iter()
            .map(|(&step, r)| (step, r.total_adoption_rate))
            .collect()
    }

    /// Whether the run stopped on its own rather than being interrupted.
    pub const fn is_complete(&self) -> bool {
        self.stop_reason.is_some()
    }
}
