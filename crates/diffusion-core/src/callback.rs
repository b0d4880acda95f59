//! Progress notifications from the simulation engine.
//!
//! Callbacks are fire-and-forget: the engine ignores anything they do and
//! they cannot influence the run.

use diffusion_types::{NetworkStats, StepResult};
use tracing::{error, info};

use crate::results::SimulationResults;

/// Observer of a run's lifecycle.
///
/// Every method has an empty default so implementors override only what
/// they need.
pub trait ProgressCallback: Send {
    /// The population was created and wired.
    fn initialized(&mut self, _stats: &NetworkStats) {}

    /// A step is about to run.
    fn step_started(&mut self, _step: u32) {}

    /// A step finished and was recorded.
    fn step_completed(&mut self, _step: u32, _result: &StepResult) {}

    /// The run completed.
    fn completed(&mut self, _results: &SimulationResults) {}

    /// The run failed.
    fn error(&mut self, _message: &str) {}
}

/// A callback that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl ProgressCallback for NoOpCallback {}

/// Reports progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCallback;

impl ProgressCallback for LoggingCallback {
    fn initialized(&mut self, stats: &NetworkStats) {
        info!(
            network_type = %stats.network_type,
            nodes = stats.topology.node_count,
            edges = stats.total_edges,
            avg_degree = stats.avg_degree,
            is_connected = stats.is_connected,
            "Simulation initialized"
        );
    }

    fn step_started(&mut self, step: u32) {
        info!(step, "Step started");
    }

    fn step_completed(&mut self, step: u32, result: &StepResult) {
        info!(
            step,
            new_adoptions = result.new_adoptions,
            total_adoption_rate = result.total_adoption_rate,
            duration_secs = result.orchestration_time,
            "Step recorded"
        );
    }

    fn completed(&mut self, results: &SimulationResults) {
        info!(
            final_step = results.final_step,
            total_adoptions = results.total_adoptions,
            total_adoption_rate = results.total_adoption_rate,
            simulation_time = results.simulation_time,
            "Simulation completed"
        );
    }

    fn error(&mut self, message: &str) {
        error!(message, "Simulation failed");
    }
}
