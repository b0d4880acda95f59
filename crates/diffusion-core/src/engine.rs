//! Run lifecycle: initialization, the step loop, early stopping, and
//! finalization.
//!
//! ```text
//! Idle -> Initialized -> Running -> Completed
//!                                -> Cancelled
//!                                -> Failed
//! ```
//!
//! Every transition is an explicit call on an owned [`SimulationEngine`].
//! Progress is reported only through the installed [`ProgressCallback`].

use std::collections::BTreeMap;
use std::time::Instant;

use diffusion_network::{NetworkError, NetworkGenerator, validate_network};
use diffusion_types::{NetworkStats, StepResult, StopReason};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::callback::{NoOpCallback, ProgressCallback};
use crate::cancel::CancellationToken;
use crate::config::SimulationConfig;
use crate::error::{SimulationError, StepError};
use crate::oracle::DecisionOracle;
use crate::orchestrator::Orchestrator;
use crate::population::Population;
use crate::results::SimulationResults;

/// Lifecycle state of a [`SimulationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Created, nothing built yet.
    Idle,
    /// Population created and wired.
    Initialized,
    /// The step loop is executing.
    Running,
    /// The step loop ended normally.
    Completed,
    /// The run was cancelled mid-step.
    Cancelled,
    /// The run ended with an error.
    Failed,
}

impl EngineState {
    /// Lower-case state name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Whether the run can no longer change.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl core::fmt::Display for EngineState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns one run from setup to results.
pub struct SimulationEngine<O> {
    config: SimulationConfig,
    oracle: O,
    cancel: CancellationToken,
    callback: Box<dyn ProgressCallback>,
    state: EngineState,
    population: Population,
    network_stats: Option<NetworkStats>,
    history: BTreeMap<u32, StepResult>,
    results: Option<SimulationResults>,
}

impl<O: DecisionOracle> SimulationEngine<O> {
    /// Create an idle engine for a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Validation`] if `config` is invalid.
    pub fn new(config: SimulationConfig, oracle: O) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self {
            config,
            oracle,
            cancel: CancellationToken::new(),
            callback: Box::new(NoOpCallback),
            state: EngineState::Idle,
            population: Population::default(),
            network_stats: None,
            history: BTreeMap::new(),
            results: None,
        })
    }

    /// Install a progress callback, replacing the current one.
    #[must_use]
    pub fn with_callback(mut self, callback: impl ProgressCallback + 'static) -> Self {
        self.callback = Box::new(callback);
        self
    }

    /// Use `cancel` instead of the engine's own token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle that cancels this run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cancellation of the in-flight step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// The run's config.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The oracle the run asks.
    pub const fn oracle(&self) -> &O {
        &self.oracle
    }

    /// The population, empty before initialization.
    pub const fn population(&self) -> &Population {
        &self.population
    }

    /// Network statistics, once initialized.
    pub const fn network_stats(&self) -> Option<&NetworkStats> {
        self.network_stats.as_ref()
    }

    /// Completed steps so far.
    pub const fn history(&self) -> &BTreeMap<u32, StepResult> {
        &self.history
    }

    /// The result bundle, once the run has ended.
    pub const fn results(&self) -> Option<&SimulationResults> {
        self.results.as_ref()
    }

    /// Consume the engine, returning the result bundle if the run ended.
    pub fn into_results(self) -> Option<SimulationResults> {
        self.results
    }

    /// Create the population, wire the network, and validate it.
    ///
    /// A disconnected network is logged and accepted; inconsistent neighbor
    /// sets fail initialization.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidState`] unless idle, or
    /// [`SimulationError::Network`] if the network cannot be built or is
    /// inconsistent. The engine is `Failed` afterwards in the latter case.
    pub fn initialize(&mut self) -> Result<&NetworkStats, SimulationError> {
        self.expect_state(EngineState::Idle, "initialize")?;
        info!(
            name = %self.config.name,
            num_agents = self.config.num_agents,
            network_type = %self.config.network.kind(),
            "Initializing simulation"
        );

        let mut population = Population::from_config(&self.config);
        match wire_network(&self.config, &mut population) {
            Ok(stats) => {
                self.population = population;
                self.state = EngineState::Initialized;
                self.callback.initialized(&stats);
                let stats: &NetworkStats = self.network_stats.insert(stats);
                Ok(stats)
            }
            Err(e) => {
                self.state = EngineState::Failed;
                error!(error = %e, "Initialization failed");
                self.callback.error(&e.to_string());
                Err(e.into())
            }
        }
    }

    /// Execute steps until the budget runs out, an early-stop rule fires,
    /// the run is cancelled, or a step fails.
    ///
    /// Results are available through [`Self::results`] in every case; a
    /// cancelled or failed run keeps the steps that completed.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidState`] unless initialized, or
    /// [`SimulationError::Step`] when a step is cancelled or fails.
    pub async fn run(&mut self) -> Result<StopReason, SimulationError> {
        self.expect_state(EngineState::Initialized, "run")?;
        let network_stats = self
            .network_stats
            .clone()
            .ok_or(SimulationError::InvalidState {
                operation: "run",
                state: self.state,
            })?;

        self.state = EngineState::Running;
        let started = Instant::now();
        info!(max_steps = self.config.max_steps, "Simulation starting");

        let outcome = self.step_loop().await;
        let final_step = self.history.keys().next_back().copied().unwrap_or(0);
        let stop_reason = outcome.as_ref().ok().copied();

        self.results = Some(SimulationResults {
            config: self.config.clone(),
            adoption_history: self.history.clone(),
            network_metrics: network_stats,
            total_adoption_rate: self.population.adoption_rate(),
            total_adoptions: self.population.adopted_count(),
            final_step,
            simulation_time: started.elapsed().as_secs_f64(),
            agent_states: self.population.snapshots(),
            stop_reason,
            metadata: None,
        });

        match outcome {
            Ok(reason) => {
                self.state = EngineState::Completed;
                info!(final_step, reason = ?reason, "Simulation finished");
                if let Some(results) = &self.results {
                    self.callback.completed(results);
                }
                Ok(reason)
            }
            Err(e) if e.is_cancelled() => {
                self.state = EngineState::Cancelled;
                warn!(completed_steps = final_step, "Simulation cancelled");
                Err(e)
            }
            Err(e) => {
                self.state = EngineState::Failed;
                error!(completed_steps = final_step, error = %e, "Simulation failed");
                self.callback.error(&e.to_string());
                Err(e)
            }
        }
    }

    /// Initialize if idle, then run.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::initialize`] or [`Self::run`].
    pub async fn run_to_completion(&mut self) -> Result<StopReason, SimulationError> {
        if self.state == EngineState::Idle {
            self.initialize()?;
        }
        self.run().await
    }

    async fn step_loop(&mut self) -> Result<StopReason, SimulationError> {
        let mut streak: u32 = 0;
        for step in 1..=self.config.max_steps {
            if self.cancel.is_cancelled() {
                return Err(StepError::Cancelled { step }.into());
            }
            self.callback.step_started(step);

            let orchestrator = Orchestrator::new(&self.config, &self.oracle, &self.cancel);
            let result = orchestrator.run_step(&mut self.population, step).await?;
            let stop = early_stop(&self.config, &result, &mut streak);

            self.history.insert(step, result);
            if let Some(recorded) = self.history.get(&step) {
                self.callback.step_completed(step, recorded);
            }

            if let Some(reason) = stop {
                info!(step, reason = ?reason, "Early stop");
                return Ok(reason);
            }
        }
        Ok(StopReason::MaxSteps)
    }

    fn expect_state(
        &self,
        expected: EngineState,
        operation: &'static str,
    ) -> Result<(), SimulationError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SimulationError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

impl<O> core::fmt::Debug for SimulationEngine<O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("completed_steps", &self.history.len())
            .finish_non_exhaustive()
    }
}

fn wire_network(
    config: &SimulationConfig,
    population: &mut Population,
) -> Result<NetworkStats, NetworkError> {
    let generator =
        NetworkGenerator::new(config.network, config.network_seed, config.network_shuffle);
    let stats = generator.generate(population.agents_mut())?;

    let validation = validate_network(population.agents());
    if !validation.consistent {
        return Err(NetworkError::Inconsistent {
            issues: validation.issues,
        });
    }
    for issue in &validation.issues {
        warn!(issue = %issue, "Network validation issue");
    }
    for warning in &validation.warnings {
        warn!(warning = %warning, "Network validation warning");
    }
    Ok(stats)
}

/// Apply the early-stop rules to a completed step, in priority order:
/// saturation, threshold, then the no-adoption streak.
fn early_stop(config: &SimulationConfig, result: &StepResult, streak: &mut u32) -> Option<StopReason> {
    if result.total_adoption_rate >= 1.0 {
        return Some(StopReason::AllAdopted);
    }
    if result.total_adoption_rate >= config.early_stop_threshold {
        return Some(StopReason::ThresholdReached);
    }
    *streak = if result.new_adoptions == 0 {
        streak.saturating_add(1)
    } else {
        0
    };
    match config.early_stop_no_adoption_steps {
        Some(patience) if *streak >= patience => Some(StopReason::NoAdoptionStreak),
        _ => None,
    }
}
