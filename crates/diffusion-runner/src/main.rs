//! Command-line entry point for running a diffusion simulation.
//!
//! Loads the runner configuration from the environment, builds the
//! language-model Decision Oracle, runs the simulation to a stop condition,
//! and saves the results.
//!
//! ```text
//! SimulationConfig --> SimulationEngine --> LlmOracle --> LLM backend
//!                             |
//!                             +--> ResultStore (RESULTS_DIR)
//! ```
//!
//! Ctrl-C cancels the in-flight step; the steps completed before it are
//! still saved.

mod config;
mod error;
mod llm;
mod oracle;
mod prompt;

use anyhow::Context;
use diffusion_core::{LoggingCallback, ResultStore, SimulationEngine};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::RunnerConfig;
use crate::llm::create_backend;
use crate::oracle::LlmOracle;
use crate::prompt::PromptEngine;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if setup fails, the run fails, or the results cannot
/// be saved.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("diffusion-runner starting");

    let config = RunnerConfig::from_env().context("failed to load runner configuration")?;
    let simulation = config
        .simulation
        .load()
        .context("failed to load simulation config")?;
    info!(
        simulation = simulation.name,
        num_agents = simulation.num_agents,
        max_steps = simulation.max_steps,
        templates_dir = config.templates_dir,
        decision_timeout_ms = config.decision_timeout.as_millis(),
        "Configuration loaded"
    );

    let prompts = PromptEngine::new(&config.templates_dir)?;
    let backend = create_backend(&config.backend);
    info!(backend = backend.name(), model = config.backend.model, "LLM backend configured");

    let oracle = LlmOracle::new(backend, prompts, config.decision_timeout);
    let mut engine = SimulationEngine::new(simulation, oracle)?.with_callback(LoggingCallback);

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for interrupt"),
        }
    });

    let outcome = engine.run_to_completion().await;
    let state = engine.state();

    if let Some(results) = engine.into_results() {
        let store = ResultStore::new(&config.results_dir);
        let path = store
            .save(&results, &config.results_prefix)
            .context("failed to save simulation results")?;
        info!(
            path = %path.display(),
            final_step = results.final_step,
            total_adoption_rate = results.total_adoption_rate,
            "Results saved"
        );
    }

    let stop_reason = outcome.with_context(|| format!("simulation ended in state {state}"))?;
    info!(?stop_reason, "Simulation finished");
    Ok(())
}
