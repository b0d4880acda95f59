//! Simulation core for innovation diffusion.
//!
//! This crate owns everything between a validated config and a saved run:
//! the agent population, the per-step decision protocol against a
//! [`DecisionOracle`], the run lifecycle, and persistence.
//!
//! # Modules
//!
//! - [`config`] -- YAML-loadable [`SimulationConfig`] and its validation
//! - [`presets`] -- Named ready-to-run configs
//! - [`agent`] -- [`Agent`] state, frozen snapshots, and the decide protocol
//! - [`population`] -- The ordered agent population
//! - [`parse`] -- Oracle response extraction and validation
//! - [`oracle`] -- [`DecisionOracle`] trait and [`ScriptedOracle`]
//! - [`cancel`] -- [`CancellationToken`] for in-flight runs
//! - [`orchestrator`] -- One step with bounded retry and staged commit
//! - [`engine`] -- [`SimulationEngine`] lifecycle and early stopping
//! - [`callback`] -- [`ProgressCallback`] notifications
//! - [`results`] -- The [`SimulationResults`] bundle
//! - [`store`] -- [`ResultStore`] file persistence
//! - [`error`] -- Step and engine error types
//!
//! [`DecisionOracle`]: oracle::DecisionOracle
//! [`ScriptedOracle`]: oracle::ScriptedOracle
//! [`SimulationConfig`]: config::SimulationConfig
//! [`Agent`]: agent::Agent
//! [`CancellationToken`]: cancel::CancellationToken
//! [`SimulationEngine`]: engine::SimulationEngine
//! [`ProgressCallback`]: callback::ProgressCallback
//! [`SimulationResults`]: results::SimulationResults
//! [`ResultStore`]: store::ResultStore

pub mod agent;
pub mod callback;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod orchestrator;
pub mod parse;
pub mod population;
pub mod presets;
pub mod results;
pub mod store;

pub use agent::{Agent, AgentDecision, DecideError, DecisionSettings, FrozenSnapshot};
pub use callback::{LoggingCallback, NoOpCallback, ProgressCallback};
pub use cancel::CancellationToken;
pub use config::{ConfigError, SimulationConfig, ValidationError};
pub use engine::{EngineState, SimulationEngine};
pub use error::{SimulationError, StepError};
pub use oracle::{DecisionOracle, DecisionRequest, Exchange, OracleError, ScriptedOracle, ScriptedReply};
pub use orchestrator::Orchestrator;
pub use parse::{ReasoningError, parse_decision};
pub use population::Population;
pub use presets::{PRESET_NAMES, preset};
pub use results::SimulationResults;
pub use store::{ResultStore, StoreError};
