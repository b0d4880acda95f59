//! Error types for stepping and running a simulation.

use diffusion_network::NetworkError;
use diffusion_types::AgentId;

use crate::config::ValidationError;
use crate::engine::EngineState;
use crate::parse::ReasoningError;

/// Errors that abort a single step. None of them leave partial results.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    /// An agent kept producing invalid responses until its attempts ran out.
    #[error("agent {agent_id} gave no valid response in {attempts} attempts: {source}")]
    Reasoning {
        /// The agent whose retries were exhausted.
        agent_id: AgentId,
        /// Attempts made.
        attempts: u32,
        /// The last validation failure.
        #[source]
        source: ReasoningError,
    },

    /// The oracle failed at the transport level.
    #[error("oracle failed for agent {agent_id}: {message}")]
    Transport {
        /// The agent being asked.
        agent_id: AgentId,
        /// Transport failure detail.
        message: String,
    },

    /// The run was cancelled while the step was in flight.
    #[error("step {step} cancelled")]
    Cancelled {
        /// The abandoned step.
        step: u32,
    },

    /// An agent was asked to decide without a frozen snapshot.
    #[error("agent {agent_id} was not frozen before deciding")]
    NotFrozen {
        /// The agent.
        agent_id: AgentId,
    },
}

/// Errors surfaced by the simulation engine.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The configuration is invalid.
    #[error("invalid configuration: {source}")]
    Validation {
        /// The violated invariant.
        #[from]
        source: ValidationError,
    },

    /// The network could not be built or is inconsistent.
    #[error("network construction failed: {source}")]
    Network {
        /// The underlying network error.
        #[from]
        source: NetworkError,
    },

    /// A step failed or was cancelled.
    #[error("step failed: {source}")]
    Step {
        /// The underlying step error.
        #[from]
        source: StepError,
    },

    /// A lifecycle method was called in the wrong state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The engine state at the time.
        state: EngineState,
    },
}

impl SimulationError {
    /// Whether the error is a cancellation rather than a failure.
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Step {
                source: StepError::Cancelled { .. }
            }
        )
    }
}
