//! Error types for the simulation runner.
//!
//! Covers everything between the environment and the engine: configuration,
//! prompt rendering, and LLM calls.

/// Errors that can occur while setting up or serving oracle calls.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Failed to load or render a prompt template.
    #[error("template error: {0}")]
    Template(String),

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    LlmBackend(String),

    /// The LLM did not answer within the decision deadline.
    #[error("LLM call exceeded the {deadline_ms}ms deadline")]
    Timeout {
        /// The deadline in milliseconds.
        deadline_ms: u128,
    },

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The simulation config could not be loaded.
    #[error("simulation config error: {0}")]
    Simulation(#[from] diffusion_core::ConfigError),
}
