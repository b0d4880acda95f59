//! Error types for the `diffusion-network` crate.

use diffusion_types::TopologyKind;

/// Errors that can occur while building a network.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// A network needs at least two agents.
    #[error("cannot build a {kind} network over {count} agent(s); at least 2 are required")]
    TooFewAgents {
        /// The requested topology family.
        kind: TopologyKind,
        /// The population size.
        count: usize,
    },

    /// The population is larger than a node index can address.
    #[error("population of {count} agents exceeds the supported network size")]
    TooManyAgents {
        /// The population size.
        count: usize,
    },

    /// A probability parameter is outside `[0, 1]` or not a number.
    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidProbability {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Wiring produced neighbor sets that fail validation.
    #[error("network wiring is inconsistent: {}", issues.join("; "))]
    Inconsistent {
        /// The validation issues found.
        issues: Vec<String>,
    },
}
