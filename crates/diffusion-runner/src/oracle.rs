//! The language-model Decision Oracle.
//!
//! Renders each [`DecisionRequest`] into a conversation, sends it to the
//! configured backend under a deadline, and hands the reply text back to the
//! engine unparsed. Every failure on this side is a transport failure.

use std::time::Duration;

use diffusion_core::{CancellationToken, DecisionOracle, DecisionRequest, OracleError};
use tracing::{debug, warn};

use crate::error::RunnerError;
use crate::llm::LlmBackend;
use crate::prompt::PromptEngine;

/// A [`DecisionOracle`] backed by an LLM.
pub struct LlmOracle {
    backend: LlmBackend,
    prompts: PromptEngine,
    timeout: Duration,
}

impl LlmOracle {
    /// Create an oracle that gives each call `timeout` to answer.
    pub const fn new(backend: LlmBackend, prompts: PromptEngine, timeout: Duration) -> Self {
        Self {
            backend,
            prompts,
            timeout,
        }
    }

    /// Render and send one request under the deadline.
    async fn ask(&self, request: &DecisionRequest) -> Result<String, RunnerError> {
        let conversation = self.prompts.build_conversation(request)?;
        tokio::time::timeout(self.timeout, self.backend.complete(&conversation))
            .await
            .map_err(|_elapsed| RunnerError::Timeout {
                deadline_ms: self.timeout.as_millis(),
            })?
    }
}

impl DecisionOracle for LlmOracle {
    async fn decide(
        &self,
        request: &DecisionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, OracleError> {
        debug!(
            agent_id = %request.agent_id,
            step = request.step,
            attempt = request.attempt,
            history = request.history.len(),
            backend = self.backend.name(),
            "Requesting decision"
        );

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(OracleError::Cancelled),
            result = self.ask(request) => result,
        };

        result.map_err(|e| {
            warn!(agent_id = %request.agent_id, step = request.step, error = %e, "Oracle call failed");
            OracleError::Transport(e.to_string())
        })
    }
}

impl std::fmt::Debug for LlmOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmOracle")
            .field("backend", &self.backend.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
