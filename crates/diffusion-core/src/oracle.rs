//! The Decision Oracle seam and a scripted implementation.
//!
//! The engine never decides anything itself: each agent's adopt or
//! not-adopt judgment comes from a [`DecisionOracle`]. The oracle receives a
//! [`DecisionRequest`] carrying the agent's frozen snapshot and the accepted
//! part of its conversation, and returns raw response text. Parsing and
//! validation of that text happen in the agent, so every oracle is held to
//! the same response contract.
//!
//! [`ScriptedOracle`] replays canned replies and is used by tests and by
//! dry runs without a language model.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use diffusion_types::{AdopterCategory, AdoptionDecision, AgentId, InnovationAttributes};
use serde::{Deserialize, Serialize};

use crate::agent::FrozenSnapshot;
use crate::cancel::CancellationToken;

/// Errors an oracle call can end with. Neither is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The oracle could not be reached or failed to answer.
    #[error("oracle transport failure: {0}")]
    Transport(String),

    /// The call was abandoned because the run was cancelled.
    #[error("oracle call cancelled")]
    Cancelled,
}

/// One past request/response turn of an agent's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Step the turn belongs to.
    pub step: u32,
    /// 1-based attempt within the step.
    pub attempt: u32,
    /// The context the agent was shown.
    pub snapshot: FrozenSnapshot,
    /// Accepted decisions before this turn.
    pub adoption_attempts: u32,
    /// Raw oracle response.
    pub response: String,
    /// Whether the response passed validation.
    pub accepted: bool,
}

/// Everything an oracle needs to produce one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// The deciding agent.
    pub agent_id: AgentId,
    /// The agent's category.
    pub category: AdopterCategory,
    /// Current step.
    pub step: u32,
    /// 1-based attempt within the step.
    pub attempt: u32,
    /// Whether this is the last attempt before the step fails.
    pub final_attempt: bool,
    /// Global and neighborhood adoption as frozen at step start.
    pub snapshot: FrozenSnapshot,
    /// Accepted decisions the agent has made so far.
    pub adoption_attempts: u32,
    /// The innovation being judged.
    pub innovation: InnovationAttributes,
    /// Whether to include the devil's-advocate reflection.
    pub devils_advocate: bool,
    /// Earlier accepted turns, oldest first. Rejected turns never appear.
    pub history: Vec<Exchange>,
}

/// A capability that resolves one agent decision.
///
/// Implementations should watch `cancel` during long waits; the caller also
/// races the returned future against cancellation and drops it if the
/// token fires first.
#[allow(async_fn_in_trait)]
pub trait DecisionOracle {
    /// Produce the raw response for `request`.
    async fn decide(
        &self,
        request: &DecisionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, OracleError>;
}

impl<T: DecisionOracle> DecisionOracle for &T {
    async fn decide(
        &self,
        request: &DecisionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, OracleError> {
        (**self).decide(request, cancel).await
    }
}

// ---------------------------------------------------------------------------
// Scripted oracle
// ---------------------------------------------------------------------------

/// A canned oracle reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Return this text.
    Respond(String),
    /// Fail with a transport error carrying this message.
    Fail(String),
    /// Never answer; resolve only when the run is cancelled.
    Hang,
}

impl ScriptedReply {
    /// A well-formed response carrying `decision`.
    pub fn decision(decision: AdoptionDecision) -> Self {
        Self::Respond(well_formed_response(decision))
    }
}

/// Render a response that satisfies the full response contract.
pub fn well_formed_response(decision: AdoptionDecision) -> String {
    serde_json::json!({
        "thinking": "weighing the innovation against my situation",
        "decision": decision.as_str(),
        "reasoning": "scripted decision",
        "network_influence_level": 5,
        "global_influence_level": 5,
        "confidence_level": 7
    })
    .to_string()
}

/// An oracle that replays queued replies, then repeats a fallback forever.
///
/// Every request it receives is recorded for later inspection.
#[derive(Debug)]
pub struct ScriptedOracle {
    queue: Mutex<VecDeque<ScriptedReply>>,
    fallback: ScriptedReply,
    requests: Mutex<Vec<DecisionRequest>>,
}

impl ScriptedOracle {
    /// Reply with `fallback` to every request.
    pub fn repeating(fallback: ScriptedReply) -> Self {
        Self::with_script(Vec::new(), fallback)
    }

    /// Always return a well-formed `decision`.
    pub fn always(decision: AdoptionDecision) -> Self {
        Self::repeating(ScriptedReply::decision(decision))
    }

    /// Reply with `script` in order, then with `fallback`.
    pub fn with_script(script: Vec<ScriptedReply>, fallback: ScriptedReply) -> Self {
        Self {
            queue: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls received.
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_reply(&self) -> ScriptedReply {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl DecisionOracle for ScriptedOracle {
    async fn decide(
        &self,
        request: &DecisionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, OracleError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        match self.next_reply() {
            ScriptedReply::Respond(text) => Ok(text),
            ScriptedReply::Fail(message) => Err(OracleError::Transport(message)),
            ScriptedReply::Hang => {
                cancel.cancelled().await;
                Err(OracleError::Cancelled)
            }
        }
    }
}
