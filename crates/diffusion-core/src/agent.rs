//! Simulated individuals and their per-step decision protocol.
//!
//! An [`Agent`] carries a fixed adopter category, a monotonic adoption flag,
//! its neighbor set, and an append-only [`InteractionLog`]. Once per step the
//! orchestrator freezes a [`FrozenSnapshot`] onto every agent; the agent then
//! decides against that snapshot only, so decisions made earlier in the same
//! step never leak into later ones.

use std::collections::BTreeSet;
use std::time::Instant;

use diffusion_network::NetworkNode;
use diffusion_types::{
    AdopterCategory, AdoptionDecision, AgentId, AgentStateSnapshot, DecisionPayload,
    InnovationAttributes,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::config::SimulationConfig;
use crate::oracle::{DecisionOracle, DecisionRequest, Exchange, OracleError};
use crate::parse::{ReasoningError, parse_decision};

/// Per-step context captured before any agent decides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrozenSnapshot {
    /// Population adoption rate at step start.
    pub global_adoption_rate: f64,
    /// Neighbors that had adopted at step start.
    pub adopted_neighbors: u32,
    /// Size of the neighbor set.
    pub neighbor_count: u32,
}

/// Run-wide inputs to every decision request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionSettings {
    /// The innovation being judged.
    pub innovation: InnovationAttributes,
    /// Whether requests carry the devil's-advocate reflection.
    pub devils_advocate: bool,
}

impl DecisionSettings {
    /// Extract the decision inputs from a config.
    pub const fn from_config(config: &SimulationConfig) -> Self {
        Self {
            innovation: config.innovation_attributes,
            devils_advocate: config.enable_devils_advocate,
        }
    }
}

// ---------------------------------------------------------------------------
// Interaction log
// ---------------------------------------------------------------------------

/// Every exchange an agent has had with the oracle, in order.
///
/// Entries are never removed. Rejected responses stay in the log for
/// inspection but are excluded from [`InteractionLog::context`], so a retry
/// is never shown its own malformed answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionLog {
    entries: Vec<Exchange>,
}

impl InteractionLog {
    /// Append an exchange.
    pub fn record(&mut self, exchange: Exchange) {
        self.entries.push(exchange);
    }

    /// All exchanges, accepted or not.
    pub fn entries(&self) -> &[Exchange] {
        &self.entries
    }

    /// Accepted exchanges, oldest first.
    pub fn context(&self) -> Vec<Exchange> {
        self.entries.iter().filter(|e| e.accepted).cloned().collect()
    }

    /// Number of exchanges that failed validation.
    pub fn rejected_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.accepted).count()
    }
}

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// Errors from a single decision attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecideError {
    /// The oracle answered but the answer was invalid. Retryable.
    #[error(transparent)]
    Reasoning(#[from] ReasoningError),

    /// The oracle failed or the call was cancelled. Not retryable.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// [`Agent::freeze_state`] was not called for this step.
    #[error("agent {agent_id} has no frozen snapshot")]
    NotFrozen {
        /// The agent that was asked.
        agent_id: AgentId,
    },
}

/// Outcome of a successful [`Agent::decide`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    /// The agent had already adopted; no oracle call was made.
    AdoptedBefore,
    /// The oracle produced a valid decision.
    Decided {
        /// The validated payload.
        payload: DecisionPayload,
        /// The raw text it was parsed from.
        raw_output: String,
        /// Wall-clock seconds the oracle call took.
        decision_time: f64,
    },
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// One simulated individual.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    id: AgentId,
    category: AdopterCategory,
    has_adopted: bool,
    adoption_step: Option<u32>,
    adoption_attempts: u32,
    neighbors: BTreeSet<AgentId>,
    snapshot: Option<FrozenSnapshot>,
    log: InteractionLog,
}

impl Agent {
    /// Create an unconnected, non-adopted agent.
    pub const fn new(id: AgentId, category: AdopterCategory) -> Self {
        Self {
            id,
            category,
            has_adopted: false,
            adoption_step: None,
            adoption_attempts: 0,
            neighbors: BTreeSet::new(),
            snapshot: None,
            log: InteractionLog {
                entries: Vec::new(),
            },
        }
    }

    /// The agent's id.
    pub const fn id(&self) -> &AgentId {
        &self.id
    }

    /// The agent's fixed category.
    pub const fn category(&self) -> AdopterCategory {
        self.category
    }

    /// Whether the agent has adopted.
    pub const fn has_adopted(&self) -> bool {
        self.has_adopted
    }

    /// Step of first adoption.
    pub const fn adoption_step(&self) -> Option<u32> {
        self.adoption_step
    }

    /// Accepted decisions so far.
    pub const fn adoption_attempts(&self) -> u32 {
        self.adoption_attempts
    }

    /// The neighbor set.
    pub const fn neighbors(&self) -> &BTreeSet<AgentId> {
        &self.neighbors
    }

    /// The snapshot frozen for the current step.
    pub const fn snapshot(&self) -> Option<&FrozenSnapshot> {
        self.snapshot.as_ref()
    }

    /// The interaction log.
    pub const fn log(&self) -> &InteractionLog {
        &self.log
    }

    /// Add `other` as a neighbor. Self-links and duplicates are ignored.
    ///
    /// Only one direction is added; the network generator adds the reverse.
    pub fn add_connection(&mut self, other: &AgentId) -> bool {
        if *other == self.id {
            return false;
        }
        self.neighbors.insert(other.clone())
    }

    /// Capture the step context this agent will decide against.
    pub fn freeze_state(&mut self, global_adoption_rate: f64, adopted_neighbors: u32) {
        self.snapshot = Some(FrozenSnapshot {
            global_adoption_rate,
            adopted_neighbors,
            neighbor_count: u32::try_from(self.neighbors.len()).unwrap_or(u32::MAX),
        });
    }

    /// Terminal state for the results bundle.
    pub fn state_snapshot(&self) -> AgentStateSnapshot {
        AgentStateSnapshot {
            agent_id: self.id.clone(),
            adopter_category: self.category,
            has_adopted: self.has_adopted,
            adoption_step: self.adoption_step,
            adoption_attempts: self.adoption_attempts,
            neighbor_count: u32::try_from(self.neighbors.len()).unwrap_or(u32::MAX),
        }
    }

    /// Make one decision attempt for `step`.
    ///
    /// An agent that already adopted returns [`AgentDecision::AdoptedBefore`]
    /// without calling the oracle. Otherwise one oracle call is made with the
    /// frozen snapshot and the accepted history, raced against `cancel`.
    /// A valid `ADOPT` sets the adoption flag and step; both stay fixed from
    /// then on.
    ///
    /// # Errors
    ///
    /// - [`DecideError::Reasoning`] if the response fails validation; the
    ///   exchange is logged as rejected and nothing else changes.
    /// - [`DecideError::Oracle`] on transport failure or cancellation.
    /// - [`DecideError::NotFrozen`] if no snapshot was frozen.
    pub async fn decide<O: DecisionOracle>(
        &mut self,
        step: u32,
        attempt: u32,
        final_attempt: bool,
        settings: &DecisionSettings,
        oracle: &O,
        cancel: &CancellationToken,
    ) -> Result<AgentDecision, DecideError> {
        if self.has_adopted {
            return Ok(AgentDecision::AdoptedBefore);
        }
        let snapshot = self.snapshot.ok_or_else(|| DecideError::NotFrozen {
            agent_id: self.id.clone(),
        })?;
        if cancel.is_cancelled() {
            return Err(OracleError::Cancelled.into());
        }

        let request = DecisionRequest {
            agent_id: self.id.clone(),
            category: self.category,
            step,
            attempt,
            final_attempt,
            snapshot,
            adoption_attempts: self.adoption_attempts,
            innovation: settings.innovation,
            devils_advocate: settings.devils_advocate,
            history: self.log.context(),
        };

        let started = Instant::now();
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(OracleError::Cancelled),
            result = oracle.decide(&request, cancel) => result,
        }?;
        let decision_time = started.elapsed().as_secs_f64();

        let parsed = parse_decision(&response, final_attempt);
        self.log.record(Exchange {
            step,
            attempt,
            snapshot,
            adoption_attempts: self.adoption_attempts,
            response: response.clone(),
            accepted: parsed.is_ok(),
        });

        let payload = match parsed {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    agent_id = %self.id,
                    step,
                    attempt,
                    error = %e,
                    "Rejected oracle response"
                );
                return Err(e.into());
            }
        };

        self.adoption_attempts = self.adoption_attempts.saturating_add(1);
        if payload.decision == AdoptionDecision::Adopt && !self.has_adopted {
            self.has_adopted = true;
            self.adoption_step = Some(step);
            info!(agent_id = %self.id, category = %self.category, step, "Agent adopted");
        } else {
            debug!(agent_id = %self.id, category = %self.category, step, "Agent did not adopt");
        }

        Ok(AgentDecision::Decided {
            payload,
            raw_output: response,
            decision_time,
        })
    }
}

impl NetworkNode for Agent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn category(&self) -> AdopterCategory {
        self.category
    }

    fn neighbors(&self) -> &BTreeSet<AgentId> {
        &self.neighbors
    }

    fn add_connection(&mut self, other: &AgentId) -> bool {
        Self::add_connection(self, other)
    }

    fn clear_connections(&mut self) {
        self.neighbors.clear();
    }
}
