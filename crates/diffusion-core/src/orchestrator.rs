//! One simulation step across the whole population.
//!
//! A step follows a fixed protocol:
//!
//! 1. Compute the global adoption rate once.
//! 2. Freeze every agent against that rate.
//! 3. Ask each agent to decide, one at a time, in population order,
//!    retrying only on invalid responses.
//! 4. Aggregate overall and per-category figures.
//!
//! The step works on a staged copy of the population and commits it only
//! when every agent has decided, so a failed or cancelled step leaves the
//! caller's population exactly as it was.

use std::collections::BTreeMap;
use std::time::Instant;

use diffusion_types::{
    AdopterCategory, AgentDecisionRecord, CategoryAdoption, StepResult,
};
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentDecision, DecideError, DecisionSettings};
use crate::cancel::CancellationToken;
use crate::config::SimulationConfig;
use crate::error::StepError;
use crate::oracle::{DecisionOracle, OracleError};
use crate::population::{Population, ratio};

/// Retries after the first attempt on an invalid response.
pub const MAX_RETRIES: u32 = 3;

/// Total attempts per agent per step.
pub const MAX_ATTEMPTS: u32 = MAX_RETRIES.saturating_add(1);

/// The step on which the speed-up shortcut may apply.
pub const SHORTCUT_STEP: u32 = 2;

/// The category the speed-up shortcut may skip.
pub const SKIPPABLE_CATEGORY: AdopterCategory = AdopterCategory::LateMajority;

/// Runs steps against a borrowed config, oracle, and cancellation token.
#[derive(Debug)]
pub struct Orchestrator<'a, O> {
    config: &'a SimulationConfig,
    settings: DecisionSettings,
    oracle: &'a O,
    cancel: &'a CancellationToken,
}

impl<'a, O: DecisionOracle> Orchestrator<'a, O> {
    /// Create an orchestrator for one run.
    pub const fn new(
        config: &'a SimulationConfig,
        oracle: &'a O,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            settings: DecisionSettings::from_config(config),
            oracle,
            cancel,
        }
    }

    /// Run step `step` and commit its outcome into `population`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] if an agent exhausts its attempts, the oracle
    /// fails, or the run is cancelled. `population` is untouched in every
    /// error case.
    pub async fn run_step(
        &self,
        population: &mut Population,
        step: u32,
    ) -> Result<StepResult, StepError> {
        let started = Instant::now();
        let mut staged = population.clone();

        let before = staged.category_counts();
        let adopted_before = staged.adopted_count();
        let global_rate = staged.adoption_rate();
        staged.freeze_all(global_rate);

        let skip_category = self.shortcut_category(&before, step);
        if let Some(category) = skip_category {
            info!(step, category = %category, "Skipping category with no adopters");
        }

        let mut records = Vec::with_capacity(staged.agents().len());
        let mut skipped: u32 = 0;
        for agent in staged.agents_mut() {
            if skip_category == Some(agent.category()) {
                skipped = skipped.saturating_add(1);
                continue;
            }
            records.push(self.decide_with_retry(agent, step).await?);
        }

        let result = aggregate(
            step,
            &before,
            adopted_before,
            &staged,
            skipped,
            records,
            started.elapsed().as_secs_f64(),
        );
        *population = staged;

        info!(
            step,
            new_adoptions = result.new_adoptions,
            total_adoptions = result.total_adoptions,
            total_adoption_rate = result.total_adoption_rate,
            skipped_agents = result.skipped_agents,
            "Step completed"
        );
        Ok(result)
    }

    /// The category to skip this step, if the shortcut applies.
    fn shortcut_category(
        &self,
        before: &BTreeMap<AdopterCategory, (u32, u32)>,
        step: u32,
    ) -> Option<AdopterCategory> {
        if !self.config.speed_up || step != SHORTCUT_STEP {
            return None;
        }
        let (_, adopted) = before.get(&SKIPPABLE_CATEGORY).copied().unwrap_or((0, 0));
        (adopted == 0).then_some(SKIPPABLE_CATEGORY)
    }

    async fn decide_with_retry(
        &self,
        agent: &mut Agent,
        step: u32,
    ) -> Result<AgentDecisionRecord, StepError> {
        let mut attempt: u32 = 1;
        loop {
            let final_attempt = attempt >= MAX_ATTEMPTS;
            let outcome = agent
                .decide(
                    step,
                    attempt,
                    final_attempt,
                    &self.settings,
                    self.oracle,
                    self.cancel,
                )
                .await;

            match outcome {
                Ok(decision) => return Ok(record_for(agent, decision, attempt)),
                Err(DecideError::Reasoning(source)) => {
                    if final_attempt {
                        warn!(
                            agent_id = %agent.id(),
                            step,
                            attempts = attempt,
                            error = %source,
                            "Retries exhausted"
                        );
                        return Err(StepError::Reasoning {
                            agent_id: agent.id().clone(),
                            attempts: attempt,
                            source,
                        });
                    }
                    debug!(agent_id = %agent.id(), step, attempt, "Retrying decision");
                    attempt = attempt.saturating_add(1);
                }
                Err(DecideError::Oracle(OracleError::Cancelled)) => {
                    return Err(StepError::Cancelled { step });
                }
                Err(DecideError::Oracle(OracleError::Transport(message))) => {
                    return Err(StepError::Transport {
                        agent_id: agent.id().clone(),
                        message,
                    });
                }
                Err(DecideError::NotFrozen { agent_id }) => {
                    return Err(StepError::NotFrozen { agent_id });
                }
            }
        }
    }
}

fn record_for(agent: &Agent, decision: AgentDecision, attempts: u32) -> AgentDecisionRecord {
    let (adopted_before, payload, raw_output, attempts, decision_time) = match decision {
        AgentDecision::AdoptedBefore => (true, None, None, 0, 0.0),
        AgentDecision::Decided {
            payload,
            raw_output,
            decision_time,
        } => (false, Some(payload), Some(raw_output), attempts, decision_time),
    };
    AgentDecisionRecord {
        agent_id: agent.id().clone(),
        category: agent.category(),
        adopted_before,
        has_adopted: agent.has_adopted(),
        adoption_step: agent.adoption_step(),
        payload,
        raw_output,
        attempts,
        decision_time,
    }
}

fn aggregate(
    step: u32,
    before: &BTreeMap<AdopterCategory, (u32, u32)>,
    adopted_before: u32,
    after: &Population,
    skipped_agents: u32,
    agents_results: Vec<AgentDecisionRecord>,
    orchestration_time: f64,
) -> StepResult {
    let total = after.len();
    let total_adoptions = after.adopted_count();
    let new_adoptions = total_adoptions.saturating_sub(adopted_before);

    let per_category = after
        .category_counts()
        .into_iter()
        .map(|(category, (agents, adopted))| {
            let (_, was_adopted) = before.get(&category).copied().unwrap_or((0, 0));
            let new = adopted.saturating_sub(was_adopted);
            let figures = CategoryAdoption {
                agents,
                adopted,
                new_adoptions: new,
                cumulative_rate: ratio(adopted, agents),
                incremental_rate: ratio(new, agents),
            };
            (category, figures)
        })
        .collect();

    StepResult {
        step,
        new_adoptions,
        total_adoptions,
        total_adoption_rate: ratio(total_adoptions, total),
        adoption_rate: ratio(new_adoptions, total),
        per_category,
        skipped_agents,
        agents_results,
        orchestration_time,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use diffusion_types::{AdoptionDecision, AgentId};

    use super::*;
    use crate::oracle::{ScriptedOracle, ScriptedReply};

    fn config(speed_up: bool) -> SimulationConfig {
        SimulationConfig {
            num_agents: 10,
            speed_up,
            ..SimulationConfig::default()
        }
    }

    #[tokio::test]
    async fn every_agent_sees_the_same_global_rate() {
        let config = config(false);
        let mut population = Population::from_config(&config);
        let oracle = ScriptedOracle::always(AdoptionDecision::Adopt);
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(&config, &oracle, &cancel);

        let result = orchestrator.run_step(&mut population, 1).await.unwrap();
        assert_eq!(result.new_adoptions, 10);
        assert!((result.total_adoption_rate - 1.0).abs() < f64::EPSILON);

        let rates: Vec<f64> = oracle
            .requests()
            .iter()
            .map(|r| r.snapshot.global_adoption_rate)
            .collect();
        assert_eq!(rates.len(), 10);
        assert!(rates.iter().all(|r| r.abs() < f64::EPSILON));
    }

    #[tokio::test]
    async fn adopted_agents_are_not_asked_again() {
        let config = config(false);
        let mut population = Population::from_config(&config);
        let oracle = ScriptedOracle::always(AdoptionDecision::Adopt);
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(&config, &oracle, &cancel);

        orchestrator.run_step(&mut population, 1).await.unwrap();
        let second = orchestrator.run_step(&mut population, 2).await.unwrap();
        assert_eq!(oracle.call_count(), 10);
        assert_eq!(second.new_adoptions, 0);
        assert!(second.agents_results.iter().all(|r| r.adopted_before));
        assert!(
            population
                .agents()
                .iter()
                .all(|a| a.adoption_step() == Some(1))
        );
    }

    #[tokio::test]
    async fn shortcut_skips_late_majority_on_step_two() {
        let config = config(true);
        let mut population = Population::from_config(&config);
        let oracle = ScriptedOracle::always(AdoptionDecision::NotAdopt);
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(&config, &oracle, &cancel);

        let first = orchestrator.run_step(&mut population, 1).await.unwrap();
        assert_eq!(first.skipped_agents, 0);
        let second = orchestrator.run_step(&mut population, 2).await.unwrap();
        assert_eq!(second.skipped_agents, 3);
        assert_eq!(second.agents_results.len(), 7);
        assert!(
            second
                .agents_results
                .iter()
                .all(|r| r.category != AdopterCategory::LateMajority)
        );
    }

    #[tokio::test]
    async fn retry_succeeds_within_bound() {
        let config = config(false);
        let mut population = Population::from_config(&config);
        let bad = ScriptedReply::Respond("{\"decision\": \"ADOPT\"}".to_owned());
        let oracle = ScriptedOracle::with_script(
            vec![bad.clone(), bad.clone(), bad],
            ScriptedReply::decision(AdoptionDecision::Adopt),
        );
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(&config, &oracle, &cancel);

        let result = orchestrator.run_step(&mut population, 1).await.unwrap();
        let first = result.agents_results.first().unwrap();
        assert_eq!(first.attempts, 4);
        assert_eq!(first.decision(), Some(AdoptionDecision::Adopt));
        assert_eq!(oracle.call_count(), 13);
    }

    #[tokio::test]
    async fn exhausted_retries_leave_population_untouched() {
        let config = config(false);
        let mut population = Population::from_config(&config);
        let good = ScriptedReply::decision(AdoptionDecision::Adopt);
        let oracle = ScriptedOracle::with_script(
            vec![good],
            ScriptedReply::Respond("no json here".to_owned()),
        );
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(&config, &oracle, &cancel);
        let original = population.clone();

        let err = orchestrator.run_step(&mut population, 1).await.unwrap_err();
        assert!(matches!(
            &err,
            StepError::Reasoning { agent_id, attempts, .. }
                if *agent_id == AgentId::from("EarlyMajority_agent_001")
                    && *attempts == MAX_ATTEMPTS
        ));
        assert_eq!(population, original);
        assert_eq!(population.adopted_count(), 0);
    }

    #[tokio::test]
    async fn transport_failure_is_not_retried() {
        let config = config(false);
        let mut population = Population::from_config(&config);
        let oracle = ScriptedOracle::repeating(ScriptedReply::Fail("503".to_owned()));
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(&config, &oracle, &cancel);

        let err = orchestrator.run_step(&mut population, 1).await.unwrap_err();
        assert!(matches!(err, StepError::Transport { .. }));
        assert_eq!(oracle.call_count(), 1);
    }

    #[test]
    fn per_category_rates_use_category_size() {
        let config = config(false);
        let population = Population::from_config(&config);
        let before = population.category_counts();
        let result = aggregate(1, &before, 0, &population, 0, Vec::new(), 0.0);
        let late = result.per_category.get(&AdopterCategory::LateMajority).unwrap();
        assert_eq!(late.agents, 3);
        let innovators = result.per_category.get(&AdopterCategory::Innovator).unwrap();
        assert_eq!(innovators.agents, 0);
        assert!(innovators.cumulative_rate.abs() < f64::EPSILON);
    }
}
