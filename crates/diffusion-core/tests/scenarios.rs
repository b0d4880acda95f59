//! End-to-end runs of the simulation engine against scripted oracles.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use diffusion_core::{
    EngineState, ProgressCallback, ScriptedOracle, ScriptedReply, SimulationConfig,
    SimulationEngine, SimulationError, SimulationResults, StepError,
};
use diffusion_core::orchestrator::MAX_ATTEMPTS;
use diffusion_core::parse::ReasoningError;
use diffusion_network::TopologyParams;
use diffusion_types::{AdopterCategory, AdoptionDecision, AgentId, NetworkStats, StepResult, StopReason};

fn single_category(category: AdopterCategory) -> BTreeMap<AdopterCategory, f64> {
    AdopterCategory::ALL
        .iter()
        .map(|&c| (c, if c == category { 1.0 } else { 0.0 }))
        .collect()
}

fn small_config() -> SimulationConfig {
    SimulationConfig {
        name: "scenario".to_owned(),
        num_agents: 10,
        network_seed: Some(7),
        speed_up: false,
        early_stop_no_adoption_steps: None,
        max_steps: 3,
        ..SimulationConfig::default()
    }
}

/// Records every notification as a short string.
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ProgressCallback for Recorder {
    fn initialized(&mut self, _stats: &NetworkStats) {
        self.push("initialized".to_owned());
    }

    fn step_started(&mut self, step: u32) {
        self.push(format!("started:{step}"));
    }

    fn step_completed(&mut self, step: u32, _result: &StepResult) {
        self.push(format!("completed:{step}"));
    }

    fn completed(&mut self, _results: &SimulationResults) {
        self.push("completed".to_owned());
    }

    fn error(&mut self, _message: &str) {
        self.push("error".to_owned());
    }
}

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn everyone_adopts_in_one_step() {
    let config = SimulationConfig {
        num_agents: 20,
        adopter_distribution: single_category(AdopterCategory::Innovator),
        max_steps: 1,
        ..SimulationConfig::default()
    };
    let oracle = ScriptedOracle::always(AdoptionDecision::Adopt);
    let mut engine = SimulationEngine::new(config, oracle).unwrap();

    let reason = engine.run_to_completion().await.unwrap();
    assert_eq!(reason, StopReason::AllAdopted);
    assert_eq!(engine.state(), EngineState::Completed);

    let results = engine.results().unwrap();
    assert!((results.total_adoption_rate - 1.0).abs() < f64::EPSILON);
    assert_eq!(results.total_adoptions, 20);
    assert_eq!(results.final_step, 1);
    assert_eq!(results.adoption_history.len(), 1);
    let step = results.step(1).unwrap();
    assert_eq!(step.new_adoptions, 20);
    let innovators = step.per_category.get(&AdopterCategory::Innovator).unwrap();
    assert_eq!(innovators.agents, 20);
    assert!((innovators.cumulative_rate - 1.0).abs() < f64::EPSILON);
    assert!(
        results
            .agent_states
            .iter()
            .all(|a| a.has_adopted && a.adoption_step == Some(1))
    );
}

#[tokio::test]
async fn nobody_adopts_and_patience_runs_out() {
    let config = SimulationConfig {
        num_agents: 30,
        early_stop_no_adoption_steps: Some(2),
        ..SimulationConfig::default()
    };
    let oracle = ScriptedOracle::always(AdoptionDecision::NotAdopt);
    let mut engine = SimulationEngine::new(config, oracle).unwrap();

    let reason = engine.run_to_completion().await.unwrap();
    assert_eq!(reason, StopReason::NoAdoptionStreak);

    let results = engine.results().unwrap();
    assert_eq!(results.final_step, 2);
    assert_eq!(results.total_adoptions, 0);
    assert!(results.step(3).is_none());
}

#[tokio::test]
async fn seeded_small_world_is_reproducible() {
    let config = SimulationConfig {
        num_agents: 30,
        network: TopologyParams::SmallWorld {
            k: 4,
            rewiring_prob: 0.0,
        },
        network_seed: Some(42),
        ..SimulationConfig::default()
    };

    let mut first = SimulationEngine::new(config.clone(), ScriptedOracle::always(AdoptionDecision::Adopt)).unwrap();
    let mut second = SimulationEngine::new(config, ScriptedOracle::always(AdoptionDecision::Adopt)).unwrap();
    let a = first.initialize().unwrap().clone();
    let b = second.initialize().unwrap().clone();

    assert_eq!(a.topology, b.topology);
    assert_eq!(a.total_edges, 60);
    assert_eq!(a.min_degree, 4);
    assert_eq!(a.max_degree, 4);
    for (x, y) in first.population().agents().iter().zip(second.population().agents()) {
        assert_eq!(x.id(), y.id());
        assert_eq!(x.neighbors(), y.neighbors());
    }
}

// ---------------------------------------------------------------------------
// Structural properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn neighbor_relation_is_symmetric_for_every_family() {
    let families = [
        TopologyParams::SmallWorld {
            k: 5,
            rewiring_prob: 0.5,
        },
        TopologyParams::ScaleFree { m: 3, alpha: 2.5 },
        TopologyParams::Random { p: 0.2 },
    ];
    for network in families {
        let config = SimulationConfig {
            num_agents: 40,
            network,
            network_seed: Some(3),
            ..SimulationConfig::default()
        };
        let mut engine =
            SimulationEngine::new(config, ScriptedOracle::always(AdoptionDecision::Adopt)).unwrap();
        engine.initialize().unwrap();

        let population = engine.population();
        assert_eq!(population.len(), 40);
        for agent in population.agents() {
            assert!(!agent.neighbors().contains(agent.id()));
            for neighbor in agent.neighbors() {
                let other = population.get(neighbor).unwrap();
                assert!(other.neighbors().contains(agent.id()));
            }
        }
    }
}

#[tokio::test]
async fn adoption_is_monotonic_across_steps() {
    let mut script = Vec::new();
    for i in 0..10 {
        let decision = if i % 3 == 0 {
            AdoptionDecision::Adopt
        } else {
            AdoptionDecision::NotAdopt
        };
        script.push(ScriptedReply::decision(decision));
    }
    let oracle = ScriptedOracle::with_script(script, ScriptedReply::decision(AdoptionDecision::Adopt));
    let mut engine = SimulationEngine::new(small_config(), oracle).unwrap();
    engine.run_to_completion().await.unwrap();

    let results = engine.results().unwrap();
    let first = results.step(1).unwrap();
    assert_eq!(first.new_adoptions, 4);

    let mut adopted_at: BTreeMap<AgentId, u32> = BTreeMap::new();
    let mut last_total = 0;
    for (step, result) in &results.adoption_history {
        assert!(result.total_adoptions >= last_total);
        last_total = result.total_adoptions;
        for record in &result.agents_results {
            if let Some(&earlier) = adopted_at.get(&record.agent_id) {
                assert!(record.adopted_before);
                assert_eq!(record.adoption_step, Some(earlier));
            } else if record.has_adopted {
                assert_eq!(record.adoption_step, Some(*step));
                adopted_at.insert(record.agent_id.clone(), *step);
            }
        }
    }
    assert_eq!(results.final_step, 2);
    assert_eq!(results.total_adoptions, 10);
}

// ---------------------------------------------------------------------------
// Failure, retry and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exhausted_retries_fail_the_run() {
    let recorder = Recorder::default();
    let oracle = ScriptedOracle::repeating(ScriptedReply::Respond("{\"decision\": 1}".to_owned()));
    let mut engine = SimulationEngine::new(small_config(), oracle)
        .unwrap()
        .with_callback(recorder.clone());

    let err = engine.run_to_completion().await.unwrap_err();
    let SimulationError::Step {
        source: StepError::Reasoning {
            attempts, source, ..
        },
    } = &err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*attempts, MAX_ATTEMPTS);
    assert_eq!(
        *source,
        ReasoningError::WrongType {
            field: "decision",
            expected: "a string"
        }
    );
    assert_eq!(engine.state(), EngineState::Failed);
    assert_eq!(engine.oracle().call_count(), 4);

    let results = engine.results().unwrap();
    assert!(results.adoption_history.is_empty());
    assert_eq!(results.final_step, 0);
    assert!(results.stop_reason.is_none());
    assert_eq!(recorder.events(), vec!["initialized", "started:1", "error"]);
}

#[tokio::test]
async fn failure_keeps_completed_steps() {
    let script = (0..10)
        .map(|_| ScriptedReply::decision(AdoptionDecision::NotAdopt))
        .collect();
    let oracle = ScriptedOracle::with_script(script, ScriptedReply::Fail("connection reset".to_owned()));
    let mut engine = SimulationEngine::new(small_config(), oracle).unwrap();

    let err = engine.run_to_completion().await.unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Step {
            source: StepError::Transport { .. }
        }
    ));
    assert_eq!(engine.state(), EngineState::Failed);

    let results = engine.results().unwrap();
    assert_eq!(results.final_step, 1);
    assert_eq!(results.adoption_history.len(), 1);
    assert!(results.agent_states.iter().all(|a| a.adoption_attempts == 1));
}

#[tokio::test]
async fn retried_turns_never_reach_the_history() {
    let mut script = vec![ScriptedReply::Respond("garbage".to_owned())];
    script.extend((0..10).map(|_| ScriptedReply::decision(AdoptionDecision::NotAdopt)));
    let oracle = ScriptedOracle::with_script(script, ScriptedReply::decision(AdoptionDecision::NotAdopt));
    let config = SimulationConfig {
        max_steps: 2,
        ..small_config()
    };
    let mut engine = SimulationEngine::new(config, oracle).unwrap();
    engine.run_to_completion().await.unwrap();

    let requests = engine.oracle().requests();
    let first_agent = requests.first().unwrap().agent_id.clone();
    let mine: Vec<_> = requests.iter().filter(|r| r.agent_id == first_agent).collect();
    assert_eq!(mine.len(), 3);

    let retry = mine[1];
    assert_eq!((retry.step, retry.attempt), (1, 2));
    assert!(retry.history.is_empty());

    let next_step = mine[2];
    assert_eq!(next_step.step, 2);
    assert_eq!(next_step.adoption_attempts, 1);
    assert_eq!(next_step.history.len(), 1);
    assert!(next_step.history[0].accepted);
    assert_eq!(next_step.history[0].attempt, 2);

    let agent = engine.population().get(&first_agent).unwrap();
    assert_eq!(agent.log().entries().len(), 3);
    assert_eq!(agent.log().rejected_count(), 1);
}

#[tokio::test]
async fn cancellation_discards_the_in_flight_step() {
    let script = (0..10)
        .map(|i| {
            ScriptedReply::decision(if i < 3 {
                AdoptionDecision::Adopt
            } else {
                AdoptionDecision::NotAdopt
            })
        })
        .collect();
    let oracle = ScriptedOracle::with_script(script, ScriptedReply::Hang);
    let recorder = Recorder::default();
    let mut engine = SimulationEngine::new(small_config(), oracle)
        .unwrap()
        .with_callback(recorder.clone());

    let token = engine.cancellation_token();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let err = engine.run_to_completion().await.unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_cancelled());
    assert_eq!(engine.state(), EngineState::Cancelled);
    let results = engine.results().unwrap();
    assert_eq!(results.final_step, 1);
    assert_eq!(results.total_adoptions, 3);
    assert!(results.step(2).is_none());
    assert_eq!(
        recorder.events(),
        vec!["initialized", "started:1", "completed:1", "started:2"]
    );
}

#[tokio::test]
async fn callbacks_fire_in_lifecycle_order() {
    let recorder = Recorder::default();
    let config = SimulationConfig {
        max_steps: 2,
        ..small_config()
    };
    let mut engine = SimulationEngine::new(config, ScriptedOracle::always(AdoptionDecision::NotAdopt))
        .unwrap()
        .with_callback(recorder.clone());

    assert_eq!(engine.run_to_completion().await.unwrap(), StopReason::MaxSteps);
    assert_eq!(
        recorder.events(),
        vec![
            "initialized",
            "started:1",
            "completed:1",
            "started:2",
            "completed:2",
            "completed"
        ]
    );
    assert!(engine.run().await.is_err());
}
