//! Result store persistence against a temporary directory.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc
)]

use diffusion_core::{
    ResultStore, ScriptedOracle, ScriptedReply, SimulationConfig, SimulationEngine,
    SimulationResults, StoreError,
};
use diffusion_types::AdoptionDecision;

async fn finished_run() -> SimulationResults {
    let config = SimulationConfig {
        name: "store_roundtrip".to_owned(),
        num_agents: 12,
        max_steps: 2,
        network_seed: Some(11),
        speed_up: false,
        early_stop_no_adoption_steps: None,
        ..SimulationConfig::default()
    };
    let oracle = ScriptedOracle::always(AdoptionDecision::NotAdopt);
    let mut engine = SimulationEngine::new(config, oracle).unwrap();
    engine.run_to_completion().await.unwrap();
    engine.into_results().unwrap()
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResultStore::new(dir.path());
    let results = finished_run().await;

    let path = store.save(&results, "simulation_results").unwrap();
    let name = path.file_name().unwrap().to_str().unwrap().to_owned();
    assert!(name.starts_with("simulation_results_"));
    assert!(name.ends_with(".json"));
    // prefix, underscore, 14-digit stamp, extension
    assert_eq!(name.len(), "simulation_results_".len() + 14 + ".json".len());

    let (loaded, config) = store.load(&path).unwrap();
    assert_eq!(config, results.config);
    assert_eq!(
        loaded.total_adoption_rate.to_bits(),
        results.total_adoption_rate.to_bits()
    );
    assert_eq!(loaded.total_adoptions, results.total_adoptions);
    assert_eq!(loaded.final_step, results.final_step);
    let steps = |r: &SimulationResults| {
        r.adoption_history
            .iter()
            .map(|(&step, s)| (step, s.new_adoptions, s.agents_results.len()))
            .collect::<Vec<_>>()
    };
    assert_eq!(steps(&loaded), steps(&results));
    assert_eq!(loaded.network_metrics.topology, results.network_metrics.topology);
    assert_eq!(loaded.agent_states, results.agent_states);

    let metadata = loaded.metadata.unwrap();
    assert_eq!(metadata.total_agents, 12);
    assert_eq!(metadata.config_name, "store_roundtrip");
    assert_eq!(metadata.app_version, env!("CARGO_PKG_VERSION"));
    assert!(results.metadata.is_none());
}

#[tokio::test]
async fn non_terminating_rates_survive_a_save_exactly() {
    let config = SimulationConfig {
        name: "one_in_eleven".to_owned(),
        num_agents: 11,
        max_steps: 1,
        network_seed: Some(5),
        speed_up: false,
        early_stop_no_adoption_steps: None,
        ..SimulationConfig::default()
    };
    let oracle = ScriptedOracle::with_script(
        vec![ScriptedReply::decision(AdoptionDecision::Adopt)],
        ScriptedReply::decision(AdoptionDecision::NotAdopt),
    );
    let mut engine = SimulationEngine::new(config, oracle).unwrap();
    engine.run_to_completion().await.unwrap();
    let results = engine.into_results().unwrap();
    assert_eq!(results.total_adoptions, 1);
    assert_eq!(results.total_adoption_rate.to_bits(), (1.0_f64 / 11.0).to_bits());

    let dir = tempfile::tempdir().unwrap();
    let store = ResultStore::new(dir.path());
    let path = store.save(&results, "exact").unwrap();
    let (loaded, config) = store.load(&path).unwrap();

    assert_eq!(
        loaded.total_adoption_rate.to_bits(),
        results.total_adoption_rate.to_bits()
    );
    for (step, saved) in &results.adoption_history {
        let back = loaded.adoption_history.get(step).unwrap();
        assert_eq!(back.total_adoption_rate.to_bits(), saved.total_adoption_rate.to_bits());
        assert_eq!(back.adoption_rate.to_bits(), saved.adoption_rate.to_bits());
    }
    assert_eq!(loaded.adoption_history, results.adoption_history);
    assert_eq!(config, results.config);
}

#[tokio::test]
async fn same_second_saves_keep_both_runs() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResultStore::new(dir.path());
    let first = finished_run().await;
    let mut second = first.clone();
    second.config.name = "second_run".to_owned();

    let first_path = store.save(&first, "burst").unwrap();
    let second_path = store.save(&second, "burst").unwrap();
    assert_ne!(first_path, second_path);
    assert_eq!(store.list().unwrap().len(), 2);

    let (reloaded, _) = store.load(&first_path).unwrap();
    assert_eq!(reloaded.config.name, "store_roundtrip");
    let (reloaded, _) = store.load(&second_path).unwrap();
    assert_eq!(reloaded.config.name, "second_run");
}

#[tokio::test]
async fn load_accepts_bare_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResultStore::new(dir.path().join("runs"));
    let results = finished_run().await;

    let path = store.save(&results, "named").unwrap();
    let name = path.file_name().unwrap();
    assert!(store.load(std::path::Path::new(name)).is_ok());
    assert_eq!(store.list().unwrap(), vec![name.to_str().unwrap().to_owned()]);

    store.delete(name.to_str().unwrap()).unwrap();
    assert!(store.list().unwrap().is_empty());
    assert!(matches!(
        store.load(&path),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn corrupt_file_is_a_serde_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken_20250101000000.json");
    std::fs::write(&path, b"{\"config\": ").unwrap();
    let store = ResultStore::new(dir.path());
    assert!(matches!(store.load(&path), Err(StoreError::Serde { .. })));
}

#[test]
fn path_escaping_ids_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResultStore::new(dir.path());
    assert!(matches!(
        store.delete("../escape.json"),
        Err(StoreError::InvalidId { .. })
    ));
}
