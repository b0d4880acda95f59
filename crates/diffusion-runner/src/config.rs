//! Configuration for the simulation runner.
//!
//! Everything comes from environment variables: which LLM backend to call,
//! where the prompt templates live, which simulation to run, and where to
//! write the results.

use std::path::PathBuf;
use std::time::Duration;

use diffusion_core::{SimulationConfig, preset};

use crate::error::RunnerError;

/// Complete runner configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// The LLM backend acting as Decision Oracle.
    pub backend: LlmBackendConfig,
    /// Deadline for one LLM call.
    pub decision_timeout: Duration,
    /// Directory holding `system.j2` and `decision.j2`.
    pub templates_dir: String,
    /// Directory saved runs are written to.
    pub results_dir: PathBuf,
    /// File name prefix of saved runs.
    pub results_prefix: String,
    /// The simulation to run.
    pub simulation: SimulationSource,
}

/// Configuration for a single LLM backend.
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// The backend type.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl BackendType {
    /// Parse a backend name as written in `LLM_BACKEND`.
    pub fn parse(name: &str) -> Result<Self, RunnerError> {
        match name.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(RunnerError::Config(format!("unknown backend type: {other}"))),
        }
    }
}

/// Where the simulation config comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationSource {
    /// A YAML file.
    File(PathBuf),
    /// A named preset.
    Preset(String),
}

impl SimulationSource {
    /// Load and validate the simulation config.
    pub fn load(&self) -> Result<SimulationConfig, RunnerError> {
        match self {
            Self::File(path) => Ok(SimulationConfig::from_file(path)?),
            Self::Preset(name) => preset(name)
                .ok_or_else(|| RunnerError::Config(format!("unknown simulation preset: {name}"))),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `LLM_BACKEND` -- backend type (`openai`, `deepseek`, `ollama`, `anthropic`)
    /// - `LLM_API_URL` -- API base URL
    /// - `LLM_API_KEY` -- API key
    /// - `LLM_MODEL` -- model name
    ///
    /// Optional variables:
    /// - `DECISION_TIMEOUT_MS` -- per-call deadline in milliseconds (default 60000)
    /// - `TEMPLATES_DIR` -- path to prompt templates (default `templates`)
    /// - `RESULTS_DIR` -- where runs are saved (default `results`)
    /// - `RESULTS_PREFIX` -- saved run name prefix (default `simulation_results`)
    /// - `SIMULATION_CONFIG` -- path to a YAML simulation config
    /// - `SIMULATION_PRESET` -- preset name, used when no config path is set (default `default`)
    pub fn from_env() -> Result<Self, RunnerError> {
        let backend = LlmBackendConfig {
            backend_type: BackendType::parse(&env_var("LLM_BACKEND")?)?,
            api_url: env_var("LLM_API_URL")?,
            api_key: env_var("LLM_API_KEY")?,
            model: env_var("LLM_MODEL")?,
        };

        let decision_timeout_ms = parse_timeout(
            &std::env::var("DECISION_TIMEOUT_MS").unwrap_or_else(|_| "60000".to_owned()),
        )?;

        let templates_dir =
            std::env::var("TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_owned());
        let results_dir = std::env::var("RESULTS_DIR").unwrap_or_else(|_| "results".to_owned());
        let results_prefix =
            std::env::var("RESULTS_PREFIX").unwrap_or_else(|_| "simulation_results".to_owned());

        let simulation = simulation_source(
            std::env::var("SIMULATION_CONFIG").ok(),
            std::env::var("SIMULATION_PRESET").ok(),
        );

        Ok(Self {
            backend,
            decision_timeout: Duration::from_millis(decision_timeout_ms),
            templates_dir,
            results_dir: PathBuf::from(results_dir),
            results_prefix,
            simulation,
        })
    }
}

/// Read a required environment variable.
fn env_var(name: &str) -> Result<String, RunnerError> {
    std::env::var(name)
        .map_err(|e| RunnerError::Config(format!("missing required env var {name}: {e}")))
}

fn parse_timeout(raw: &str) -> Result<u64, RunnerError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(RunnerError::Config(
            "DECISION_TIMEOUT_MS must be positive".to_owned(),
        )),
        Ok(ms) => Ok(ms),
        Err(e) => Err(RunnerError::Config(format!(
            "invalid DECISION_TIMEOUT_MS: {e}"
        ))),
    }
}

/// A config path wins over a preset name; neither means the default preset.
fn simulation_source(path: Option<String>, preset_name: Option<String>) -> SimulationSource {
    match (path.filter(|p| !p.is_empty()), preset_name) {
        (Some(path), _) => SimulationSource::File(PathBuf::from(path)),
        (None, Some(name)) if !name.is_empty() => SimulationSource::Preset(name),
        (None, _) => SimulationSource::Preset("default".to_owned()),
    }
}
