//! Simulation configuration: loading, defaults, validation, and the
//! per-category population split.
//!
//! Configs are YAML documents. Every field is optional and falls back to
//! the defaults below; loading always validates, so a [`SimulationConfig`]
//! obtained from [`SimulationConfig::from_file`] or
//! [`SimulationConfig::parse`] is ready to run.
//!
//! ```yaml
//! name: successful
//! num_agents: 100
//! network_type: small_world
//! network_params:
//!   k: 4
//!   rewiring_prob: 0.3
//! network_seed: 314
//! speed_up: false
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use diffusion_network::TopologyParams;
use diffusion_network::generator::effective_neighbor_count;
use diffusion_types::{AdopterCategory, InnovationAttributes};
use serde::{Deserialize, Serialize};

/// Allowed deviation of the category distribution sum from 1.0.
pub const DISTRIBUTION_TOLERANCE: f64 = 0.01;

/// Errors raised when a config violates its invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Category shares do not sum to 1.0 within tolerance.
    #[error("adopter distribution must sum to 1.0 (+/- {DISTRIBUTION_TOLERANCE}), got {sum}")]
    DistributionSum {
        /// The actual sum.
        sum: f64,
    },

    /// A single category share is outside `[0, 1]`.
    #[error("share of {category} must be in [0, 1], got {value}")]
    DistributionShare {
        /// The category.
        category: AdopterCategory,
        /// The offending share.
        value: f64,
    },

    /// An innovation attribute is outside `[0, 1]`.
    #[error("innovation attribute {name} must be in [0, 1], got {value}")]
    InnovationAttribute {
        /// Attribute name.
        name: &'static str,
        /// The offending score.
        value: f64,
    },

    /// Population size is zero.
    #[error("num_agents must be positive")]
    EmptyPopulation,

    /// Step budget is zero.
    #[error("max_steps must be positive")]
    NoSteps,

    /// Early-stop threshold is outside `[0, 1]`.
    #[error("early_stop_threshold must be in [0, 1], got {value}")]
    EarlyStopThreshold {
        /// The offending threshold.
        value: f64,
    },

    /// Early-stop patience of zero would stop before any step ran.
    #[error("early_stop_no_adoption_steps must be at least 1 when set")]
    ZeroPatience,

    /// Small-world `k` outside `1..num_agents`.
    #[error("small-world k must be between 1 and {}, got {k}", num_agents.saturating_sub(1))]
    SmallWorldNeighbors {
        /// Requested neighbor count.
        k: u32,
        /// Population size.
        num_agents: u32,
    },

    /// Small-world rewiring probability outside `[0, 1]`.
    #[error("small-world rewiring_prob must be in [0, 1], got {value}")]
    RewiringProbability {
        /// The offending probability.
        value: f64,
    },

    /// Scale-free `m` outside `1..num_agents`.
    #[error("scale-free m must be between 1 and {}, got {m}", num_agents.saturating_sub(1))]
    ScaleFreeAttachment {
        /// Requested attachment count.
        m: u32,
        /// Population size.
        num_agents: u32,
    },

    /// Scale-free exponent not greater than 1.
    #[error("scale-free alpha must be > 1, got {alpha}")]
    ScaleFreeExponent {
        /// The offending exponent.
        alpha: f64,
    },

    /// Random-network edge probability outside `[0, 1]`.
    #[error("random network p must be in [0, 1], got {p}")]
    EdgeProbability {
        /// The offending probability.
        p: f64,
    },

    /// Rounded category counts exceed the population before the last
    /// category is assigned.
    #[error("category shares round to {assigned} agents, more than num_agents = {num_agents}")]
    CategoryOvershoot {
        /// Agents assigned to all but the last category.
        assigned: u32,
        /// Population size.
        num_agents: u32,
    },
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The parsed config violates an invariant.
    #[error("invalid config: {source}")]
    Invalid {
        /// The validation failure.
        #[from]
        source: ValidationError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Parameters of one simulation run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable name, used in saved-run metadata.
    #[serde(default = "default_name")]
    pub name: String,

    /// Population size.
    #[serde(default = "default_num_agents")]
    pub num_agents: u32,

    /// Share of the population in each category. Missing categories count
    /// as zero.
    #[serde(default = "default_distribution")]
    pub adopter_distribution: BTreeMap<AdopterCategory, f64>,

    /// Perceived attributes of the innovation.
    #[serde(default)]
    pub innovation_attributes: InnovationAttributes,

    /// Topology family and its parameters, stored flat as `network_type`
    /// and `network_params`.
    #[serde(flatten)]
    pub network: TopologyParams,

    /// Seed for topology generation and the node permutation.
    #[serde(default)]
    pub network_seed: Option<u64>,

    /// Whether agents are placed on the topology in shuffled order.
    #[serde(default = "default_true")]
    pub network_shuffle: bool,

    /// Step budget.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Stop once the cumulative adoption rate reaches this value.
    #[serde(default = "default_early_stop_threshold")]
    pub early_stop_threshold: f64,

    /// Stop after this many consecutive steps without a new adoption.
    /// `None` disables the rule.
    #[serde(default = "default_patience")]
    pub early_stop_no_adoption_steps: Option<u32>,

    /// Ask agents to argue against their first inclination before deciding.
    #[serde(default)]
    pub enable_devils_advocate: bool,

    /// Skip the late majority on step 2 while none of them has adopted.
    #[serde(default = "default_true")]
    pub speed_up: bool,
}

impl SimulationConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not a valid config document, or
    /// [`ConfigError::Invalid`] if the values violate an invariant.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config.validated()?)
    }

    /// Consume the config, returning it only if it is valid.
    pub fn validated(self) -> Result<Self, ValidationError> {
        self.validate()?;
        Ok(self)
    }

    /// Check every invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_distribution()?;

        for (name, value) in self.innovation_attributes.entries() {
            if !is_unit(value) {
                return Err(ValidationError::InnovationAttribute { name, value });
            }
        }

        if self.num_agents == 0 {
            return Err(ValidationError::EmptyPopulation);
        }
        if self.max_steps == 0 {
            return Err(ValidationError::NoSteps);
        }
        if !is_unit(self.early_stop_threshold) {
            return Err(ValidationError::EarlyStopThreshold {
                value: self.early_stop_threshold,
            });
        }
        if self.early_stop_no_adoption_steps == Some(0) {
            return Err(ValidationError::ZeroPatience);
        }

        self.validate_network()?;

        let assigned = self.assigned_before_last();
        if assigned > self.num_agents {
            return Err(ValidationError::CategoryOvershoot {
                assigned,
                num_agents: self.num_agents,
            });
        }
        Ok(())
    }

    fn validate_distribution(&self) -> Result<(), ValidationError> {
        for (&category, &value) in &self.adopter_distribution {
            if !is_unit(value) {
                return Err(ValidationError::DistributionShare { category, value });
            }
        }
        let sum: f64 = self.adopter_distribution.values().sum();
        if (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE {
            Ok(())
        } else {
            Err(ValidationError::DistributionSum { sum })
        }
    }

    fn validate_network(&self) -> Result<(), ValidationError> {
        let num_agents = self.num_agents;
        match self.network {
            TopologyParams::SmallWorld { k, rewiring_prob } => {
                if k < 1 || k >= num_agents {
                    return Err(ValidationError::SmallWorldNeighbors { k, num_agents });
                }
                if !is_unit(rewiring_prob) {
                    return Err(ValidationError::RewiringProbability {
                        value: rewiring_prob,
                    });
                }
            }
            TopologyParams::ScaleFree { m, alpha } => {
                if m < 1 || m >= num_agents {
                    return Err(ValidationError::ScaleFreeAttachment { m, num_agents });
                }
                if alpha.is_nan() || alpha <= 1.0 {
                    return Err(ValidationError::ScaleFreeExponent { alpha });
                }
            }
            TopologyParams::Random { p } => {
                if !is_unit(p) {
                    return Err(ValidationError::EdgeProbability { p });
                }
            }
        }
        Ok(())
    }

    /// Share of `category`, zero when absent.
    pub fn share(&self, category: AdopterCategory) -> f64 {
        self.adopter_distribution
            .get(&category)
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of agents in each category.
    ///
    /// Every category but the last is `round(num_agents * share)` with ties
    /// to even; the last takes the remainder, so the counts always sum to
    /// `num_agents` for a valid config.
    pub fn agents_per_category(&self) -> BTreeMap<AdopterCategory, u32> {
        let mut counts = BTreeMap::new();
        let mut assigned: u32 = 0;
        let last = AdopterCategory::ALL.len().saturating_sub(1);
        for (i, &category) in AdopterCategory::ALL.iter().enumerate() {
            let count = if i == last {
                self.num_agents.saturating_sub(assigned)
            } else {
                let count = rounded_share(self.num_agents, self.share(category));
                assigned = assigned.saturating_add(count);
                count
            };
            counts.insert(category, count);
        }
        counts
    }

    fn assigned_before_last(&self) -> u32 {
        let last = AdopterCategory::ALL.len().saturating_sub(1);
        AdopterCategory::ALL
            .iter()
            .take(last)
            .map(|&c| rounded_share(self.num_agents, self.share(c)))
            .fold(0_u32, u32::saturating_add)
    }

    /// The small-world neighbor count actually used for this population,
    /// or `None` for other topology families.
    pub fn effective_small_world_k(&self) -> Option<u32> {
        match self.network {
            TopologyParams::SmallWorld { k, .. } => Some(effective_neighbor_count(k, self.num_agents)),
            _ => None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            num_agents: default_num_agents(),
            adopter_distribution: default_distribution(),
            innovation_attributes: InnovationAttributes::default(),
            network: TopologyParams::default(),
            network_seed: None,
            network_shuffle: true,
            max_steps: default_max_steps(),
            early_stop_threshold: default_early_stop_threshold(),
            early_stop_no_adoption_steps: default_patience(),
            enable_devils_advocate: false,
            speed_up: true,
        }
    }
}

fn is_unit(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rounded_share(num_agents: u32, share: f64) -> u32 {
    let raw = (f64::from(num_agents) * share).round_ties_even();
    if raw.is_nan() || raw <= 0.0 {
        0
    } else if raw >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        raw as u32
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_name() -> String {
    "unnamed_simulation".to_owned()
}

const fn default_num_agents() -> u32 {
    100
}

fn default_distribution() -> BTreeMap<AdopterCategory, f64> {
    AdopterCategory::ALL
        .iter()
        .map(|&c| (c, c.default_share()))
        .collect()
}

const fn default_true() -> bool {
    true
}

const fn default_max_steps() -> u32 {
    25
}

const fn default_early_stop_threshold() -> f64 {
    1.0
}

#[allow(clippy::unnecessary_wraps)]
const fn default_patience() -> Option<u32> {
    Some(2)
}
