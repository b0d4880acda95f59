//! Named, ready-to-run simulation configs.

use std::collections::BTreeMap;

use diffusion_types::{AdopterCategory, InnovationAttributes};

use crate::config::SimulationConfig;

/// Every preset name, in presentation order.
pub const PRESET_NAMES: [&str; 11] = [
    "default",
    "successful",
    "all_balanced_no_dap",
    "successful_no_dap",
    "unsuccessful_no_dap",
    "bad_innovation_innovators_only",
    "decent_innovation_innovators_only",
    "early_adopters_devils_prompt_on",
    "early_adopters_devils_prompt_off",
    "early_adopters_bad_innovation_devils_prompt_on",
    "early_adopters_bad_innovation_devils_prompt_off",
];

const FULL_RUN_SEED: u64 = 314;
const SMALL_RUN_SEED: u64 = 41;

const PROMISING: InnovationAttributes = InnovationAttributes::new(0.7, 0.6, 0.4, 0.8, 0.5);
const BALANCED: InnovationAttributes = InnovationAttributes::new(0.5, 0.5, 0.5, 0.5, 0.5);
const HOPELESS: InnovationAttributes = InnovationAttributes::new(0.1, 0.1, 0.9, 0.1, 0.1);
const BAD: InnovationAttributes = InnovationAttributes::new(0.2, 0.1, 0.9, 0.1, 0.2);
const DECENT: InnovationAttributes = InnovationAttributes::new(0.6, 0.5, 0.4, 0.5, 0.5);
const BAD_FOR_EARLY_ADOPTERS: InnovationAttributes =
    InnovationAttributes::new(0.2, 0.1, 0.7, 0.3, 0.2);

/// Look up a preset by name.
pub fn preset(name: &str) -> Option<SimulationConfig> {
    let config = match name {
        "default" => SimulationConfig::default(),
        "successful" => full_run(name, PROMISING, true),
        "all_balanced_no_dap" => full_run(name, BALANCED, false),
        "successful_no_dap" => full_run(name, PROMISING, false),
        "unsuccessful_no_dap" => full_run(name, HOPELESS, false),
        "bad_innovation_innovators_only" => {
            single_category(name, AdopterCategory::Innovator, BAD, true)
        }
        "decent_innovation_innovators_only" => {
            single_category(name, AdopterCategory::Innovator, DECENT, true)
        }
        "early_adopters_devils_prompt_on" => {
            single_category(name, AdopterCategory::EarlyAdopter, PROMISING, true)
        }
        "early_adopters_devils_prompt_off" => {
            single_category(name, AdopterCategory::EarlyAdopter, PROMISING, false)
        }
        "early_adopters_bad_innovation_devils_prompt_on" => single_category(
            name,
            AdopterCategory::EarlyAdopter,
            BAD_FOR_EARLY_ADOPTERS,
            true,
        ),
        "early_adopters_bad_innovation_devils_prompt_off" => single_category(
            name,
            AdopterCategory::EarlyAdopter,
            BAD_FOR_EARLY_ADOPTERS,
            false,
        ),
        _ => return None,
    };
    Some(SimulationConfig {
        name: name.to_owned(),
        ..config
    })
}

/// Rogers population of 100, seeded, every agent asked every step.
fn full_run(name: &str, innovation: InnovationAttributes, devils_advocate: bool) -> SimulationConfig {
    SimulationConfig {
        name: name.to_owned(),
        innovation_attributes: innovation,
        network_seed: Some(FULL_RUN_SEED),
        network_shuffle: true,
        speed_up: false,
        enable_devils_advocate: devils_advocate,
        ..SimulationConfig::default()
    }
}

/// Twenty agents of one category, decided once.
fn single_category(
    name: &str,
    category: AdopterCategory,
    innovation: InnovationAttributes,
    devils_advocate: bool,
) -> SimulationConfig {
    let adopter_distribution: BTreeMap<AdopterCategory, f64> = AdopterCategory::ALL
        .iter()
        .map(|&c| (c, if c == category { 1.0 } else { 0.0 }))
        .collect();
    SimulationConfig {
        name: name.to_owned(),
        num_agents: 20,
        max_steps: 1,
        adopter_distribution,
        innovation_attributes: innovation,
        network_seed: Some(SMALL_RUN_SEED),
        network_shuffle: true,
        speed_up: false,
        enable_devils_advocate: devils_advocate,
        ..SimulationConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_is_valid_and_named() {
        for name in PRESET_NAMES {
            let config = preset(name);
            assert!(config.is_some(), "missing preset {name}");
            let config = config.unwrap_or_default();
            assert_eq!(config.name, name);
            assert!(config.validate().is_ok(), "invalid preset {name}");
        }
    }

    #[test]
    fn unknown_preset_is_none() {
        assert!(preset("nonexistent").is_none());
    }

    #[test]
    fn single_category_preset_puts_everyone_in_it() {
        let config = preset("early_adopters_devils_prompt_on").unwrap_or_default();
        let counts = config.agents_per_category();
        assert_eq!(counts.get(&AdopterCategory::EarlyAdopter), Some(&20));
        assert_eq!(counts.values().sum::<u32>(), 20);
        assert!(config.enable_devils_advocate);
    }
}
