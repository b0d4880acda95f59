//! The ordered agent population of one run.

use std::collections::BTreeMap;

use diffusion_types::{AdopterCategory, AgentId, AgentStateSnapshot};

use crate::agent::Agent;
use crate::config::SimulationConfig;

/// All agents of a run, in construction order.
///
/// Construction order is category order (innovators first), then ordinal.
/// It is also the order in which agents decide within a step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Population {
    agents: Vec<Agent>,
    index: BTreeMap<AgentId, usize>,
}

impl Population {
    /// Create the agents described by `config`, unconnected and non-adopted.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let agents = config
            .agents_per_category()
            .into_iter()
            .flat_map(|(category, count)| {
                (1..=count).map(move |ordinal| {
                    Agent::new(AgentId::for_category(category, ordinal), category)
                })
            })
            .collect();
        Self::from_agents(agents)
    }

    /// Wrap an existing list of agents.
    pub fn from_agents(agents: Vec<Agent>) -> Self {
        let index = agents
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id().clone(), i))
            .collect();
        Self { agents, index }
    }

    /// Agents in decision order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Mutable access for wiring and deciding.
    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Look an agent up by id.
    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.index.get(id).and_then(|&i| self.agents.get(i))
    }

    /// Population size.
    pub fn len(&self) -> u32 {
        u32::try_from(self.agents.len()).unwrap_or(u32::MAX)
    }

    /// Whether the population has no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents that have adopted.
    pub fn adopted_count(&self) -> u32 {
        let count = self.agents.iter().filter(|a| a.has_adopted()).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Fraction of the population that has adopted; zero when empty.
    pub fn adoption_rate(&self) -> f64 {
        ratio(self.adopted_count(), self.len())
    }

    /// Agent and adopter counts per category, covering every category.
    pub fn category_counts(&self) -> BTreeMap<AdopterCategory, (u32, u32)> {
        let mut counts: BTreeMap<AdopterCategory, (u32, u32)> =
            AdopterCategory::ALL.iter().map(|&c| (c, (0, 0))).collect();
        for agent in &self.agents {
            let entry = counts.entry(agent.category()).or_insert((0, 0));
            entry.0 = entry.0.saturating_add(1);
            if agent.has_adopted() {
                entry.1 = entry.1.saturating_add(1);
            }
        }
        counts
    }

    /// Adopted neighbors of `agent`.
    pub fn adopted_neighbors(&self, agent: &Agent) -> u32 {
        let count = agent
            .neighbors()
            .iter()
            .filter(|id| self.get(id).is_some_and(Agent::has_adopted))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Freeze every agent against the same `global_adoption_rate`.
    ///
    /// Neighbor counts are all read before any snapshot is written.
    pub fn freeze_all(&mut self, global_adoption_rate: f64) {
        let adopted: Vec<u32> = self
            .agents
            .iter()
            .map(|a| self.adopted_neighbors(a))
            .collect();
        for (agent, adopted_neighbors) in self.agents.iter_mut().zip(adopted) {
            agent.freeze_state(global_adoption_rate, adopted_neighbors);
        }
    }

    /// Terminal state of every agent, in population order.
    pub fn snapshots(&self) -> Vec<AgentStateSnapshot> {
        self.agents.iter().map(Agent::state_snapshot).collect()
    }
}

/// `part / whole`, zero when `whole` is zero.
pub(crate) fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}
