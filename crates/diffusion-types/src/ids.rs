//! Agent identifiers.
//!
//! Agent ids are human-readable and deterministic: the category name, a
//! fixed infix and a zero-padded per-category ordinal, e.g.
//! `EarlyAdopter_agent_007`.
//! Two runs built from the same config therefore name their agents
//! identically, which keeps saved runs comparable.

use serde::{Deserialize, Serialize};

use crate::enums::AdopterCategory;

/// Unique identifier for an agent within one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Build the id for the `ordinal`-th agent of `category`.
    ///
    /// Ordinals are 1-based and counted per category.
    pub fn for_category(category: AdopterCategory, ordinal: u32) -> Self {
        Self(format!("{category}_agent_{ordinal:03}"))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for AgentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_format_is_zero_padded() {
        let id = AgentId::for_category(AdopterCategory::LateMajority, 7);
        assert_eq!(id.as_str(), "LateMajority_agent_007");
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = AgentId::from("Innovator_agent_001");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"Innovator_agent_001\"");
    }
}
