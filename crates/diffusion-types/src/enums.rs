//! Enumeration types for the diffusion simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Adopter categories
// ---------------------------------------------------------------------------

/// One of Rogers' five adopter segments.
///
/// The declaration order is the canonical order everywhere: population
/// construction, per-category aggregation, and edge attribution. `Ord`
/// follows it, so a `BTreeMap<AdopterCategory, _>` iterates innovators
/// first and laggards last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AdopterCategory {
    /// Risk-takers who adopt on their own judgment (2.5%).
    Innovator,
    /// Respected opinion leaders (13.5%).
    EarlyAdopter,
    /// Deliberate mainstream that follows proven results (34%).
    EarlyMajority,
    /// Skeptics who adopt under social pressure (34%).
    LateMajority,
    /// Traditionalists who change only when forced to (16%).
    Laggard,
}

impl AdopterCategory {
    /// All categories in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Innovator,
        Self::EarlyAdopter,
        Self::EarlyMajority,
        Self::LateMajority,
        Self::Laggard,
    ];

    /// Tie-break order for attributing an edge that joins two categories.
    ///
    /// An edge is attributed to whichever endpoint category appears first.
    pub const PRIORITY: [Self; 5] = [
        Self::Innovator,
        Self::EarlyAdopter,
        Self::EarlyMajority,
        Self::LateMajority,
        Self::Laggard,
    ];

    /// Category name as used in agent ids and serialized output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Innovator => "Innovator",
            Self::EarlyAdopter => "EarlyAdopter",
            Self::EarlyMajority => "EarlyMajority",
            Self::LateMajority => "LateMajority",
            Self::Laggard => "Laggard",
        }
    }

    /// Population share from Rogers (2003).
    pub const fn default_share(self) -> f64 {
        match self {
            Self::Innovator => 0.025,
            Self::EarlyAdopter => 0.135,
            Self::EarlyMajority | Self::LateMajority => 0.34,
            Self::Laggard => 0.16,
        }
    }

    /// Position of this category in [`Self::PRIORITY`].
    pub fn priority_rank(self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|c| *c == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    /// The category an edge between `a` and `b` is attributed to.
    pub fn dominant(a: Self, b: Self) -> Self {
        if b.priority_rank() < a.priority_rank() { b } else { a }
    }
}

impl core::fmt::Display for AdopterCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// The binary outcome of one adoption decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdoptionDecision {
    /// The agent adopts the innovation.
    #[serde(rename = "ADOPT")]
    Adopt,
    /// The agent declines for now.
    #[serde(rename = "NOT_ADOPT")]
    NotAdopt,
}

impl AdoptionDecision {
    /// Wire label of the decision.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Adopt => "ADOPT",
            Self::NotAdopt => "NOT_ADOPT",
        }
    }

    /// Parse a wire label. Only the exact upper-case labels are accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "ADOPT" => Some(Self::Adopt),
            "NOT_ADOPT" => Some(Self::NotAdopt),
            _ => None,
        }
    }
}

impl core::fmt::Display for AdoptionDecision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Topology families
// ---------------------------------------------------------------------------

/// The family of network topology wired between agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    /// Watts-Strogatz ring lattice with random rewiring.
    SmallWorld,
    /// Barabasi-Albert preferential attachment.
    ScaleFree,
    /// Erdos-Renyi independent edges.
    Random,
}

impl TopologyKind {
    /// Family name as written in configs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SmallWorld => "small_world",
            Self::ScaleFree => "scale_free",
            Self::Random => "random",
        }
    }
}

impl core::fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Run termination
// ---------------------------------------------------------------------------

/// Why a completed run stopped stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every agent adopted.
    AllAdopted,
    /// The cumulative adoption rate reached the configured threshold.
    ThresholdReached,
    /// Too many consecutive steps without a new adoption.
    NoAdoptionStreak,
    /// The configured number of steps ran out.
    MaxSteps,
}
