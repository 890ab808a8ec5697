use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::workflows::directory::{Agent, AgentId};

/// How an agent is chosen among those free at the requested start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentSelectionPolicy {
    /// First active agent by name (then id) with no appointment at that start.
    #[default]
    FirstAvailableByName,
    /// Active agent with the fewest pending appointments; ties fall back to name order.
    LeastLoaded,
}

impl AgentSelectionPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "first_available" | "first_available_by_name" | "by_name" => {
                Some(Self::FirstAvailableByName)
            }
            "least_loaded" => Some(Self::LeastLoaded),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstAvailableByName => "first_available",
            Self::LeastLoaded => "least_loaded",
        }
    }
}

/// Picks an agent for a slot. Pure: callers supply the agent roster (ordered by name, then
/// id), the agents already booked at the start, and per-agent pending load.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotAllocator {
    policy: AgentSelectionPolicy,
}

impl SlotAllocator {
    pub fn new(policy: AgentSelectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AgentSelectionPolicy {
        self.policy
    }

    pub fn select_agent<'a>(
        &self,
        agents: &'a [Agent],
        booked: &[AgentId],
        load: &HashMap<AgentId, usize>,
    ) -> Option<&'a Agent> {
        let mut candidates = agents
            .iter()
            .filter(|agent| agent.active && !booked.contains(&agent.id));

        match self.policy {
            AgentSelectionPolicy::FirstAvailableByName => candidates.next(),
            AgentSelectionPolicy::LeastLoaded => {
                candidates.min_by_key(|agent| load.get(&agent.id).copied().unwrap_or(0))
            }
        }
    }
}
