//! Network Analysis
//!
//! Aggregate status of a spy network and per-agent / per-cell breakdowns.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::agent::{AgentType, LoyaltyState, SpyAgent};
use super::cell::{CellStatus, NetworkCell};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    /// Every agent ever recruited, retired ones included
    pub total_agents: usize,
    /// Agents still in the registry
    pub active_agents: usize,
    /// Fraction of active agents that are loyal
    pub operational_security: f32,
    pub counter_intel_threat: f32,
    /// Locations with a loyal agent over locations with any agent
    pub coverage: f32,
    pub passive_intelligence: f32,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self {
            total_agents: 0,
            active_agents: 0,
            operational_security: 1.0,
            counter_intel_threat: 0.0,
            coverage: 0.0,
            passive_intelligence: 0.0,
        }
    }
}

impl NetworkStatus {
    pub fn compute<'a>(agents: impl Iterator<Item = &'a SpyAgent>, retired: usize) -> Self {
        let agents: Vec<&SpyAgent> = agents.collect();
        if agents.is_empty() {
            return Self {
                total_agents: retired,
                ..Self::default()
            };
        }
        let count = agents.len() as f32;
        let loyal: Vec<&&SpyAgent> = agents
            .iter()
            .filter(|a| a.loyalty_state == LoyaltyState::Loyal)
            .collect();

        let mean_exposure = agents.iter().map(|a| a.exposure_risk).sum::<f32>() / count;
        let all_locations: BTreeSet<&str> = agents.iter().map(|a| a.location.as_str()).collect();
        let loyal_locations: BTreeSet<&str> = loyal.iter().map(|a| a.location.as_str()).collect();

        Self {
            total_agents: agents.len() + retired,
            active_agents: agents.len(),
            operational_security: loyal.len() as f32 / count,
            counter_intel_threat: (mean_exposure * 1.2).min(1.0),
            coverage: loyal_locations.len() as f32 / all_locations.len() as f32,
            passive_intelligence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentBreakdown {
    /// Agents currently in the network
    pub total: usize,
    pub by_loyalty: BTreeMap<LoyaltyState, usize>,
    pub by_type: BTreeMap<AgentType, usize>,
    pub average_stress: f32,
    pub average_exposure: f32,
    pub high_burn_risk: usize,
    pub burned: usize,
    pub turned: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellBreakdown {
    pub total: usize,
    pub active: usize,
    pub dormant: usize,
    pub compromised: usize,
    pub average_size: f32,
    pub average_security: f32,
}

impl CellBreakdown {
    pub fn compute<'a>(cells: impl Iterator<Item = &'a NetworkCell>) -> Self {
        let mut breakdown = CellBreakdown::default();
        let mut members = 0usize;
        let mut security = 0.0;
        for cell in cells {
            breakdown.total += 1;
            members += cell.agents.len();
            security += cell.security_level;
            match cell.status {
                CellStatus::Active => breakdown.active += 1,
                CellStatus::Dormant => breakdown.dormant += 1,
                CellStatus::Compromised => breakdown.compromised += 1,
            }
        }
        if breakdown.total > 0 {
            breakdown.average_size = members as f32 / breakdown.total as f32;
            breakdown.average_security = security / breakdown.total as f32;
        }
        breakdown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAnalysis {
    pub status: NetworkStatus,
    pub agents: AgentBreakdown,
    pub cells: CellBreakdown,
}
