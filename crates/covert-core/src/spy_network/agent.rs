//! Spy Agents
//!
//! Individual assets of a faction's network and their loyalty ladder.

use covert_events::{AgentId, CellId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::NetworkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Asset,
    Informant,
    DoubleAgent,
    Sleeper,
    Handler,
    Courier,
    Saboteur,
    Infiltrator,
}

/// Loyalty only ever moves down this ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyState {
    Loyal,
    Wavering,
    Compromised,
    Turned,
    Burned,
}

impl LoyaltyState {
    /// One step down: Loyal -> Wavering -> Compromised. Later states stay put.
    pub fn degrade(self) -> Self {
        match self {
            LoyaltyState::Loyal => LoyaltyState::Wavering,
            LoyaltyState::Wavering => LoyaltyState::Compromised,
            other => other,
        }
    }

    pub fn effectiveness_factor(&self) -> f32 {
        match self {
            LoyaltyState::Loyal => 1.0,
            LoyaltyState::Wavering => 0.7,
            LoyaltyState::Compromised => 0.3,
            LoyaltyState::Turned | LoyaltyState::Burned => 0.0,
        }
    }

    /// Turned and Burned agents are out of service.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoyaltyState::Turned | LoyaltyState::Burned)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpyAgent {
    pub agent_id: AgentId,
    pub code_name: String,
    pub agent_type: AgentType,
    pub loyalty_state: LoyaltyState,
    /// 1 to 10
    pub access_level: u8,
    pub reliability: f32,
    pub stealth: f32,
    pub stress: f32,
    pub exposure_risk: f32,
    pub burn_risk: f32,
    pub cover_identity: String,
    pub location: String,
    pub handler: Option<AgentId>,
    pub contacts: BTreeSet<AgentId>,
    pub cell_id: Option<CellId>,
    pub recruited_turn: u64,
    pub last_contact_turn: u64,
    pub missions_completed: u32,
    pub missions_compromised: u32,
    pub intelligence_gathered: f32,
}

impl SpyAgent {
    /// Mean of reliability and stealth, scaled by loyalty and reduced by stress.
    pub fn effectiveness(&self) -> f32 {
        let base = (self.reliability + self.stealth) / 2.0;
        let stress_factor = 1.0 - self.stress * 0.5;
        (base * self.loyalty_state.effectiveness_factor() * stress_factor).clamp(0.0, 1.0)
    }

    /// Counts the loyalty risk factors present at `turn`.
    pub fn risk_factors(&self, turn: u64, config: &NetworkConfig) -> u32 {
        let mut factors = 0;
        if self.stress > config.high_stress_threshold {
            factors += 1;
        }
        if self.exposure_risk > config.high_exposure_threshold {
            factors += 1;
        }
        if self.missions_compromised >= config.compromise_threshold {
            factors += 1;
        }
        if turn.saturating_sub(self.last_contact_turn) > config.unmonitored_window_turns {
            factors += 1;
        }
        factors
    }

    pub fn refresh_burn_risk(&mut self, config: &NetworkConfig) {
        self.burn_risk = (self.exposure_risk * config.burn_risk_exposure_weight
            + self.stress * config.burn_risk_stress_weight)
            .clamp(0.0, 1.0);
    }

    pub(crate) fn adjust_stress(&mut self, delta: f32) {
        self.stress = (self.stress + delta).clamp(0.0, 1.0);
    }

    pub(crate) fn adjust_exposure(&mut self, delta: f32) {
        self.exposure_risk = (self.exposure_risk + delta).clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_agent() -> SpyAgent {
        SpyAgent {
            agent_id: AgentId::from("agent_0001"),
            code_name: "Kestrel".to_string(),
            agent_type: AgentType::Informant,
            loyalty_state: LoyaltyState::Loyal,
            access_level: 5,
            reliability: 0.8,
            stealth: 0.6,
            stress: 0.0,
            exposure_risk: 0.05,
            burn_risk: 0.0,
            cover_identity: "port clerk".to_string(),
            location: "harbor".to_string(),
            handler: None,
            contacts: BTreeSet::new(),
            cell_id: None,
            recruited_turn: 1,
            last_contact_turn: 1,
            missions_completed: 0,
            missions_compromised: 0,
            intelligence_gathered: 0.0,
        }
    }

    #[test]
    fn test_loyalty_ladder() {
        assert_eq!(LoyaltyState::Loyal.degrade(), LoyaltyState::Wavering);
        assert_eq!(LoyaltyState::Wavering.degrade(), LoyaltyState::Compromised);
        assert_eq!(LoyaltyState::Compromised.degrade(), LoyaltyState::Compromised);
        assert_eq!(LoyaltyState::Burned.degrade(), LoyaltyState::Burned);
    }

    #[test]
    fn test_effectiveness_by_loyalty_and_stress() {
        let mut agent = sample_agent();
        assert!((agent.effectiveness() - 0.7).abs() < 1e-6);

        agent.stress = 1.0;
        assert!((agent.effectiveness() - 0.35).abs() < 1e-6);

        agent.stress = 0.0;
        agent.loyalty_state = LoyaltyState::Wavering;
        assert!((agent.effectiveness() - 0.49).abs() < 1e-6);

        agent.loyalty_state = LoyaltyState::Turned;
        assert_eq!(agent.effectiveness(), 0.0);
    }

    #[test]
    fn test_risk_factor_count() {
        let config = NetworkConfig::default();
        let mut agent = sample_agent();
        assert_eq!(agent.risk_factors(2, &config), 0);

        agent.stress = 0.8;
        agent.exposure_risk = 0.6;
        assert_eq!(agent.risk_factors(2, &config), 2);

        agent.missions_compromised = 3;
        assert_eq!(agent.risk_factors(20, &config), 4);
    }

    #[test]
    fn test_burn_risk_tracks_exposure_and_stress() {
        let config = NetworkConfig::default();
        let mut agent = sample_agent();
        agent.exposure_risk = 0.5;
        agent.stress = 0.5;
        agent.refresh_burn_risk(&config);
        assert!((agent.burn_risk - 0.5).abs() < 1e-6);
    }
}
