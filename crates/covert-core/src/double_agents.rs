//! Double-Agent Registry
//!
//! Operatives planted by one faction inside another. Exposure risk moves with
//! mission outcomes and is checked once per turn; exposed or turned agents
//! leave active tracking for good.

use covert_events::{
    generate_double_agent_id, AgentId, DiplomaticEvent, DiplomaticEventType, FactionId, MediaCoverage,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::DoubleAgentConfig;
use crate::error::{CovertError, CovertResult};
use crate::rng::{check, RandomSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubleAgentStatus {
    Loyal,
    DoubleAgent,
    Exposed,
    Turned,
}

impl DoubleAgentStatus {
    /// Exposed and turned agents never come back
    pub fn is_terminal(&self) -> bool {
        matches!(self, DoubleAgentStatus::Exposed | DoubleAgentStatus::Turned)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleAgent {
    pub agent_id: AgentId,
    pub primary_faction: FactionId,
    pub secondary_factions: BTreeSet<FactionId>,
    pub exposure_risk: f32,
    pub intelligence_value: f32,
    pub status: DoubleAgentStatus,
    pub missions_completed: u32,
    pub missions_failed: u32,
    pub deployed_turn: u64,
    pub retired_turn: Option<u64>,
}

impl DoubleAgent {
    pub fn missions_total(&self) -> u32 {
        self.missions_completed + self.missions_failed
    }
}

/// Nudges exposure risk after a mission: down to the floor on success, up to
/// the ceiling on failure.
pub fn update_exposure_risk(agent: &mut DoubleAgent, succeeded: bool, config: &DoubleAgentConfig) {
    if succeeded {
        if agent.exposure_risk > config.exposure_floor {
            agent.exposure_risk = (agent.exposure_risk - config.success_exposure_step).max(config.exposure_floor);
        }
    } else if agent.exposure_risk < config.exposure_ceiling {
        agent.exposure_risk = (agent.exposure_risk + config.failure_exposure_step).min(config.exposure_ceiling);
    }
}

/// Highest counter-intelligence among the factions the agent is planted in.
fn host_counter_intelligence(agent: &DoubleAgent, counter_intelligence: &BTreeMap<FactionId, f32>) -> f32 {
    agent
        .secondary_factions
        .iter()
        .filter_map(|f| counter_intelligence.get(f).copied())
        .fold(0.0, f32::max)
}

/// Result of deploying a double agent
#[derive(Debug, Clone)]
pub struct DoubleAgentDeployed {
    pub agent_id: AgentId,
    pub event: DiplomaticEvent,
}

/// A double agent caught during the exposure pass
#[derive(Debug, Clone)]
pub struct DoubleAgentExposure {
    pub agent_id: AgentId,
    pub primary_faction: FactionId,
    pub chance: f32,
    pub heat_delta: f32,
    pub event: DiplomaticEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoubleAgentRegistry {
    config: DoubleAgentConfig,
    agents: BTreeMap<AgentId, DoubleAgent>,
    retired: Vec<DoubleAgent>,
    next_agent: u64,
}

impl DoubleAgentRegistry {
    pub fn new(config: DoubleAgentConfig) -> Self {
        Self {
            config,
            agents: BTreeMap::new(),
            retired: Vec::new(),
            next_agent: 1,
        }
    }

    pub fn config(&self) -> &DoubleAgentConfig {
        &self.config
    }

    pub fn deploy(&mut self, primary: &FactionId, secondary: &FactionId, turn: u64) -> CovertResult<DoubleAgentDeployed> {
        if primary == secondary {
            return Err(CovertError::SameFaction(primary.clone()));
        }
        let agent_id = generate_double_agent_id(self.next_agent);
        self.next_agent += 1;

        let agent = DoubleAgent {
            agent_id: agent_id.clone(),
            primary_faction: primary.clone(),
            secondary_factions: BTreeSet::from([secondary.clone()]),
            exposure_risk: self.config.initial_exposure_risk.clamp(0.0, 1.0),
            intelligence_value: self.config.initial_intelligence_value,
            status: DoubleAgentStatus::DoubleAgent,
            missions_completed: 0,
            missions_failed: 0,
            deployed_turn: turn,
            retired_turn: None,
        };
        self.agents.insert(agent_id.clone(), agent);

        tracing::info!("Double agent {} planted by {} inside {}", agent_id, primary, secondary);

        let event = DiplomaticEvent::new(
            DiplomaticEventType::DoubleAgentDeployed,
            vec![primary.clone(), secondary.clone()],
            turn,
            format!("{} planted an operative inside {}", primary, secondary),
        );
        Ok(DoubleAgentDeployed { agent_id, event })
    }

    /// Records a mission outcome; returns the agent's new exposure risk.
    pub fn record_mission(&mut self, agent_id: &AgentId, succeeded: bool) -> CovertResult<f32> {
        let config = &self.config;
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| CovertError::UnknownDoubleAgent(agent_id.clone()))?;
        if succeeded {
            agent.missions_completed += 1;
            agent.intelligence_value += config.intelligence_gain;
        } else {
            agent.missions_failed += 1;
        }
        update_exposure_risk(agent, succeeded, config);
        Ok(agent.exposure_risk)
    }

    /// Chance this agent is caught, scaled by the host faction's counter-intelligence.
    pub fn exposure_chance(&self, agent: &DoubleAgent, counter_intelligence: f32) -> f32 {
        let scale = 1.0 + counter_intelligence.max(0.0) * self.config.counter_intel_exposure_weight;
        (agent.exposure_risk * scale).clamp(0.0, 1.0)
    }

    /// One roll for agents that have run at least one mission; none otherwise.
    pub fn check_exposure(&self, agent: &DoubleAgent, counter_intelligence: f32, rng: &mut dyn RandomSource) -> bool {
        if agent.missions_total() == 0 {
            return false;
        }
        check(rng, self.exposure_chance(agent, counter_intelligence))
    }

    /// Checks every tracked agent in id order and retires the exposed ones.
    pub fn exposure_pass(
        &mut self,
        turn: u64,
        counter_intelligence: &BTreeMap<FactionId, f32>,
        rng: &mut dyn RandomSource,
    ) -> Vec<DoubleAgentExposure> {
        let mut caught = Vec::new();
        for agent in self.agents.values() {
            let ci = host_counter_intelligence(agent, counter_intelligence);
            if self.check_exposure(agent, ci, rng) {
                caught.push((agent.agent_id.clone(), self.exposure_chance(agent, ci)));
            }
        }

        let mut exposures = Vec::new();
        for (agent_id, chance) in caught {
            let Some(mut agent) = self.agents.remove(&agent_id) else {
                continue;
            };
            agent.status = DoubleAgentStatus::Exposed;
            agent.retired_turn = Some(turn);

            let mut factions = vec![agent.primary_faction.clone()];
            factions.extend(agent.secondary_factions.iter().cloned());
            let heat = self.config.exposure_heat;
            let event = DiplomaticEvent::new(
                DiplomaticEventType::DoubleAgentExposed,
                factions,
                turn,
                format!("{} operative unmasked after {} missions", agent.primary_faction, agent.missions_total()),
            )
            .with_heat(heat)
            .as_scandal();

            tracing::info!("Double agent {} exposed (chance {:.3})", agent_id, chance);

            exposures.push(DoubleAgentExposure {
                agent_id,
                primary_faction: agent.primary_faction.clone(),
                chance,
                heat_delta: heat,
                event,
            });
            self.retired.push(agent);
        }
        exposures
    }

    /// The agent switched sides for good.
    pub fn mark_turned(&mut self, agent_id: &AgentId, turn: u64) -> CovertResult<DiplomaticEvent> {
        let mut agent = self
            .agents
            .remove(agent_id)
            .ok_or_else(|| CovertError::UnknownDoubleAgent(agent_id.clone()))?;
        agent.status = DoubleAgentStatus::Turned;
        agent.retired_turn = Some(turn);

        let mut factions = vec![agent.primary_faction.clone()];
        factions.extend(agent.secondary_factions.iter().cloned());
        let event = DiplomaticEvent::new(
            DiplomaticEventType::DoubleAgentTurned,
            factions,
            turn,
            format!("{} operative switched sides", agent.primary_faction),
        )
        .with_coverage(MediaCoverage::None);

        tracing::info!("Double agent {} turned", agent_id);
        self.retired.push(agent);
        Ok(event)
    }

    /// Drops agents whose primary faction no longer exists.
    pub fn retire_for_faction(&mut self, faction: &FactionId, turn: u64) -> Vec<AgentId> {
        let ids: Vec<AgentId> = self
            .agents
            .values()
            .filter(|a| &a.primary_faction == faction)
            .map(|a| a.agent_id.clone())
            .collect();
        for id in &ids {
            if let Some(mut agent) = self.agents.remove(id) {
                agent.retired_turn = Some(turn);
                self.retired.push(agent);
            }
        }
        ids
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<&DoubleAgent> {
        self.agents.get(agent_id)
    }

    pub fn get_mut(&mut self, agent_id: &AgentId) -> Option<&mut DoubleAgent> {
        self.agents.get_mut(agent_id)
    }

    pub fn active(&self) -> impl Iterator<Item = &DoubleAgent> {
        self.agents.values()
    }

    pub fn retired(&self) -> &[DoubleAgent] {
        &self.retired
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ReplayRolls;

    fn registry_with_agent() -> (DoubleAgentRegistry, AgentId) {
        let mut registry = DoubleAgentRegistry::new(DoubleAgentConfig::default());
        let deployed = registry
            .deploy(&"red_hand".into(), &"dockers".into(), 1)
            .unwrap();
        (registry, deployed.agent_id)
    }

    #[test]
    fn test_deploy_assigns_sequential_ids() {
        let (mut registry, first) = registry_with_agent();
        let second = registry
            .deploy(&"red_hand".into(), &"students".into(), 2)
            .unwrap();
        assert_eq!(first.as_str(), "double_0001");
        assert_eq!(second.agent_id.as_str(), "double_0002");
        assert_eq!(second.event.event_type, DiplomaticEventType::DoubleAgentDeployed);
        let agent = registry.get(&first).unwrap();
        assert_eq!(agent.status, DoubleAgentStatus::DoubleAgent);
        assert!(agent.secondary_factions.contains(&FactionId::from("dockers")));
    }

    #[test]
    fn test_exposure_risk_floor_and_ceiling() {
        let config = DoubleAgentConfig::default();
        let (mut registry, id) = registry_with_agent();
        for _ in 0..20 {
            registry.record_mission(&id, true).unwrap();
        }
        assert_eq!(registry.get(&id).unwrap().exposure_risk, config.exposure_floor);

        for _ in 0..20 {
            registry.record_mission(&id, false).unwrap();
        }
        assert_eq!(registry.get(&id).unwrap().exposure_risk, config.exposure_ceiling);
    }

    #[test]
    fn test_risk_above_ceiling_is_not_pushed_higher() {
        let config = DoubleAgentConfig::default();
        let (mut registry, id) = registry_with_agent();
        let agent = registry.get_mut(&id).unwrap();
        agent.exposure_risk = 0.7;
        update_exposure_risk(agent, false, &config);
        assert_eq!(agent.exposure_risk, 0.7);
    }

    #[test]
    fn test_no_check_before_first_mission() {
        let (registry, id) = registry_with_agent();
        let mut rolls = ReplayRolls::new([0.0]);
        let agent = registry.get(&id).unwrap();
        assert!(!registry.check_exposure(agent, 0.0, &mut rolls));
        assert_eq!(rolls.consumed(), 0);
    }

    #[test]
    fn test_exposure_pass_removes_agent() {
        let (mut registry, id) = registry_with_agent();
        registry.record_mission(&id, false).unwrap();
        let mut rolls = ReplayRolls::new([0.05]);
        let exposures = registry.exposure_pass(3, &BTreeMap::new(), &mut rolls);
        assert_eq!(exposures.len(), 1);
        assert!(exposures[0].event.scandal);
        assert_eq!(exposures[0].heat_delta, 12.0);
        assert!(registry.get(&id).is_none());
        assert_eq!(registry.retired()[0].status, DoubleAgentStatus::Exposed);
    }

    #[test]
    fn test_counter_intelligence_scales_exposure() {
        let (mut registry, id) = registry_with_agent();
        registry.record_mission(&id, false).unwrap();
        let agent = registry.get(&id).unwrap();
        let base = registry.exposure_chance(agent, 0.0);
        let watched = registry.exposure_chance(agent, 1.0);
        assert!((watched - base * 1.5).abs() < 1e-6);

        // Roll between the two chances: caught only under the host's counter-intelligence
        let mut ci = BTreeMap::new();
        ci.insert(FactionId::from("dockers"), 1.0);
        let mut rolls = ReplayRolls::new([(base + watched) / 2.0]);
        let exposures = registry.exposure_pass(2, &ci, &mut rolls);
        assert_eq!(exposures.len(), 1);
    }

    #[test]
    fn test_planter_counter_intelligence_ignored() {
        let (mut registry, id) = registry_with_agent();
        registry.record_mission(&id, false).unwrap();
        let agent = registry.get(&id).unwrap();
        let base = registry.exposure_chance(agent, 0.0);
        let watched = registry.exposure_chance(agent, 1.0);

        let mut ci = BTreeMap::new();
        ci.insert(FactionId::from("red_hand"), 1.0);
        ci.insert(FactionId::from("dockers"), 0.0);
        let mut rolls = ReplayRolls::new([(base + watched) / 2.0]);
        assert!(registry.exposure_pass(2, &ci, &mut rolls).is_empty());
        assert_eq!(rolls.consumed(), 1);
        assert!(registry.get(&id).is_some());
    }

    #[test]
    fn test_strongest_host_counter_intelligence_applies() {
        let (mut registry, id) = registry_with_agent();
        registry.record_mission(&id, false).unwrap();
        registry
            .get_mut(&id)
            .unwrap()
            .secondary_factions
            .insert(FactionId::from("students"));

        let mut ci = BTreeMap::new();
        ci.insert(FactionId::from("dockers"), 0.2);
        ci.insert(FactionId::from("students"), 0.8);
        let agent = registry.get(&id).unwrap();
        assert_eq!(host_counter_intelligence(agent, &ci), 0.8);
        assert_eq!(host_counter_intelligence(agent, &BTreeMap::new()), 0.0);
    }

    #[test]
    fn test_mark_turned_is_terminal() {
        let (mut registry, id) = registry_with_agent();
        let event = registry.mark_turned(&id, 4).unwrap();
        assert_eq!(event.event_type, DiplomaticEventType::DoubleAgentTurned);
        assert!(registry.is_empty());
        assert!(registry.retired()[0].status.is_terminal());
        assert!(matches!(
            registry.mark_turned(&id, 5),
            Err(CovertError::UnknownDoubleAgent(_))
        ));
    }
}
