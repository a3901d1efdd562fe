//! Spy Network Manager
//!
//! A faction's clandestine assets: recruitment, cell placement, missions and
//! the per-turn aging pass (stress recovery, exposure, loyalty drift, burns).

pub mod agent;
pub mod analysis;
pub mod cell;
pub mod missions;
pub mod recruitment;

pub use agent::{AgentType, LoyaltyState, SpyAgent};
pub use analysis::{AgentBreakdown, CellBreakdown, NetworkAnalysis, NetworkStatus};
pub use cell::{CellStatus, NetworkCell};
pub use missions::{MissionOutcome, MissionRejection, MissionSpec, MissionType};
pub use recruitment::{recruitment_chance, RecruitmentMethod, RecruitmentProfile};

use covert_events::{
    generate_agent_id, generate_cell_id, AgentId, CellId, DiplomaticEvent, DiplomaticEventType, FactionId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::NetworkConfig;
use crate::error::{CovertError, CovertResult};
use crate::rng::{check, RandomSource};

/// Why an agent left service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnReason {
    /// Exposure crossed the burn threshold
    Exposure,
    /// Loyalty degraded to compromised
    Disloyalty,
    /// Burned on the owner's orders
    Ordered,
}

/// Archive entry for an agent removed from the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnRecord {
    pub agent: SpyAgent,
    pub reason: BurnReason,
    pub turn: u64,
}

impl BurnRecord {
    pub fn defected(&self) -> bool {
        self.agent.loyalty_state == LoyaltyState::Turned
    }
}

/// Result of a recruitment attempt
#[derive(Debug, Clone)]
pub struct Recruitment {
    pub chance: f32,
    /// The new agent, or `None` when the approach failed
    pub agent: Option<SpyAgent>,
}

/// What the aging pass did this turn
#[derive(Debug, Clone, Default)]
pub struct NetworkTurnReport {
    pub exposed: Vec<AgentId>,
    pub degraded: Vec<AgentId>,
    pub retired: Vec<BurnRecord>,
    pub passive_intelligence: f32,
    pub events: Vec<DiplomaticEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpyNetwork {
    config: NetworkConfig,
    owner: FactionId,
    agents: BTreeMap<AgentId, SpyAgent>,
    cells: BTreeMap<CellId, NetworkCell>,
    burned: Vec<BurnRecord>,
    status: NetworkStatus,
    /// Events raised outside the turn pass, drained by the caller
    pending: Vec<DiplomaticEvent>,
    next_agent: u64,
    next_cell: u64,
}

impl SpyNetwork {
    pub fn new(owner: impl Into<FactionId>, config: NetworkConfig) -> Self {
        Self {
            config,
            owner: owner.into(),
            agents: BTreeMap::new(),
            cells: BTreeMap::new(),
            burned: Vec::new(),
            status: NetworkStatus::default(),
            pending: Vec::new(),
            next_agent: 1,
            next_cell: 1,
        }
    }

    pub fn owner(&self) -> &FactionId {
        &self.owner
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn status(&self) -> &NetworkStatus {
        &self.status
    }

    /// One roll; on success the recruit joins a cell in its location.
    pub fn recruit_agent(
        &mut self,
        profile: &RecruitmentProfile,
        method: RecruitmentMethod,
        recruiter: Option<&AgentId>,
        turn: u64,
        rng: &mut dyn RandomSource,
    ) -> CovertResult<Recruitment> {
        let recruiter_agent = match recruiter {
            Some(id) => Some(self.agents.get(id).ok_or_else(|| CovertError::UnknownAgent(id.clone()))?),
            None => None,
        };
        let chance = recruitment_chance(
            &self.config,
            method,
            recruiter_agent.map(|r| r.effectiveness()),
            self.status.counter_intel_threat,
        );
        let handler = recruiter_agent
            .filter(|r| r.agent_type == AgentType::Handler)
            .map(|r| r.agent_id.clone());

        if !check(rng, chance) {
            tracing::debug!("Recruitment of {} via {:?} failed (chance {:.3})", profile.code_name, method, chance);
            return Ok(Recruitment { chance, agent: None });
        }

        let agent_id = generate_agent_id(self.next_agent);
        self.next_agent += 1;

        let mut agent = SpyAgent {
            agent_id: agent_id.clone(),
            code_name: profile.code_name.clone(),
            agent_type: profile.agent_type,
            loyalty_state: LoyaltyState::Loyal,
            access_level: profile.access_level.clamp(1, 10),
            reliability: profile.reliability.clamp(0.0, 1.0),
            stealth: profile.stealth.clamp(0.0, 1.0),
            stress: 0.0,
            exposure_risk: self.config.initial_exposure.clamp(0.0, 1.0),
            burn_risk: 0.0,
            cover_identity: profile.cover_identity.clone(),
            location: profile.location.clone(),
            handler,
            contacts: BTreeSet::new(),
            cell_id: None,
            recruited_turn: turn,
            last_contact_turn: turn,
            missions_completed: 0,
            missions_compromised: 0,
            intelligence_gathered: 0.0,
        };
        agent.refresh_burn_risk(&self.config);

        if let Some(recruiter_id) = recruiter {
            agent.contacts.insert(recruiter_id.clone());
            if let Some(r) = self.agents.get_mut(recruiter_id) {
                r.contacts.insert(agent_id.clone());
                r.last_contact_turn = turn;
            }
        }

        let cell_id = self.place_in_cell(&agent.location, turn);
        agent.cell_id = Some(cell_id.clone());
        if let Some(cell) = self.cells.get_mut(&cell_id) {
            cell.agents.insert(agent_id.clone());
        }
        self.agents.insert(agent_id.clone(), agent.clone());
        self.refresh_cell(&cell_id);
        self.refresh_status();

        tracing::info!("Recruited {} ({}) into {} via {:?}", agent.code_name, agent_id, cell_id, method);
        self.pending.push(DiplomaticEvent::new(
            DiplomaticEventType::AgentRecruited,
            vec![self.owner.clone()],
            turn,
            format!("{} recruited a new {:?} in {}", self.owner, agent.agent_type, agent.location),
        ));

        Ok(Recruitment {
            chance,
            agent: Some(agent),
        })
    }

    /// Existing cell in `location` with room, else a new one.
    fn place_in_cell(&mut self, location: &str, turn: u64) -> CellId {
        let capacity = self.config.cell_capacity;
        if let Some(cell) = self.cells.values().find(|c| c.accepts(location, capacity)) {
            return cell.cell_id.clone();
        }
        let cell_id = generate_cell_id(self.next_cell);
        self.next_cell += 1;
        self.cells
            .insert(cell_id.clone(), NetworkCell::new(cell_id.clone(), location, turn));
        tracing::debug!("Opened cell {} in {}", cell_id, location);
        cell_id
    }

    fn refresh_cell(&mut self, cell_id: &CellId) {
        let Some(cell) = self.cells.get_mut(cell_id) else {
            return;
        };
        let stealth: Vec<f32> = cell
            .agents
            .iter()
            .filter_map(|id| self.agents.get(id))
            .map(|a| a.stealth)
            .collect();
        cell.refresh(&stealth, self.config.burn_security_penalty, self.config.cell_compromise_security);
    }

    /// Rolls once for success and, on failure, once more for exposure.
    pub fn assign_mission(
        &mut self,
        agent_id: &AgentId,
        mission: &MissionSpec,
        turn: u64,
        rng: &mut dyn RandomSource,
    ) -> CovertResult<MissionOutcome> {
        let config = &self.config;
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| CovertError::UnknownAgent(agent_id.clone()))?;

        let rejection = match agent.loyalty_state {
            LoyaltyState::Turned => Some(MissionRejection::AgentTurned),
            LoyaltyState::Burned => Some(MissionRejection::AgentBurned),
            _ if agent.stress > config.max_mission_stress => Some(MissionRejection::TooStressed),
            _ => None,
        };
        if let Some(reason) = rejection {
            return Ok(MissionOutcome::Rejected { reason });
        }

        let risk = mission.risk.clamp(0.0, 1.0);
        let chance = (agent.effectiveness() * config.missions.multiplier(mission.mission_type)).clamp(0.0, 1.0);
        agent.last_contact_turn = turn;

        if check(rng, chance) {
            let intelligence = agent.access_level as f32 * agent.effectiveness();
            agent.missions_completed += 1;
            agent.intelligence_gathered += intelligence;
            agent.adjust_stress(risk * config.success_stress_weight);
            agent.refresh_burn_risk(config);
            tracing::debug!("{} completed {:?} (chance {:.3})", agent_id, mission.mission_type, chance);
            self.refresh_status();
            return Ok(MissionOutcome::Succeeded { chance, intelligence });
        }

        agent.missions_compromised += 1;
        agent.adjust_stress(risk * config.failure_stress_weight);
        let exposure_raised = check(rng, risk);
        if exposure_raised {
            agent.adjust_exposure(config.failure_exposure_base + risk * config.failure_exposure_weight);
        }
        let compromised = agent.exposure_risk > config.burn_exposure_threshold
            && agent.loyalty_state != LoyaltyState::Compromised;
        if compromised {
            agent.loyalty_state = LoyaltyState::Compromised;
            tracing::info!("{} compromised on a failed {:?}", agent_id, mission.mission_type);
            self.pending.push(
                DiplomaticEvent::new(
                    DiplomaticEventType::AgentExposed,
                    vec![self.owner.clone()],
                    turn,
                    format!("{} asset blown during a failed operation", self.owner),
                )
                .as_scandal(),
            );
        }
        agent.refresh_burn_risk(config);
        self.refresh_status();
        Ok(MissionOutcome::Failed {
            chance,
            exposure_raised,
            compromised,
        })
    }

    /// Ages the network by one turn.
    pub fn process_turn(&mut self, turn: u64, rng: &mut dyn RandomSource) -> NetworkTurnReport {
        let mut report = NetworkTurnReport::default();
        // A zero interval disables loyalty checks
        let loyalty_turn = turn.checked_rem(self.config.loyalty_check_interval) == Some(0);
        let ids: Vec<AgentId> = self.agents.keys().cloned().collect();

        for agent_id in &ids {
            let config = &self.config;
            let Some(agent) = self.agents.get_mut(agent_id) else {
                continue;
            };
            agent.adjust_stress(-config.stress_recovery_rate);

            if agent.loyalty_state != LoyaltyState::Compromised {
                let exposed = if agent.exposure_risk > config.burn_exposure_threshold {
                    true
                } else if agent.exposure_risk >= config.exposure_check_floor {
                    check(rng, agent.exposure_risk)
                } else {
                    false
                };
                if exposed {
                    agent.loyalty_state = LoyaltyState::Compromised;
                    report.exposed.push(agent_id.clone());
                    tracing::info!("{} exposed (risk {:.3})", agent_id, agent.exposure_risk);
                    report.events.push(
                        DiplomaticEvent::new(
                            DiplomaticEventType::AgentExposed,
                            vec![self.owner.clone()],
                            turn,
                            format!("{} asset identified by counter-intelligence", self.owner),
                        )
                        .as_scandal(),
                    );
                }
            }

            if loyalty_turn && matches!(agent.loyalty_state, LoyaltyState::Loyal | LoyaltyState::Wavering) {
                let factors = agent.risk_factors(turn, config);
                if factors >= 2 {
                    let chance = (factors as f32 * config.loyalty_degrade_chance_per_factor)
                        .min(config.max_loyalty_degrade_chance);
                    if check(rng, chance) {
                        agent.loyalty_state = agent.loyalty_state.degrade();
                        report.degraded.push(agent_id.clone());
                        tracing::debug!("{} loyalty slipped to {:?}", agent_id, agent.loyalty_state);
                    }
                }
            }
        }

        let compromised: Vec<AgentId> = self
            .agents
            .values()
            .filter(|a| a.loyalty_state == LoyaltyState::Compromised)
            .map(|a| a.agent_id.clone())
            .collect();
        for agent_id in compromised {
            let reason = if report.exposed.contains(&agent_id)
                || self
                    .agents
                    .get(&agent_id)
                    .is_some_and(|a| a.exposure_risk > self.config.burn_exposure_threshold)
            {
                BurnReason::Exposure
            } else {
                BurnReason::Disloyalty
            };
            let outcome = if check(rng, self.config.turn_chance) {
                LoyaltyState::Turned
            } else {
                LoyaltyState::Burned
            };
            if let Some((record, event)) = self.retire(&agent_id, outcome, reason, turn) {
                report.events.push(event);
                report.retired.push(record);
            }
        }

        for agent in self.agents.values_mut() {
            agent.refresh_burn_risk(&self.config);
        }
        self.refresh_status();

        let rate = self.config.passive_intel_rate;
        report.passive_intelligence = self
            .agents
            .values()
            .filter(|a| a.loyalty_state == LoyaltyState::Loyal)
            .map(|a| a.access_level as f32 * a.effectiveness() * rate)
            .sum();
        self.status.passive_intelligence = report.passive_intelligence;
        report
    }

    /// Burns an agent outright, no roll.
    pub fn burn_agent(&mut self, agent_id: &AgentId, reason: BurnReason, turn: u64) -> CovertResult<BurnRecord> {
        let (record, event) = self
            .retire(agent_id, LoyaltyState::Burned, reason, turn)
            .ok_or_else(|| CovertError::UnknownAgent(agent_id.clone()))?;
        self.pending.push(event);
        self.refresh_status();
        Ok(record)
    }

    /// Removes the agent from its cell and the registry and archives it.
    fn retire(
        &mut self,
        agent_id: &AgentId,
        outcome: LoyaltyState,
        reason: BurnReason,
        turn: u64,
    ) -> Option<(BurnRecord, DiplomaticEvent)> {
        let mut agent = self.agents.remove(agent_id)?;
        agent.loyalty_state = outcome;

        for contact in &agent.contacts {
            if let Some(other) = self.agents.get_mut(contact) {
                other.contacts.remove(agent_id);
                if other.handler.as_ref() == Some(agent_id) {
                    other.handler = None;
                }
            }
        }
        let touched: Vec<CellId> = self
            .cells
            .values_mut()
            .filter_map(|cell| {
                if cell.agents.remove(agent_id) {
                    cell.burns += 1;
                    Some(cell.cell_id.clone())
                } else {
                    None
                }
            })
            .collect();
        for cell_id in &touched {
            self.refresh_cell(cell_id);
        }

        let (event_type, verb) = if outcome == LoyaltyState::Turned {
            (DiplomaticEventType::AgentTurned, "defected")
        } else {
            (DiplomaticEventType::AgentBurned, "was burned")
        };
        tracing::info!("{} ({}) {} ({:?})", agent.code_name, agent_id, verb, reason);
        let event = DiplomaticEvent::new(
            event_type,
            vec![self.owner.clone()],
            turn,
            format!("{} agent {} {}", self.owner, agent.code_name, verb),
        );

        let record = BurnRecord { agent, reason, turn };
        self.burned.push(record.clone());
        Some((record, event))
    }

    fn refresh_status(&mut self) {
        let passive = self.status.passive_intelligence;
        self.status = NetworkStatus::compute(self.agents.values(), self.burned.len());
        self.status.passive_intelligence = passive;
    }

    pub fn get_network_analysis(&self) -> NetworkAnalysis {
        let mut agents = AgentBreakdown {
            total: self.agents.len(),
            ..AgentBreakdown::default()
        };
        for agent in self.agents.values() {
            *agents.by_loyalty.entry(agent.loyalty_state).or_insert(0) += 1;
            *agents.by_type.entry(agent.agent_type).or_insert(0) += 1;
            agents.average_stress += agent.stress;
            agents.average_exposure += agent.exposure_risk;
            if agent.burn_risk > 0.5 {
                agents.high_burn_risk += 1;
            }
        }
        if !self.agents.is_empty() {
            agents.average_stress /= self.agents.len() as f32;
            agents.average_exposure /= self.agents.len() as f32;
        }
        agents.turned = self.burned.iter().filter(|r| r.defected()).count();
        agents.burned = self.burned.len() - agents.turned;

        NetworkAnalysis {
            status: self.status.clone(),
            agents,
            cells: CellBreakdown::compute(self.cells.values()),
        }
    }

    /// Events raised by recruitment, missions and manual burns since the last drain.
    pub fn drain_events(&mut self) -> Vec<DiplomaticEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<&SpyAgent> {
        self.agents.get(agent_id)
    }

    pub fn get_mut(&mut self, agent_id: &AgentId) -> Option<&mut SpyAgent> {
        self.agents.get_mut(agent_id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &SpyAgent> {
        self.agents.values()
    }

    pub fn cell(&self, cell_id: &CellId) -> Option<&NetworkCell> {
        self.cells.get(cell_id)
    }

    pub fn cells(&self) -> impl Iterator<Item = &NetworkCell> {
        self.cells.values()
    }

    pub fn burned(&self) -> &[BurnRecord] {
        &self.burned
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
