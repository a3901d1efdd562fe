//! Covert Engine
//!
//! One game session's clandestine layer. Components compute outcomes; the
//! engine applies heat, appends events to the log and carries out the side
//! effects they return.

use covert_events::{
    AgentId, AllianceId, ChannelId, DiplomaticEvent, DiplomaticEventType, FactionId, MediaCoverage,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::alliances::{AllianceManager, AllianceType, MemberRemoval, WithdrawalReason};
use crate::channels::{ChannelRegistry, MessageReceipt};
use crate::config::CovertConfig;
use crate::double_agents::DoubleAgentRegistry;
use crate::error::{CovertError, CovertResult};
use crate::ledger::{FactionLedger, ResourceKind};
use crate::logger::EventLog;
use crate::operations::{
    CovertOperationExecutor, OperationContext, OperationKind, OperationOutcome, OperationPayload,
    OperationRequest, OperationResult, SideEffect,
};
use crate::rng::{RandomSource, SimRng};
use crate::snapshot::EngineSnapshot;
use crate::spy_network::{
    BurnReason, BurnRecord, MissionOutcome, MissionSpec, NetworkAnalysis, RecruitmentMethod,
    RecruitmentProfile, SpyAgent, SpyNetwork,
};
use crate::turn::{AllianceChange, FactionState, TurnResult, TurnStage};

pub struct CovertEngine<R: RandomSource = SimRng> {
    config: CovertConfig,
    factions: BTreeSet<FactionId>,
    eliminated: BTreeSet<FactionId>,
    channels: ChannelRegistry,
    alliances: AllianceManager,
    executor: CovertOperationExecutor,
    double_agents: DoubleAgentRegistry,
    network: SpyNetwork,
    heat: f32,
    turn: u64,
    event_log: EventLog,
    rng: R,
}

impl CovertEngine<SimRng> {
    pub fn seeded(config: CovertConfig, network_owner: impl Into<FactionId>, seed: u64) -> Self {
        Self::new(config, network_owner, SimRng::seeded(seed))
    }
}

impl<R: RandomSource> CovertEngine<R> {
    /// The spy network belongs to `network_owner`, which is registered here.
    pub fn new(config: CovertConfig, network_owner: impl Into<FactionId>, rng: R) -> Self {
        let owner = network_owner.into();
        let mut factions = BTreeSet::new();
        factions.insert(owner.clone());
        Self {
            channels: ChannelRegistry::new(config.channels.clone()),
            alliances: AllianceManager::new(config.alliances.clone()),
            executor: CovertOperationExecutor::new(config.operations.clone()),
            double_agents: DoubleAgentRegistry::new(config.double_agents.clone()),
            network: SpyNetwork::new(owner, config.network.clone()),
            heat: config.heat.initial_heat.clamp(0.0, config.heat.max_heat),
            turn: 0,
            event_log: EventLog::new(),
            factions,
            eliminated: BTreeSet::new(),
            config,
            rng,
        }
    }

    /// Rebuilds an engine from a snapshot, continuing with `rng`.
    pub fn from_snapshot(snapshot: EngineSnapshot, rng: R) -> Self {
        Self {
            executor: CovertOperationExecutor::new(snapshot.config.operations.clone()),
            config: snapshot.config,
            factions: snapshot.factions,
            eliminated: snapshot.eliminated,
            channels: snapshot.channels,
            alliances: snapshot.alliances,
            double_agents: snapshot.double_agents,
            network: snapshot.network,
            heat: snapshot.heat,
            turn: snapshot.turn,
            event_log: snapshot.events,
            rng,
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            config: self.config.clone(),
            turn: self.turn,
            heat: self.heat,
            factions: self.factions.clone(),
            eliminated: self.eliminated.clone(),
            channels: self.channels.clone(),
            alliances: self.alliances.clone(),
            double_agents: self.double_agents.clone(),
            network: self.network.clone(),
            events: self.event_log.clone(),
        }
    }

    /// Returns false if the faction was already known.
    pub fn register_faction(&mut self, faction: impl Into<FactionId>) -> bool {
        let faction = faction.into();
        if self.eliminated.contains(&faction) {
            return false;
        }
        self.factions.insert(faction)
    }

    fn ensure_faction(&self, faction: &FactionId) -> CovertResult<()> {
        if self.factions.contains(faction) && !self.eliminated.contains(faction) {
            Ok(())
        } else {
            Err(CovertError::UnknownFaction(faction.clone()))
        }
    }

    /// Clamps heat to `[0, max_heat]`; returns the change actually applied.
    fn add_heat(&mut self, delta: f32) -> f32 {
        let before = self.heat;
        self.heat = (self.heat + delta).clamp(0.0, self.config.heat.max_heat);
        self.heat - before
    }

    fn record(&mut self, event: DiplomaticEvent) {
        let stored = self.event_log.append(event);
        tracing::debug!("{} {:?} turn {}", stored.event_id, stored.event_type, stored.turn);
    }

    fn record_network_events(&mut self) {
        for event in self.network.drain_events() {
            self.record(event);
        }
    }

    pub fn establish_channel(&mut self, faction_a: &FactionId, faction_b: &FactionId) -> CovertResult<ChannelId> {
        self.ensure_faction(faction_a)?;
        self.ensure_faction(faction_b)?;
        let established = self.channels.establish_channel(faction_a, faction_b, self.turn)?;
        self.add_heat(established.heat_delta);
        if let Some(event) = established.event {
            self.record(event);
        }
        Ok(established.channel_id)
    }

    pub fn send_message(
        &mut self,
        channel_id: &ChannelId,
        sender: &FactionId,
        content: impl Into<String>,
        operation: Option<OperationKind>,
    ) -> CovertResult<MessageReceipt> {
        self.ensure_faction(sender)?;
        let receipt = self.channels.send_message(
            channel_id,
            sender,
            content,
            operation,
            self.heat,
            self.turn,
            &mut self.rng,
        )?;
        self.add_heat(receipt.heat_delta);
        if let Some(event) = receipt.event.clone() {
            self.record(event);
        }
        Ok(receipt)
    }

    pub fn upgrade_encryption(&mut self, channel_id: &ChannelId, cost_paid: f32) -> CovertResult<bool> {
        self.channels.upgrade_encryption(channel_id, cost_paid)
    }

    pub fn abandon_channel(&mut self, channel_id: &ChannelId) -> CovertResult<()> {
        self.channels.abandon_channel(channel_id)
    }

    pub fn form_alliance(
        &mut self,
        members: &[FactionId],
        alliance_type: AllianceType,
        name: impl Into<String>,
        leader: Option<FactionId>,
    ) -> CovertResult<AllianceId> {
        for member in members {
            self.ensure_faction(member)?;
        }
        let formed = self
            .alliances
            .form_alliance(members, alliance_type, name, leader, &mut self.channels, self.turn)?;
        self.add_heat(formed.heat_delta);
        for event in formed.events {
            self.record(event);
        }
        Ok(formed.alliance_id)
    }

    /// Removes a member and retires the alliance if it dissolved.
    pub fn remove_member(
        &mut self,
        alliance_id: &AllianceId,
        faction: &FactionId,
        reason: WithdrawalReason,
    ) -> CovertResult<MemberRemoval> {
        let removal = self.alliances.remove_member(alliance_id, faction, reason, self.turn)?;
        self.record(removal.event.clone());
        if removal.dissolved {
            let event = self.alliances.retire(alliance_id, self.turn)?;
            self.record(event);
        }
        Ok(removal)
    }

    pub fn contribute(
        &mut self,
        alliance_id: &AllianceId,
        faction: &FactionId,
        kind: ResourceKind,
        amount: f32,
        ledger: &mut dyn FactionLedger,
    ) -> CovertResult<f32> {
        self.alliances.contribute(alliance_id, faction, kind, amount, ledger)
    }

    /// Runs a covert operation and applies its consequences.
    pub fn execute_covert_operation(
        &mut self,
        request: &OperationRequest,
        ledger: &mut dyn FactionLedger,
    ) -> CovertResult<OperationResult> {
        self.ensure_faction(&request.executor)?;
        if let Some(target) = &request.target {
            self.ensure_faction(target)?;
        }
        for ally in &request.allies {
            self.ensure_faction(ally)?;
        }

        let ctx = OperationContext {
            alliances: &self.alliances,
            channels: &self.channels,
            ledger: &*ledger,
            heat: self.heat,
        };
        let mut result = self.executor.execute(request, &ctx, &mut self.rng);
        if result.is_rejected() {
            return Ok(result);
        }

        self.apply_side_effects(&mut result, ledger);
        self.add_heat(result.heat_delta);
        if !request.allies.is_empty() {
            self.alliances.record_joint_operation(
                &request.executor,
                &request.allies,
                request.kind(),
                result.success,
                self.turn,
            );
        }

        let mut factions = vec![request.executor.clone()];
        for faction in request.target.iter().chain(&request.allies) {
            if !factions.contains(faction) {
                factions.push(faction.clone());
            }
        }
        let event = if result.discovered {
            DiplomaticEvent::new(DiplomaticEventType::OperationExposed, factions, self.turn, result.narrative.clone())
                .with_heat(result.heat_delta)
                .as_scandal()
        } else {
            DiplomaticEvent::new(DiplomaticEventType::CovertOperation, factions, self.turn, result.narrative.clone())
                .with_heat(result.heat_delta)
                .with_coverage(MediaCoverage::None)
        };
        self.record(event);

        tracing::info!(
            "{} by {}: success={} heat now {:.1}",
            request.kind(),
            request.executor,
            result.success,
            self.heat
        );
        Ok(result)
    }

    /// Entry point for collaborators naming an operation by string.
    ///
    /// Without a payload the kind's default parameters are used; a payload of
    /// another kind is an error.
    pub fn execute_named_operation(
        &mut self,
        name: &str,
        executor: &FactionId,
        target: Option<&FactionId>,
        allies: &[FactionId],
        payload: Option<OperationPayload>,
        ledger: &mut dyn FactionLedger,
    ) -> CovertResult<OperationResult> {
        let Some(kind) = OperationKind::from_name(name) else {
            tracing::warn!("Unsupported operation '{}' requested by {}", name, executor);
            return Ok(OperationResult::unsupported(name, executor.clone(), target.cloned()));
        };
        let payload = match payload {
            Some(payload) if payload.kind() != kind => {
                return Err(CovertError::PayloadMismatch {
                    name: name.to_string(),
                    payload: payload.kind(),
                });
            }
            Some(payload) => payload,
            None => OperationPayload::default_for(kind),
        };
        let mut request = OperationRequest::new(executor.clone(), payload).with_allies(allies.to_vec());
        request.target = target.cloned();
        self.execute_covert_operation(&request, ledger)
    }

    fn apply_side_effects(&mut self, result: &mut OperationResult, ledger: &mut dyn FactionLedger) {
        for effect in result.side_effects.clone() {
            match effect {
                SideEffect::DeployDoubleAgent { primary, secondary, .. } => {
                    match self.double_agents.deploy(&primary, &secondary, self.turn) {
                        Ok(deployed) => {
                            result.deployed_agent = Some(deployed.agent_id);
                            self.record(deployed.event);
                        }
                        Err(e) => {
                            tracing::warn!("Double agent deployment failed: {}", e);
                            self.fail_operation(result, &e.to_string());
                        }
                    }
                }
                SideEffect::TransferResources {
                    from,
                    to,
                    resource,
                    sent,
                    received,
                } => {
                    if let Err(e) = ledger.transfer(&from, &to, resource, sent, received) {
                        tracing::warn!("Transfer from {} to {} failed: {}", from, to, e);
                        self.fail_operation(result, &e.to_string());
                    }
                }
                SideEffect::BoostChannelTrust { channel_id, amount } => {
                    if let Err(e) = self.channels.adjust_trust(&channel_id, amount) {
                        tracing::warn!("Trust boost failed: {}", e);
                    }
                }
                // Consumed by the conflict and narrative layers
                SideEffect::FrameFaction { .. } | SideEffect::SabotageTarget { .. } | SideEffect::PropagandaPush { .. } => {}
            }
        }
    }

    /// Downgrades a rolled success whose side effect could not be carried out.
    fn fail_operation(&self, result: &mut OperationResult, reason: &str) {
        result.success = false;
        result.outcome = OperationOutcome::Failed;
        if let Some(kind) = result.kind {
            result.heat_delta = self.executor.failure_heat(kind);
        }
        result.narrative = format!("{} ({})", result.narrative.replace("succeeded", "failed"), reason);
    }

    pub fn record_double_agent_mission(&mut self, agent_id: &AgentId, succeeded: bool) -> CovertResult<f32> {
        self.double_agents.record_mission(agent_id, succeeded)
    }

    pub fn turn_double_agent(&mut self, agent_id: &AgentId) -> CovertResult<()> {
        let event = self.double_agents.mark_turned(agent_id, self.turn)?;
        self.record(event);
        Ok(())
    }

    pub fn recruit_agent(
        &mut self,
        profile: &RecruitmentProfile,
        method: RecruitmentMethod,
        recruiter: Option<&AgentId>,
    ) -> CovertResult<Option<SpyAgent>> {
        let recruitment = self
            .network
            .recruit_agent(profile, method, recruiter, self.turn, &mut self.rng)?;
        self.record_network_events();
        Ok(recruitment.agent)
    }

    pub fn assign_mission(&mut self, agent_id: &AgentId, mission: &MissionSpec) -> CovertResult<MissionOutcome> {
        let outcome = self
            .network
            .assign_mission(agent_id, mission, self.turn, &mut self.rng)?;
        self.record_network_events();
        Ok(outcome)
    }

    pub fn burn_agent(&mut self, agent_id: &AgentId, reason: BurnReason) -> CovertResult<BurnRecord> {
        let record = self.network.burn_agent(agent_id, reason, self.turn)?;
        self.record_network_events();
        Ok(record)
    }

    /// Runs the per-turn pass. Failures are collected, never fatal.
    pub fn process_turn(&mut self, turn: u64, faction_states: &[FactionState]) -> TurnResult {
        self.turn = turn;
        let heat_before = self.heat;
        let log_mark = self.event_log.len();
        let mut result = TurnResult::new(turn);

        let mut counter_intelligence = BTreeMap::new();
        for state in faction_states {
            if !self.factions.contains(&state.faction_id) {
                result.fail(TurnStage::Reconcile, &state.faction_id, "unknown faction");
                continue;
            }
            counter_intelligence.insert(state.faction_id.clone(), state.counter_intelligence);
            if state.eliminated && !self.eliminated.contains(&state.faction_id) {
                self.eliminate_faction(&state.faction_id, &mut result);
            }
        }

        for discovery in self.alliances.discovery_pass(turn, &mut self.rng) {
            self.add_heat(discovery.heat_delta);
            result.alliance_changes.push(AllianceChange::Discovered {
                alliance_id: discovery.alliance_id,
                chance: discovery.chance,
            });
            self.record(discovery.event);
        }

        for exposure in self
            .double_agents
            .exposure_pass(turn, &counter_intelligence, &mut self.rng)
        {
            self.add_heat(exposure.heat_delta);
            result.exposures.push(exposure.agent_id);
            self.record(exposure.event);
        }

        self.record_network_events();
        let report = self.network.process_turn(turn, &mut self.rng);
        result.exposures.extend(report.exposed);
        result
            .burned
            .extend(report.retired.iter().map(|r| r.agent.agent_id.clone()));
        result.passive_intelligence = report.passive_intelligence;
        for event in report.events {
            self.record(event);
        }

        self.channels.degrade_encryption();
        self.channels.drift_idle_trust(turn);

        self.add_heat(-self.config.heat.cooling_per_turn);

        result.events = self.event_log.events_since(log_mark).to_vec();
        result.heat_after = self.heat;
        result.heat_delta = self.heat - heat_before;
        tracing::info!(
            "Turn {}: {} events, heat {:.1} ({:+.1}), {} failures",
            turn,
            result.events.len(),
            self.heat,
            result.heat_delta,
            result.failures.len()
        );
        result
    }

    /// Pulls an eliminated faction out of alliances, channels and double-agent tracking.
    fn eliminate_faction(&mut self, faction: &FactionId, result: &mut TurnResult) {
        let turn = self.turn;
        for alliance_id in self.alliances.alliance_ids_of(faction) {
            let removal = match self
                .alliances
                .remove_member(&alliance_id, faction, WithdrawalReason::Eliminated, turn)
            {
                Ok(removal) => removal,
                Err(e) => {
                    result.fail(TurnStage::Alliances, &alliance_id, e);
                    continue;
                }
            };
            result.alliance_changes.push(AllianceChange::MemberRemoved {
                alliance_id: alliance_id.clone(),
                faction: faction.clone(),
                reason: WithdrawalReason::Eliminated,
            });
            result.betrayals.push(removal.record);
            self.record(removal.event);

            if removal.dissolved {
                match self.alliances.retire(&alliance_id, turn) {
                    Ok(event) => {
                        result.alliance_changes.push(AllianceChange::Dissolved {
                            alliance_id: alliance_id.clone(),
                        });
                        self.record(event);
                    }
                    Err(e) => result.fail(TurnStage::Alliances, &alliance_id, e),
                }
            }
        }

        let channel_ids: Vec<ChannelId> = self
            .channels
            .channels_involving(faction)
            .map(|c| c.channel_id.clone())
            .collect();
        for channel_id in channel_ids {
            if let Err(e) = self.channels.abandon_channel(&channel_id) {
                result.fail(TurnStage::Channels, &channel_id, e);
            }
        }

        let retired = self.double_agents.retire_for_faction(faction, turn);
        tracing::info!("{} eliminated; {} double agents recalled", faction, retired.len());
        self.eliminated.insert(faction.clone());
    }

    pub fn get_network_analysis(&self) -> NetworkAnalysis {
        self.network.get_network_analysis()
    }

    pub fn config(&self) -> &CovertConfig {
        &self.config
    }

    pub fn heat(&self) -> f32 {
        self.heat
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn factions(&self) -> impl Iterator<Item = &FactionId> {
        self.factions.iter().filter(move |f| !self.eliminated.contains(*f))
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn alliances(&self) -> &AllianceManager {
        &self.alliances
    }

    pub fn executor(&self) -> &CovertOperationExecutor {
        &self.executor
    }

    pub fn double_agents(&self) -> &DoubleAgentRegistry {
        &self.double_agents
    }

    pub fn network(&self) -> &SpyNetwork {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut SpyNetwork {
        &mut self.network
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{FactionLedgers, FactionResources, LedgerError};
    use crate::rng::ReplayRolls;
    use crate::spy_network::AgentType;

    fn engine(rolls: Vec<f32>) -> CovertEngine<ReplayRolls> {
        let mut engine = CovertEngine::new(CovertConfig::default(), "red_hand", ReplayRolls::new(rolls));
        engine.register_faction("dockers");
        engine.register_faction("students");
        engine
    }

    fn ledgers() -> FactionLedgers {
        let mut ledgers = FactionLedgers::new();
        ledgers.open_account("red_hand", FactionResources::new(100.0, 10.0, 5.0));
        ledgers.open_account("dockers", FactionResources::new(10.0, 0.0, 0.0));
        ledgers
    }

    #[test]
    fn test_unknown_faction_leaves_state_untouched() {
        let mut engine = engine(vec![]);
        let err = engine
            .establish_channel(&"red_hand".into(), &"ghosts".into())
            .unwrap_err();
        assert!(matches!(err, CovertError::UnknownFaction(_)));
        assert!(engine.channels().is_empty());
        assert!(engine.event_log().is_empty());
        assert_eq!(engine.heat(), 0.0);
    }

    #[test]
    fn test_leak_raises_heat_and_logs() {
        let mut engine = engine(vec![0.0]);
        let channel = engine
            .establish_channel(&"red_hand".into(), &"dockers".into())
            .unwrap();
        let receipt = engine
            .send_message(&channel, &"dockers".into(), "the shipment moves tonight", None)
            .unwrap();
        assert!(!receipt.delivered());
        assert_eq!(engine.heat(), 1.0 + 3.0);
        let types: Vec<_> = engine.event_log().events().iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![DiplomaticEventType::ChannelEstablished, DiplomaticEventType::MessageLeaked]
        );
    }

    #[test]
    fn test_unsupported_operation_changes_nothing() {
        let mut engine = engine(vec![]);
        let mut ledger = ledgers();
        let result = engine
            .execute_named_operation("assassination", &"red_hand".into(), Some(&"dockers".into()), &[], None, &mut ledger)
            .unwrap();
        assert!(!result.success);
        assert!(matches!(result.outcome, OperationOutcome::Unsupported { .. }));
        assert_eq!(ledger.balance(&"red_hand".into(), ResourceKind::Money), Some(100.0));
        assert!(engine.event_log().is_empty());
    }

    #[test]
    fn test_covert_support_moves_discounted_funds() {
        let mut engine = engine(vec![0.0]);
        let mut ledger = ledgers();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::CovertSupport { resource: ResourceKind::Money, amount: 20.0 },
        )
        .with_target("dockers");
        let result = engine.execute_covert_operation(&request, &mut ledger).unwrap();
        assert!(result.success);
        assert_eq!(ledger.balance(&"red_hand".into(), ResourceKind::Money), Some(80.0));
        let received = ledger.balance(&"dockers".into(), ResourceKind::Money).unwrap() - 10.0;
        assert!((received - 14.0).abs() < 1e-4);
        assert_eq!(engine.heat(), 4.0);
    }

    #[test]
    fn test_double_agent_operation_deploys_agent() {
        let mut engine = engine(vec![0.0]);
        let mut ledger = ledgers();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::DoubleAgentDeployment { cover_role: "union clerk".into() },
        )
        .with_target("dockers");
        let result = engine.execute_covert_operation(&request, &mut ledger).unwrap();
        let agent_id = result.deployed_agent.unwrap();
        let agent = engine.double_agents().get(&agent_id).unwrap();
        assert_eq!(agent.primary_faction, FactionId::from("red_hand"));
        assert!(agent.secondary_factions.contains(&FactionId::from("dockers")));
    }

    #[test]
    fn test_joint_operation_recorded_in_alliance() {
        let mut engine = engine(vec![0.0]);
        let mut ledger = ledgers();
        let alliance = engine
            .form_alliance(
                &["red_hand".into(), "dockers".into()],
                AllianceType::Public,
                "Harbor Front",
                None,
            )
            .unwrap();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::JointSabotage { target_asset: "customs house".into() },
        )
        .with_target("students")
        .with_allies(vec!["dockers".into()]);
        engine.execute_covert_operation(&request, &mut ledger).unwrap();
        let alliance = engine.alliances().get(&alliance).unwrap();
        assert_eq!(alliance.joint_operations.len(), 1);
        assert!(alliance.joint_operations[0].success);
    }

    #[test]
    fn test_eliminated_faction_dissolves_alliance() {
        let mut engine = engine(vec![]);
        let alliance = engine
            .form_alliance(
                &["red_hand".into(), "dockers".into()],
                AllianceType::Secret,
                "Night Pact",
                None,
            )
            .unwrap();
        let result = engine.process_turn(
            1,
            &[FactionState::active("red_hand"), FactionState::eliminated("dockers")],
        );
        assert!(engine.alliances().get(&alliance).is_none());
        assert_eq!(engine.alliances().retired().len(), 1);
        assert_eq!(result.betrayals.len(), 1);
        assert!(result
            .alliance_changes
            .contains(&AllianceChange::Dissolved { alliance_id: alliance }));
        assert!(engine
            .channels()
            .find_channel(&"red_hand".into(), &"dockers".into())
            .is_none());
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_unknown_faction_state_is_collected_failure() {
        let mut engine = engine(vec![]);
        let result = engine.process_turn(1, &[FactionState::active("ghosts")]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].stage, TurnStage::Reconcile);
    }

    #[test]
    fn test_heat_cools_and_stays_bounded() {
        let mut engine = engine(vec![]);
        engine
            .establish_channel(&"red_hand".into(), &"dockers".into())
            .unwrap();
        let result = engine.process_turn(1, &[]);
        assert_eq!(engine.heat(), 0.0);
        assert_eq!(result.heat_delta, -1.0);
        let result = engine.process_turn(2, &[]);
        assert_eq!(result.heat_delta, 0.0);
    }

    /// Reports balances but refuses every debit.
    struct FrozenLedger(FactionLedgers);

    impl FactionLedger for FrozenLedger {
        fn balance(&self, faction: &FactionId, kind: ResourceKind) -> Option<f32> {
            self.0.balance(faction, kind)
        }
        fn debit(&mut self, faction: &FactionId, kind: ResourceKind, amount: f32) -> Result<(), LedgerError> {
            Err(LedgerError::Insufficient {
                faction: faction.clone(),
                kind,
                required: amount,
                available: 0.0,
            })
        }
        fn credit(&mut self, faction: &FactionId, kind: ResourceKind, amount: f32) -> Result<(), LedgerError> {
            self.0.credit(faction, kind, amount)
        }
    }

    #[test]
    fn test_refused_transfer_fails_operation() {
        let mut engine = engine(vec![0.0]);
        let mut ledger = FrozenLedger(ledgers());
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::CovertSupport { resource: ResourceKind::Money, amount: 20.0 },
        )
        .with_target("dockers");
        let result = engine.execute_covert_operation(&request, &mut ledger).unwrap();
        assert!(!result.success);
        assert_eq!(result.outcome, OperationOutcome::Failed);
        let failure_heat = engine.executor().failure_heat(OperationKind::CovertSupport);
        assert_eq!(result.heat_delta, failure_heat);
        assert_eq!(engine.heat(), failure_heat);
        assert_eq!(ledger.balance(&"red_hand".into(), ResourceKind::Money), Some(100.0));
        assert_eq!(ledger.balance(&"dockers".into(), ResourceKind::Money), Some(10.0));
        assert_eq!(engine.event_log().events()[0].event_type, DiplomaticEventType::CovertOperation);
    }

    #[test]
    fn test_named_operation_uses_given_payload() {
        let mut engine = engine(vec![0.0]);
        let mut ledger = ledgers();
        let result = engine
            .execute_named_operation(
                "covert_support",
                &"red_hand".into(),
                Some(&"dockers".into()),
                &[],
                Some(OperationPayload::CovertSupport { resource: ResourceKind::Money, amount: 20.0 }),
                &mut ledger,
            )
            .unwrap();
        assert!(result.success);
        assert_eq!(ledger.balance(&"red_hand".into(), ResourceKind::Money), Some(80.0));

        // Default parameters carry no amount
        let result = engine
            .execute_named_operation("covert_support", &"red_hand".into(), Some(&"dockers".into()), &[], None, &mut ledger)
            .unwrap();
        assert!(result.is_rejected());
        assert_eq!(engine.rng_mut().consumed(), 1);
    }

    #[test]
    fn test_named_operation_rejects_mismatched_payload() {
        let mut engine = engine(vec![]);
        let mut ledger = ledgers();
        let err = engine
            .execute_named_operation(
                "covert_support",
                &"red_hand".into(),
                Some(&"dockers".into()),
                &[],
                Some(OperationPayload::JointSabotage { target_asset: "rail depot".into() }),
                &mut ledger,
            )
            .unwrap_err();
        assert!(matches!(err, CovertError::PayloadMismatch { payload: OperationKind::JointSabotage, .. }));
        assert!(engine.event_log().is_empty());
        assert_eq!(engine.rng_mut().consumed(), 0);
    }

    #[test]
    fn test_zero_loyalty_interval_turns_run() {
        let mut config = CovertConfig::default();
        config.network.loyalty_check_interval = 0;
        let mut engine = CovertEngine::new(config, "red_hand", ReplayRolls::new([0.0]).with_fallback(0.0));
        let profile = RecruitmentProfile::new("Gull", AgentType::Informant, "harbor");
        engine
            .recruit_agent(&profile, RecruitmentMethod::Blackmail, None)
            .unwrap()
            .unwrap();
        for turn in 0..=10 {
            let result = engine.process_turn(turn, &[]);
            assert!(result.failures.is_empty());
            assert!(result.burned.is_empty());
        }
        assert_eq!(engine.network().len(), 1);
    }

    #[test]
    fn test_turn_with_discovery_exposure_and_network_burn() {
        // deploy, recruit, alliance discovery, double-agent exposure; fallback burns
        let mut engine = engine(vec![0.0, 0.0, 0.0, 0.0]);
        let mut ledger = ledgers();
        let alliance = engine
            .form_alliance(
                &["red_hand".into(), "dockers".into()],
                AllianceType::Secret,
                "Night Pact",
                None,
            )
            .unwrap();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::DoubleAgentDeployment { cover_role: "student editor".into() },
        )
        .with_target("students");
        let double = engine
            .execute_covert_operation(&request, &mut ledger)
            .unwrap()
            .deployed_agent
            .unwrap();
        engine.record_double_agent_mission(&double, false).unwrap();

        let profile = RecruitmentProfile::new("Gull", AgentType::Informant, "harbor");
        let spy = engine
            .recruit_agent(&profile, RecruitmentMethod::Blackmail, None)
            .unwrap()
            .unwrap()
            .agent_id;
        engine.network_mut().get_mut(&spy).unwrap().exposure_risk = 0.95;

        let heat_before = engine.heat();
        let result = engine.process_turn(1, &[]);

        let types: Vec<_> = result.events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                DiplomaticEventType::AllianceDiscovered,
                DiplomaticEventType::DoubleAgentExposed,
                DiplomaticEventType::AgentExposed,
                DiplomaticEventType::AgentBurned,
            ]
        );
        assert!(matches!(
            &result.alliance_changes[..],
            [AllianceChange::Discovered { alliance_id, .. }] if *alliance_id == alliance
        ));
        assert_eq!(result.exposures, vec![double, spy.clone()]);
        assert_eq!(result.burned, vec![spy]);
        assert_eq!(engine.alliances().get(&alliance).unwrap().alliance_type, AllianceType::Public);

        let heat = &engine.config().heat;
        let expected = (15.0 + 12.0 - heat.cooling_per_turn).min(heat.max_heat - heat_before);
        assert!((result.heat_delta - expected).abs() < 1e-4);
        assert_eq!(engine.rng_mut().remaining(), 0);
    }
}
