//! Alliance Manager
//!
//! Multi-faction alliances: formation, membership, stability, joint-operation
//! history and the per-turn discovery pass for secret alliances.

use covert_events::{
    generate_alliance_id, AllianceId, ChannelId, DiplomaticEvent, DiplomaticEventType, FactionId,
    MediaCoverage,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::channels::ChannelRegistry;
use crate::config::AllianceConfig;
use crate::error::{CovertError, CovertResult};
use crate::ledger::{FactionLedger, ResourceKind};
use crate::operations::OperationKind;
use crate::rng::{check, RandomSource};

/// How an alliance is held together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllianceType {
    /// Openly declared
    Public,
    /// Hidden from the public and the government
    Secret,
    /// Held together by pressure on the weaker members
    Coerced,
}

/// Why a member left an alliance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalReason {
    Betrayal,
    Withdrawal,
    Expelled,
    Eliminated,
}

impl fmt::Display for WithdrawalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            WithdrawalReason::Betrayal => "betrayal",
            WithdrawalReason::Withdrawal => "withdrawal",
            WithdrawalReason::Expelled => "expelled",
            WithdrawalReason::Eliminated => "eliminated",
        };
        f.write_str(text)
    }
}

/// One joint operation carried out by alliance members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointOperationRecord {
    pub turn: u64,
    pub kind: OperationKind,
    pub participants: Vec<FactionId>,
    pub success: bool,
}

/// A member leaving an alliance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetrayalRecord {
    pub alliance_id: AllianceId,
    pub faction: FactionId,
    pub reason: WithdrawalReason,
    pub turn: u64,
    pub stability_after: f32,
}

/// Channel linking one member pair of a secret alliance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairChannel {
    pub faction_a: FactionId,
    pub faction_b: FactionId,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionAlliance {
    pub alliance_id: AllianceId,
    pub name: String,
    pub alliance_type: AllianceType,
    pub members: BTreeSet<FactionId>,
    pub leader: Option<FactionId>,
    pub stability: f32,
    pub shared_resources: BTreeMap<ResourceKind, f32>,
    pub joint_operations: Vec<JointOperationRecord>,
    pub channels: Vec<PairChannel>,
    pub betrayal_history: Vec<BetrayalRecord>,
    pub formed_turn: u64,
    /// Turn a secret alliance was exposed
    pub discovered_turn: Option<u64>,
}

impl FactionAlliance {
    pub fn is_member(&self, faction: &FactionId) -> bool {
        self.members.contains(faction)
    }

    /// Fewer than two members left
    pub fn is_dissolved(&self) -> bool {
        self.members.len() < 2
    }

    /// Joint operations fewer than `window` turns old.
    pub fn recent_operations(&self, turn: u64, window: u64) -> usize {
        self.joint_operations
            .iter()
            .filter(|op| turn.saturating_sub(op.turn) < window)
            .count()
    }

    fn adjust_stability(&mut self, delta: f32) {
        self.stability = (self.stability + delta).clamp(0.0, 1.0);
    }
}

/// Result of forming an alliance
#[derive(Debug, Clone)]
pub struct AllianceFormed {
    pub alliance_id: AllianceId,
    pub heat_delta: f32,
    /// Channel events first, formation event last
    pub events: Vec<DiplomaticEvent>,
}

/// Result of a member leaving
#[derive(Debug, Clone)]
pub struct MemberRemoval {
    pub record: BetrayalRecord,
    /// The alliance fell below two members and must be retired
    pub dissolved: bool,
    pub event: DiplomaticEvent,
}

/// A secret alliance exposed by the discovery pass
#[derive(Debug, Clone)]
pub struct AllianceDiscovery {
    pub alliance_id: AllianceId,
    pub chance: f32,
    pub heat_delta: f32,
    pub event: DiplomaticEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllianceManager {
    config: AllianceConfig,
    alliances: BTreeMap<AllianceId, FactionAlliance>,
    retired: Vec<FactionAlliance>,
    next_alliance: u64,
}

impl AllianceManager {
    pub fn new(config: AllianceConfig) -> Self {
        Self {
            config,
            alliances: BTreeMap::new(),
            retired: Vec::new(),
            next_alliance: 1,
        }
    }

    pub fn config(&self) -> &AllianceConfig {
        &self.config
    }

    /// Forms an alliance. Secret alliances get a channel for every member pair.
    pub fn form_alliance(
        &mut self,
        members: &[FactionId],
        alliance_type: AllianceType,
        name: impl Into<String>,
        leader: Option<FactionId>,
        channels: &mut ChannelRegistry,
        turn: u64,
    ) -> CovertResult<AllianceFormed> {
        let member_set: BTreeSet<FactionId> = members.iter().cloned().collect();
        if member_set.len() < 2 {
            return Err(CovertError::InvalidAlliance(
                "an alliance needs at least two distinct members".to_string(),
            ));
        }
        if let Some(leader) = &leader {
            if !member_set.contains(leader) {
                return Err(CovertError::InvalidAlliance(format!(
                    "leader {} is not a member",
                    leader
                )));
            }
        }

        let alliance_id = generate_alliance_id(self.next_alliance);
        self.next_alliance += 1;

        let mut events = Vec::new();
        let mut heat = self.config.formation_heat(alliance_type);
        let mut pair_channels = Vec::new();

        if alliance_type == AllianceType::Secret {
            let ordered: Vec<&FactionId> = member_set.iter().collect();
            for (i, a) in ordered.iter().enumerate() {
                for b in &ordered[i + 1..] {
                    let established = channels.establish_channel(a, b, turn)?;
                    heat += established.heat_delta;
                    events.extend(established.event);
                    pair_channels.push(PairChannel {
                        faction_a: (*a).clone(),
                        faction_b: (*b).clone(),
                        channel_id: established.channel_id,
                    });
                }
            }
        }

        let name = name.into();
        let coverage = match alliance_type {
            AllianceType::Secret => MediaCoverage::None,
            AllianceType::Public | AllianceType::Coerced => MediaCoverage::Regional,
        };
        events.push(
            DiplomaticEvent::new(
                DiplomaticEventType::AllianceFormed,
                member_set.iter().cloned().collect(),
                turn,
                format!("{:?} alliance '{}' formed", alliance_type, name),
            )
            .with_heat(self.config.formation_heat(alliance_type))
            .with_coverage(coverage),
        );

        tracing::info!(
            "Alliance {} ({:?}) formed with {} members",
            alliance_id,
            alliance_type,
            member_set.len()
        );

        let alliance = FactionAlliance {
            alliance_id: alliance_id.clone(),
            name,
            alliance_type,
            members: member_set,
            leader,
            stability: self.config.starting_stability(alliance_type).clamp(0.0, 1.0),
            shared_resources: BTreeMap::new(),
            joint_operations: Vec::new(),
            channels: pair_channels,
            betrayal_history: Vec::new(),
            formed_turn: turn,
            discovered_turn: None,
        };
        self.alliances.insert(alliance_id.clone(), alliance);

        Ok(AllianceFormed {
            alliance_id,
            heat_delta: heat,
            events,
        })
    }

    /// Chance the alliance is exposed this turn; zero unless secret.
    pub fn calculate_discovery_chance(&self, alliance: &FactionAlliance, turn: u64) -> f32 {
        if alliance.alliance_type != AllianceType::Secret {
            return 0.0;
        }
        let extra_members = alliance.members.len().saturating_sub(2) as f32;
        let recent = alliance.recent_operations(turn, self.config.recent_window_turns) as f32;

        let chance = self.config.base_discovery_chance
            + extra_members * self.config.member_discovery_weight
            + (1.0 - alliance.stability) * self.config.instability_discovery_weight
            + recent * self.config.recent_operation_discovery_weight;
        chance.clamp(0.0, 1.0)
    }

    pub fn operational_bonus(&self, alliance: &FactionAlliance) -> f32 {
        self.config.base_operational_bonus
            * self.config.bonus_multiplier(alliance.alliance_type)
            * alliance.stability
    }

    /// Sum of operational bonuses over every alliance the faction belongs to.
    pub fn total_operational_bonus(&self, faction: &FactionId) -> f32 {
        self.alliances_of(faction).map(|a| self.operational_bonus(a)).sum()
    }

    /// Removes a member; the caller retires the alliance when `dissolved` is set.
    pub fn remove_member(
        &mut self,
        alliance_id: &AllianceId,
        faction: &FactionId,
        reason: WithdrawalReason,
        turn: u64,
    ) -> CovertResult<MemberRemoval> {
        let penalty = self.config.member_loss_stability_penalty;
        let alliance = self
            .alliances
            .get_mut(alliance_id)
            .ok_or_else(|| CovertError::UnknownAlliance(alliance_id.clone()))?;
        if !alliance.members.remove(faction) {
            return Err(CovertError::NotAllianceMember {
                alliance: alliance_id.clone(),
                faction: faction.clone(),
            });
        }
        if alliance.leader.as_ref() == Some(faction) {
            alliance.leader = None;
        }
        alliance.adjust_stability(-penalty);

        let record = BetrayalRecord {
            alliance_id: alliance_id.clone(),
            faction: faction.clone(),
            reason,
            turn,
            stability_after: alliance.stability,
        };
        alliance.betrayal_history.push(record.clone());

        let mut factions = vec![faction.clone()];
        factions.extend(alliance.members.iter().cloned());
        let coverage = if alliance.alliance_type == AllianceType::Secret {
            MediaCoverage::None
        } else {
            MediaCoverage::Regional
        };
        let event = DiplomaticEvent::new(
            DiplomaticEventType::MemberWithdrew,
            factions,
            turn,
            format!("{} left alliance {} ({})", faction, alliance_id, reason),
        )
        .with_coverage(coverage);

        tracing::info!("{} left alliance {}: {}", faction, alliance_id, reason);

        Ok(MemberRemoval {
            record,
            dissolved: alliance.is_dissolved(),
            event,
        })
    }

    /// Moves a dissolved alliance into the archive.
    pub fn retire(&mut self, alliance_id: &AllianceId, turn: u64) -> CovertResult<DiplomaticEvent> {
        let alliance = self
            .alliances
            .remove(alliance_id)
            .ok_or_else(|| CovertError::UnknownAlliance(alliance_id.clone()))?;
        let event = DiplomaticEvent::new(
            DiplomaticEventType::AllianceDissolved,
            alliance.members.iter().cloned().collect(),
            turn,
            format!("alliance '{}' dissolved", alliance.name),
        );
        tracing::info!("Alliance {} retired", alliance_id);
        self.retired.push(alliance);
        Ok(event)
    }

    /// Rolls once per active secret alliance, in id order.
    pub fn discovery_pass(&mut self, turn: u64, rng: &mut dyn RandomSource) -> Vec<AllianceDiscovery> {
        let mut discoveries = Vec::new();
        let secret_ids: Vec<AllianceId> = self
            .alliances
            .values()
            .filter(|a| a.alliance_type == AllianceType::Secret && !a.is_dissolved())
            .map(|a| a.alliance_id.clone())
            .collect();

        for alliance_id in secret_ids {
            let Some(alliance) = self.alliances.get(&alliance_id) else {
                continue;
            };
            let chance = self.calculate_discovery_chance(alliance, turn);
            if !check(rng, chance) {
                continue;
            }

            let heat = self.config.discovery_heat;
            let penalty = self.config.discovery_stability_penalty;
            let Some(alliance) = self.alliances.get_mut(&alliance_id) else {
                continue;
            };
            alliance.alliance_type = AllianceType::Public;
            alliance.discovered_turn = Some(turn);
            alliance.adjust_stability(-penalty);

            tracing::info!("Secret alliance {} discovered (chance {:.3})", alliance_id, chance);

            let event = DiplomaticEvent::new(
                DiplomaticEventType::AllianceDiscovered,
                alliance.members.iter().cloned().collect(),
                turn,
                format!("secret alliance '{}' exposed", alliance.name),
            )
            .with_heat(heat)
            .as_scandal();

            discoveries.push(AllianceDiscovery {
                alliance_id,
                chance,
                heat_delta: heat,
                event,
            });
        }
        discoveries
    }

    /// Records a joint operation in every alliance holding the executor and an ally.
    pub fn record_joint_operation(
        &mut self,
        executor: &FactionId,
        allies: &[FactionId],
        kind: OperationKind,
        success: bool,
        turn: u64,
    ) -> Vec<AllianceId> {
        let delta = if success {
            self.config.joint_success_stability_gain
        } else {
            -self.config.joint_failure_stability_penalty
        };
        let mut affected = Vec::new();
        for alliance in self.alliances.values_mut() {
            if !alliance.is_member(executor) || !allies.iter().any(|f| alliance.is_member(f)) {
                continue;
            }
            let mut participants = vec![executor.clone()];
            participants.extend(allies.iter().filter(|f| alliance.is_member(f)).cloned());
            alliance.joint_operations.push(JointOperationRecord {
                turn,
                kind,
                participants,
                success,
            });
            alliance.adjust_stability(delta);
            affected.push(alliance.alliance_id.clone());
        }
        affected
    }

    /// Moves resources from a member into the alliance's shared pool.
    pub fn contribute(
        &mut self,
        alliance_id: &AllianceId,
        faction: &FactionId,
        kind: ResourceKind,
        amount: f32,
        ledger: &mut dyn FactionLedger,
    ) -> CovertResult<f32> {
        let alliance = self
            .alliances
            .get_mut(alliance_id)
            .ok_or_else(|| CovertError::UnknownAlliance(alliance_id.clone()))?;
        if !alliance.is_member(faction) {
            return Err(CovertError::NotAllianceMember {
                alliance: alliance_id.clone(),
                faction: faction.clone(),
            });
        }
        ledger.debit(faction, kind, amount)?;
        let pool = alliance.shared_resources.entry(kind).or_insert(0.0);
        *pool += amount;
        Ok(*pool)
    }

    pub fn get(&self, alliance_id: &AllianceId) -> Option<&FactionAlliance> {
        self.alliances.get(alliance_id)
    }

    pub fn alliances_of<'a>(&'a self, faction: &'a FactionId) -> impl Iterator<Item = &'a FactionAlliance> + 'a {
        self.alliances.values().filter(move |a| a.is_member(faction))
    }

    /// Ids of alliances the faction belongs to, in id order.
    pub fn alliance_ids_of(&self, faction: &FactionId) -> Vec<AllianceId> {
        self.alliances_of(faction).map(|a| a.alliance_id.clone()).collect()
    }

    pub fn active(&self) -> impl Iterator<Item = &FactionAlliance> {
        self.alliances.values()
    }

    pub fn retired(&self) -> &[FactionAlliance] {
        &self.retired
    }

    pub fn len(&self) -> usize {
        self.alliances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alliances.is_empty()
    }
}
