//! Turn Types
//!
//! Inputs and results of the per-turn pass.

use covert_events::{AgentId, AllianceId, DiplomaticEvent, FactionId};
use serde::{Deserialize, Serialize};

use crate::alliances::{BetrayalRecord, WithdrawalReason};

/// What the wider game reports about a faction at the start of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionState {
    pub faction_id: FactionId,
    #[serde(default)]
    pub eliminated: bool,
    /// 0 to 1; scales exposure of double agents planted inside this faction
    #[serde(default)]
    pub counter_intelligence: f32,
}

impl FactionState {
    pub fn active(faction_id: impl Into<FactionId>) -> Self {
        Self {
            faction_id: faction_id.into(),
            eliminated: false,
            counter_intelligence: 0.0,
        }
    }

    pub fn eliminated(faction_id: impl Into<FactionId>) -> Self {
        Self {
            eliminated: true,
            ..Self::active(faction_id)
        }
    }

    pub fn with_counter_intelligence(mut self, value: f32) -> Self {
        self.counter_intelligence = value.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum AllianceChange {
    Discovered {
        alliance_id: AllianceId,
        chance: f32,
    },
    MemberRemoved {
        alliance_id: AllianceId,
        faction: FactionId,
        reason: WithdrawalReason,
    },
    Dissolved {
        alliance_id: AllianceId,
    },
}

/// Pass of the turn a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    /// Matching reported faction states against registered factions
    Reconcile,
    Alliances,
    Channels,
}

/// A sub-step that failed without stopping the turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnFailure {
    pub stage: TurnStage,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub turn: u64,
    /// Every event emitted this turn, in order, with ids assigned
    pub events: Vec<DiplomaticEvent>,
    /// Net change in heat, cooling included
    pub heat_delta: f32,
    pub heat_after: f32,
    pub alliance_changes: Vec<AllianceChange>,
    pub betrayals: Vec<BetrayalRecord>,
    /// Double agents and spy agents exposed this turn
    pub exposures: Vec<AgentId>,
    /// Spy agents burned or turned this turn
    pub burned: Vec<AgentId>,
    pub passive_intelligence: f32,
    pub failures: Vec<TurnFailure>,
}

impl TurnResult {
    pub(crate) fn new(turn: u64) -> Self {
        Self {
            turn,
            events: Vec::new(),
            heat_delta: 0.0,
            heat_after: 0.0,
            alliance_changes: Vec::new(),
            betrayals: Vec::new(),
            exposures: Vec::new(),
            burned: Vec::new(),
            passive_intelligence: 0.0,
            failures: Vec::new(),
        }
    }

    pub(crate) fn fail(&mut self, stage: TurnStage, subject: impl ToString, message: impl ToString) {
        let failure = TurnFailure {
            stage,
            subject: subject.to_string(),
            message: message.to_string(),
        };
        tracing::warn!("Turn {} {:?} failed for {}: {}", self.turn, stage, failure.subject, failure.message);
        self.failures.push(failure);
    }

    pub fn scandal_count(&self) -> usize {
        self.events.iter().filter(|e| e.scandal).count()
    }
}
