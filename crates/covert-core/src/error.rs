//! Error Types
//!
//! Invalid references fail the single call and leave state untouched.
//! Expected game-flow refusals are result values, not errors.

use covert_events::{AgentId, AllianceId, ChannelId, FactionId};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::operations::OperationKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CovertError {
    #[error("unknown faction: {0}")]
    UnknownFaction(FactionId),
    #[error("unknown channel: {0}")]
    UnknownChannel(ChannelId),
    #[error("unknown alliance: {0}")]
    UnknownAlliance(AllianceId),
    #[error("unknown double agent: {0}")]
    UnknownDoubleAgent(AgentId),
    #[error("unknown spy agent: {0}")]
    UnknownAgent(AgentId),
    #[error("faction {faction} is not a party to channel {channel}")]
    NotChannelMember { channel: ChannelId, faction: FactionId },
    #[error("faction {faction} is not a member of alliance {alliance}")]
    NotAllianceMember { alliance: AllianceId, faction: FactionId },
    #[error("a channel needs two distinct factions, got {0} twice")]
    SameFaction(FactionId),
    #[error("invalid alliance: {0}")]
    InvalidAlliance(String),
    #[error("operation '{name}' was given a {payload} payload")]
    PayloadMismatch { name: String, payload: OperationKind },
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

pub type CovertResult<T> = Result<T, CovertError>;
