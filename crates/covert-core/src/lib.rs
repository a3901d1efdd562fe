//! Clandestine relations engine: secret channels, hidden alliances, covert
//! operations, double agents and spy networks for a political strategy game.
//!
//! [`CovertEngine`] is the entry point. Every probabilistic call draws from a
//! [`RandomSource`], so a seed replays a session exactly.

pub mod alliances;
pub mod channels;
pub mod config;
pub mod double_agents;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod logger;
pub mod operations;
pub mod rng;
pub mod setup;
pub mod snapshot;
pub mod spy_network;
pub mod turn;

pub use alliances::{AllianceManager, AllianceType, FactionAlliance, WithdrawalReason};
pub use channels::{ChannelRegistry, DeliveryStatus, MessageReceipt, SecretChannel};
pub use config::{ConfigError, CovertConfig};
pub use double_agents::{DoubleAgent, DoubleAgentRegistry, DoubleAgentStatus};
pub use engine::CovertEngine;
pub use error::{CovertError, CovertResult};
pub use ledger::{FactionLedger, FactionLedgers, FactionResources, LedgerError, ResourceKind};
pub use logger::{EventLog, EventLogger};
pub use operations::{
    CovertOperationExecutor, OperationKind, OperationOutcome, OperationPayload, OperationRequest,
    OperationResult,
};
pub use rng::{RandomSource, ReplayRolls, SimRng};
pub use snapshot::EngineSnapshot;
pub use spy_network::{NetworkAnalysis, SpyAgent, SpyNetwork};
pub use turn::{FactionState, TurnResult};
