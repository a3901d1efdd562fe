//! Shared event types and identifiers for the clandestine-relations engine.
//!
//! This crate contains pure data structures with no simulation logic.
//! Reputation and narrative collaborators depend on it without pulling in the engine.

pub mod event;
pub mod ids;

pub use event::{DiplomaticEvent, DiplomaticEventType, MediaCoverage};
pub use ids::{
    generate_agent_id, generate_alliance_id, generate_cell_id, generate_channel_id,
    generate_double_agent_id, generate_event_id, AgentId, AllianceId, CellId, ChannelId, EventId,
    FactionId,
};
