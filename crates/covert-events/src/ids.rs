//! Identifier Types
//!
//! String-backed identifiers for every entity in the clandestine layer.
//! Identifiers are generated from per-registry counters (never random) so a
//! replayed session produces the same ids.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a faction
    FactionId
);
string_id!(
    /// Unique identifier for a secret channel between two factions
    ChannelId
);
string_id!(
    /// Unique identifier for a faction alliance
    AllianceId
);
string_id!(
    /// Unique identifier for a spy agent or double agent
    AgentId
);
string_id!(
    /// Unique identifier for a spy-network cell
    CellId
);
string_id!(
    /// Unique identifier for a diplomatic event
    EventId
);

/// Generates a sequential channel id like `chan_0001`.
pub fn generate_channel_id(sequence: u64) -> ChannelId {
    ChannelId(format!("chan_{:04}", sequence))
}

/// Generates a sequential alliance id like `alliance_0001`.
pub fn generate_alliance_id(sequence: u64) -> AllianceId {
    AllianceId(format!("alliance_{:04}", sequence))
}

/// Generates a sequential spy agent id like `agent_0001`.
pub fn generate_agent_id(sequence: u64) -> AgentId {
    AgentId(format!("agent_{:04}", sequence))
}

/// Generates a sequential double agent id like `double_0001`.
pub fn generate_double_agent_id(sequence: u64) -> AgentId {
    AgentId(format!("double_{:04}", sequence))
}

/// Generates a sequential cell id like `cell_0001`.
pub fn generate_cell_id(sequence: u64) -> CellId {
    CellId(format!("cell_{:04}", sequence))
}

/// Generates a sequential event id like `evt_00000001`.
pub fn generate_event_id(sequence: u64) -> EventId {
    EventId(format!("evt_{:08}", sequence))
}
