//! Network Cells
//!
//! Small groups of agents sharing a location. A burned member costs the
//! whole cell security.

use covert_events::{AgentId, CellId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Active,
    /// No members left
    Dormant,
    Compromised,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkCell {
    pub cell_id: CellId,
    pub location: String,
    pub agents: BTreeSet<AgentId>,
    pub security_level: f32,
    pub status: CellStatus,
    /// Members lost to burning or defection
    pub burns: u32,
    pub formed_turn: u64,
}

impl NetworkCell {
    pub fn new(cell_id: CellId, location: impl Into<String>, turn: u64) -> Self {
        Self {
            cell_id,
            location: location.into(),
            agents: BTreeSet::new(),
            security_level: 1.0,
            status: CellStatus::Dormant,
            burns: 0,
            formed_turn: turn,
        }
    }

    /// Open to new members: not compromised and below capacity.
    pub fn accepts(&self, location: &str, capacity: usize) -> bool {
        self.status != CellStatus::Compromised && self.location == location && self.agents.len() < capacity
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Sets security from member stealth and past burns, then derives status.
    pub fn refresh(&mut self, member_stealth: &[f32], burn_penalty: f32, compromise_below: f32) {
        let mean_stealth = if member_stealth.is_empty() {
            1.0
        } else {
            member_stealth.iter().sum::<f32>() / member_stealth.len() as f32
        };
        self.security_level = (mean_stealth - self.burns as f32 * burn_penalty).clamp(0.0, 1.0);

        self.status = if self.status == CellStatus::Compromised {
            CellStatus::Compromised
        } else if self.burns > 0 && self.security_level < compromise_below {
            CellStatus::Compromised
        } else if self.is_empty() {
            CellStatus::Dormant
        } else {
            CellStatus::Active
        };
    }
}
