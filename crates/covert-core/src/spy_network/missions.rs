//! Agent Missions

use covert_events::FactionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionType {
    Surveillance,
    Courier,
    Disinformation,
    Infiltration,
    Sabotage,
    Extraction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSpec {
    pub mission_type: MissionType,
    /// 0 to 1; drives stress and the chance a failure raises exposure
    pub risk: f32,
    pub target: Option<FactionId>,
}

impl MissionSpec {
    pub fn new(mission_type: MissionType, risk: f32) -> Self {
        Self {
            mission_type,
            risk: risk.clamp(0.0, 1.0),
            target: None,
        }
    }

    pub fn against(mut self, target: impl Into<FactionId>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Why an agent was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionRejection {
    AgentTurned,
    AgentBurned,
    TooStressed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MissionOutcome {
    Succeeded {
        chance: f32,
        intelligence: f32,
    },
    Failed {
        chance: f32,
        exposure_raised: bool,
        /// Exposure crossed the burn threshold; the agent is queued for burning
        compromised: bool,
    },
    Rejected {
        reason: MissionRejection,
    },
}

impl MissionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, MissionOutcome::Succeeded { .. })
    }
}
