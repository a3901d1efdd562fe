//! Recruitment

use serde::{Deserialize, Serialize};

use super::agent::AgentType;
use crate::config::NetworkConfig;

/// Lever used to bring an asset in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecruitmentMethod {
    Blackmail,
    Family,
    Ideological,
    Financial,
    Professional,
    Romantic,
}

/// Candidate a faction is trying to recruit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruitmentProfile {
    pub code_name: String,
    pub agent_type: AgentType,
    pub cover_identity: String,
    pub location: String,
    pub access_level: u8,
    pub reliability: f32,
    pub stealth: f32,
}

impl RecruitmentProfile {
    pub fn new(code_name: impl Into<String>, agent_type: AgentType, location: impl Into<String>) -> Self {
        Self {
            code_name: code_name.into(),
            agent_type,
            cover_identity: String::new(),
            location: location.into(),
            access_level: 3,
            reliability: 0.5,
            stealth: 0.5,
        }
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover_identity = cover.into();
        self
    }

    pub fn with_access(mut self, access_level: u8) -> Self {
        self.access_level = access_level;
        self
    }

    pub fn with_skills(mut self, reliability: f32, stealth: f32) -> Self {
        self.reliability = reliability;
        self.stealth = stealth;
        self
    }
}

/// Base rate x method multiplier x recruiter bonus x threat penalty, in [0, 1].
pub fn recruitment_chance(
    config: &NetworkConfig,
    method: RecruitmentMethod,
    recruiter_effectiveness: Option<f32>,
    counter_intel_threat: f32,
) -> f32 {
    let mut chance = config.base_recruitment_rate * config.recruitment.multiplier(method);
    if let Some(effectiveness) = recruiter_effectiveness {
        chance *= 1.0 + effectiveness * config.recruiter_bonus_weight;
    }
    if counter_intel_threat > config.threat_threshold {
        chance *= config.threat_recruitment_penalty;
    }
    chance.clamp(0.0, 1.0)
}
