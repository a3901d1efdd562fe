//! Engine Snapshots
//!
//! The full clandestine data model as one serde value, for save files and
//! for inspecting a session after the fact.

use covert_events::FactionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::alliances::AllianceManager;
use crate::channels::ChannelRegistry;
use crate::config::CovertConfig;
use crate::double_agents::DoubleAgentRegistry;
use crate::logger::EventLog;
use crate::spy_network::SpyNetwork;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub config: CovertConfig,
    pub turn: u64,
    pub heat: f32,
    pub factions: BTreeSet<FactionId>,
    #[serde(default)]
    pub eliminated: BTreeSet<FactionId>,
    pub channels: ChannelRegistry,
    pub alliances: AllianceManager,
    pub double_agents: DoubleAgentRegistry,
    pub network: SpyNetwork,
    pub events: EventLog,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.to_json()?)
    }

    pub fn read_from(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alliances::AllianceType;
    use crate::engine::CovertEngine;
    use crate::rng::ReplayRolls;
    use crate::spy_network::{AgentType, RecruitmentMethod, RecruitmentProfile};

    fn populated() -> CovertEngine<ReplayRolls> {
        let mut engine = CovertEngine::new(CovertConfig::default(), "red_hand", ReplayRolls::new([0.0]));
        engine.register_faction("dockers");
        engine
            .form_alliance(
                &["red_hand".into(), "dockers".into()],
                AllianceType::Secret,
                "Night Pact",
                None,
            )
            .unwrap();
        engine
            .recruit_agent(
                &RecruitmentProfile::new("Kestrel", AgentType::Informant, "harbor"),
                RecruitmentMethod::Ideological,
                None,
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_snapshot_restores_engine() {
        let engine = populated();
        let json = engine.snapshot().to_json().unwrap();
        let restored = CovertEngine::from_snapshot(EngineSnapshot::from_json(&json).unwrap(), ReplayRolls::new([]));

        assert_eq!(restored.heat(), engine.heat());
        assert_eq!(restored.channels().len(), 1);
        assert_eq!(restored.alliances().len(), 1);
        assert_eq!(restored.network().len(), 1);
        assert_eq!(restored.event_log(), engine.event_log());
    }

    #[test]
    fn test_snapshot_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        populated().snapshot().write_to(&path).unwrap();
        let snapshot = EngineSnapshot::read_from(&path).unwrap();
        assert_eq!(snapshot.factions.len(), 2);
        assert_eq!(snapshot.events.len(), 3);
    }
}
