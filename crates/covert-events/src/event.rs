//! Diplomatic Event Types
//!
//! Immutable records of everything the clandestine layer does that the rest of
//! the game may observe. Reputation and narrative consumers read these in order.

use serde::{Deserialize, Serialize};

use crate::ids::{EventId, FactionId};

/// Category of a diplomatic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiplomaticEventType {
    ChannelEstablished,
    MessageLeaked,
    AllianceFormed,
    AllianceDiscovered,
    MemberWithdrew,
    AllianceDissolved,
    CovertOperation,
    OperationExposed,
    DoubleAgentDeployed,
    DoubleAgentExposed,
    DoubleAgentTurned,
    AgentRecruited,
    AgentExposed,
    AgentBurned,
    AgentTurned,
}

impl DiplomaticEventType {
    /// Events of these types are scandals when they reach the press.
    pub fn is_scandal_class(&self) -> bool {
        matches!(
            self,
            DiplomaticEventType::MessageLeaked
                | DiplomaticEventType::AllianceDiscovered
                | DiplomaticEventType::OperationExposed
                | DiplomaticEventType::DoubleAgentExposed
        )
    }

    /// Returns all event type variants.
    pub fn all() -> &'static [DiplomaticEventType] {
        &[
            DiplomaticEventType::ChannelEstablished,
            DiplomaticEventType::MessageLeaked,
            DiplomaticEventType::AllianceFormed,
            DiplomaticEventType::AllianceDiscovered,
            DiplomaticEventType::MemberWithdrew,
            DiplomaticEventType::AllianceDissolved,
            DiplomaticEventType::CovertOperation,
            DiplomaticEventType::OperationExposed,
            DiplomaticEventType::DoubleAgentDeployed,
            DiplomaticEventType::DoubleAgentExposed,
            DiplomaticEventType::DoubleAgentTurned,
            DiplomaticEventType::AgentRecruited,
            DiplomaticEventType::AgentExposed,
            DiplomaticEventType::AgentBurned,
            DiplomaticEventType::AgentTurned,
        ]
    }
}

/// How widely an event was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaCoverage {
    /// Known only to the parties involved
    #[default]
    None,
    /// Whispered about, unconfirmed
    Rumor,
    /// Picked up by regional outlets
    Regional,
    /// Front-page national story
    National,
}

/// An immutable record of a clandestine event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiplomaticEvent {
    pub event_id: EventId,
    pub event_type: DiplomaticEventType,
    /// Factions involved, initiator first when there is one
    pub factions: Vec<FactionId>,
    pub turn: u64,
    pub description: String,
    pub media_coverage: MediaCoverage,
    /// Surveillance heat this event added
    pub heat_generated: f32,
    /// Set when the event is a public scandal
    #[serde(default)]
    pub scandal: bool,
}

impl DiplomaticEvent {
    /// Creates an event with an empty id; the event log assigns the id on append.
    pub fn new(
        event_type: DiplomaticEventType,
        factions: Vec<FactionId>,
        turn: u64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_id: EventId::default(),
            event_type,
            factions,
            turn,
            description: description.into(),
            media_coverage: MediaCoverage::None,
            heat_generated: 0.0,
            scandal: false,
        }
    }

    pub fn with_heat(mut self, heat: f32) -> Self {
        self.heat_generated = heat;
        self
    }

    pub fn with_coverage(mut self, coverage: MediaCoverage) -> Self {
        self.media_coverage = coverage;
        self
    }

    /// Marks the event as a public scandal with national coverage.
    pub fn as_scandal(mut self) -> Self {
        self.scandal = true;
        self.media_coverage = MediaCoverage::National;
        self
    }

    pub fn involves(&self, faction: &FactionId) -> bool {
        self.factions.contains(faction)
    }

    /// Serializes the event as a single JSON line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses an event from a single JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_serialization() {
        assert_eq!(
            serde_json::to_string(&DiplomaticEventType::AllianceDiscovered).unwrap(),
            r#""alliance_discovered""#
        );
        assert_eq!(
            serde_json::to_string(&DiplomaticEventType::DoubleAgentExposed).unwrap(),
            r#""double_agent_exposed""#
        );
    }

    #[test]
    fn test_scandal_class() {
        assert!(DiplomaticEventType::AllianceDiscovered.is_scandal_class());
        assert!(DiplomaticEventType::OperationExposed.is_scandal_class());
        assert!(!DiplomaticEventType::ChannelEstablished.is_scandal_class());
        assert!(!DiplomaticEventType::AgentRecruited.is_scandal_class());
    }

    #[test]
    fn test_builder_and_jsonl() {
        let event = DiplomaticEvent::new(
            DiplomaticEventType::AllianceDiscovered,
            vec![FactionId::from("red_hand"), FactionId::from("dockers")],
            12,
            "secret alliance discovered",
        )
        .with_heat(15.0)
        .as_scandal();

        assert!(event.scandal);
        assert_eq!(event.media_coverage, MediaCoverage::National);
        assert!(event.involves(&FactionId::from("dockers")));

        let line = event.to_jsonl().unwrap();
        let parsed = DiplomaticEvent::from_jsonl(&line).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_coverage_ordering() {
        assert!(MediaCoverage::National > MediaCoverage::Regional);
        assert!(MediaCoverage::Rumor > MediaCoverage::None);
        assert_eq!(DiplomaticEventType::all().len(), 15);
    }
}
