//! Operation Requests and Results
//!
//! One payload variant per operation kind, carrying exactly the fields that
//! kind needs.

use covert_events::{AgentId, ChannelId, FactionId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::ResourceKind;

/// Kinds of covert operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    IntelligenceSharing,
    JointSabotage,
    CoordinatedPropaganda,
    ResourceTransfer,
    CovertSupport,
    FalseFlag,
    DoubleAgentDeployment,
    CounterIntelligence,
}

impl OperationKind {
    pub fn all() -> &'static [OperationKind] {
        &[
            OperationKind::IntelligenceSharing,
            OperationKind::JointSabotage,
            OperationKind::CoordinatedPropaganda,
            OperationKind::ResourceTransfer,
            OperationKind::CovertSupport,
            OperationKind::FalseFlag,
            OperationKind::DoubleAgentDeployment,
            OperationKind::CounterIntelligence,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::IntelligenceSharing => "intelligence_sharing",
            OperationKind::JointSabotage => "joint_sabotage",
            OperationKind::CoordinatedPropaganda => "coordinated_propaganda",
            OperationKind::ResourceTransfer => "resource_transfer",
            OperationKind::CovertSupport => "covert_support",
            OperationKind::FalseFlag => "false_flag",
            OperationKind::DoubleAgentDeployment => "double_agent_deployment",
            OperationKind::CounterIntelligence => "counter_intelligence",
        }
    }

    /// Parses a snake_case or kebab-case operation name.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::all().iter().copied().find(|k| k.name() == normalized)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operation-specific data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationPayload {
    IntelligenceSharing {
        intel_value: f32,
    },
    JointSabotage {
        target_asset: String,
    },
    CoordinatedPropaganda {
        message: String,
        reach: f32,
    },
    ResourceTransfer {
        resource: ResourceKind,
        amount: f32,
    },
    CovertSupport {
        resource: ResourceKind,
        amount: f32,
    },
    FalseFlag {
        framed_action: String,
    },
    DoubleAgentDeployment {
        cover_role: String,
    },
    CounterIntelligence {
        #[serde(default)]
        focus: Option<FactionId>,
    },
}

impl OperationPayload {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationPayload::IntelligenceSharing { .. } => OperationKind::IntelligenceSharing,
            OperationPayload::JointSabotage { .. } => OperationKind::JointSabotage,
            OperationPayload::CoordinatedPropaganda { .. } => OperationKind::CoordinatedPropaganda,
            OperationPayload::ResourceTransfer { .. } => OperationKind::ResourceTransfer,
            OperationPayload::CovertSupport { .. } => OperationKind::CovertSupport,
            OperationPayload::FalseFlag { .. } => OperationKind::FalseFlag,
            OperationPayload::DoubleAgentDeployment { .. } => OperationKind::DoubleAgentDeployment,
            OperationPayload::CounterIntelligence { .. } => OperationKind::CounterIntelligence,
        }
    }

    /// Payload used when a collaborator names an operation without details.
    pub fn default_for(kind: OperationKind) -> Self {
        match kind {
            OperationKind::IntelligenceSharing => OperationPayload::IntelligenceSharing { intel_value: 1.0 },
            OperationKind::JointSabotage => OperationPayload::JointSabotage {
                target_asset: "infrastructure".to_string(),
            },
            OperationKind::CoordinatedPropaganda => OperationPayload::CoordinatedPropaganda {
                message: String::new(),
                reach: 0.5,
            },
            OperationKind::ResourceTransfer => OperationPayload::ResourceTransfer {
                resource: ResourceKind::Money,
                amount: 0.0,
            },
            OperationKind::CovertSupport => OperationPayload::CovertSupport {
                resource: ResourceKind::Money,
                amount: 0.0,
            },
            OperationKind::FalseFlag => OperationPayload::FalseFlag {
                framed_action: "attack".to_string(),
            },
            OperationKind::DoubleAgentDeployment => OperationPayload::DoubleAgentDeployment {
                cover_role: "staffer".to_string(),
            },
            OperationKind::CounterIntelligence => OperationPayload::CounterIntelligence { focus: None },
        }
    }
}

/// A request to run a covert operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub executor: FactionId,
    pub target: Option<FactionId>,
    #[serde(default)]
    pub allies: Vec<FactionId>,
    pub payload: OperationPayload,
}

impl OperationRequest {
    pub fn new(executor: impl Into<FactionId>, payload: OperationPayload) -> Self {
        Self {
            executor: executor.into(),
            target: None,
            allies: Vec::new(),
            payload,
        }
    }

    pub fn with_target(mut self, target: impl Into<FactionId>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_allies(mut self, allies: Vec<FactionId>) -> Self {
        self.allies = allies;
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.payload.kind()
    }
}

/// Why an operation was refused before any roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationRejection {
    MissingTarget,
    TargetIsExecutor,
    InsufficientResources,
    /// The target has no ledger account to receive resources
    NoLedgerAccount,
    NoRecipients,
    InvalidAmount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationOutcome {
    Succeeded,
    Failed,
    /// Caught in the act
    Detected,
    Rejected { reason: OperationRejection },
    /// The named operation type does not exist
    Unsupported { name: String },
}

/// Structured consequences the engine applies after an operation resolves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SideEffect {
    DeployDoubleAgent {
        primary: FactionId,
        secondary: FactionId,
        cover_role: String,
    },
    TransferResources {
        from: FactionId,
        to: FactionId,
        resource: ResourceKind,
        sent: f32,
        received: f32,
    },
    BoostChannelTrust {
        channel_id: ChannelId,
        amount: f32,
    },
    FrameFaction {
        framed: FactionId,
        action: String,
    },
    SabotageTarget {
        target: FactionId,
        asset: String,
    },
    PropagandaPush {
        target: Option<FactionId>,
        reach: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// `None` only for unsupported operation names
    pub kind: Option<OperationKind>,
    pub executor: FactionId,
    pub target: Option<FactionId>,
    pub success: bool,
    pub discovered: bool,
    pub scandal: bool,
    pub success_chance: f32,
    pub heat_delta: f32,
    pub narrative: String,
    pub outcome: OperationOutcome,
    pub side_effects: Vec<SideEffect>,
    /// Filled in by the engine when a double agent is deployed
    pub deployed_agent: Option<AgentId>,
}

impl OperationResult {
    pub(crate) fn new(request: &OperationRequest, outcome: OperationOutcome) -> Self {
        Self {
            kind: Some(request.kind()),
            executor: request.executor.clone(),
            target: request.target.clone(),
            success: outcome == OperationOutcome::Succeeded,
            discovered: outcome == OperationOutcome::Detected,
            scandal: false,
            success_chance: 0.0,
            heat_delta: 0.0,
            narrative: String::new(),
            outcome,
            side_effects: Vec::new(),
            deployed_agent: None,
        }
    }

    pub(crate) fn rejected(request: &OperationRequest, reason: OperationRejection) -> Self {
        let mut result = Self::new(request, OperationOutcome::Rejected { reason });
        result.narrative = format!("{} refused: {:?}", request.kind(), reason);
        result
    }

    /// Fail-closed result for an operation name nobody implements.
    pub fn unsupported(
        name: &str,
        executor: FactionId,
        target: Option<FactionId>,
    ) -> Self {
        Self {
            kind: None,
            executor,
            target,
            success: false,
            discovered: false,
            scandal: false,
            success_chance: 0.0,
            heat_delta: 0.0,
            narrative: format!("operation type '{}' not implemented", name),
            outcome: OperationOutcome::Unsupported { name: name.to_string() },
            side_effects: Vec::new(),
            deployed_agent: None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(
            self.outcome,
            OperationOutcome::Rejected { .. } | OperationOutcome::Unsupported { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in OperationKind::all() {
            assert_eq!(OperationKind::from_name(kind.name()), Some(*kind));
        }
        assert_eq!(OperationKind::from_name("False-Flag"), Some(OperationKind::FalseFlag));
        assert_eq!(OperationKind::from_name("assassination"), None);
    }

    #[test]
    fn test_default_payload_matches_kind() {
        for kind in OperationKind::all() {
            assert_eq!(OperationPayload::default_for(*kind).kind(), *kind);
        }
    }

    #[test]
    fn test_payload_json_is_tagged() {
        let payload = OperationPayload::CovertSupport {
            resource: ResourceKind::Money,
            amount: 40.0,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""kind":"covert_support""#));
        let parsed: OperationPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_unsupported_result_fails_closed() {
        let result = OperationResult::unsupported("assassination", "red_hand".into(), None);
        assert!(!result.success);
        assert!(result.side_effects.is_empty());
        assert!(result.is_rejected());
        assert!(result.narrative.contains("not implemented"));
    }
}
