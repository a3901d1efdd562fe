//! Configuration System
//!
//! Every tunable probability and threshold of the clandestine layer lives here.
//! Sections are plain values handed to each component at construction; a TOML
//! file only needs to name the fields it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::alliances::AllianceType;
use crate::operations::OperationKind;
use crate::spy_network::{MissionType, RecruitmentMethod};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CovertConfig {
    #[serde(default)]
    pub channels: ChannelConfig,
    #[serde(default)]
    pub alliances: AllianceConfig,
    #[serde(default)]
    pub operations: OperationConfig,
    #[serde(default)]
    pub double_agents: DoubleAgentConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub heat: HeatConfig,
}

impl CovertConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: CovertConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks that probabilities are in range and structural settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let probabilities = [
            ("channels.base_trust", self.channels.base_trust),
            ("channels.base_encryption", self.channels.base_encryption),
            ("channels.base_leak_chance", self.channels.base_leak_chance),
            ("alliances.initial_stability", self.alliances.initial_stability),
            ("alliances.coerced_initial_stability", self.alliances.coerced_initial_stability),
            ("alliances.base_discovery_chance", self.alliances.base_discovery_chance),
            ("operations.false_flag_detection_chance", self.operations.false_flag_detection_chance),
            ("operations.covert_support_efficiency", self.operations.covert_support_efficiency),
            ("operations.min_success", self.operations.min_success),
            ("operations.max_success", self.operations.max_success),
            ("double_agents.initial_exposure_risk", self.double_agents.initial_exposure_risk),
            ("double_agents.exposure_floor", self.double_agents.exposure_floor),
            ("double_agents.exposure_ceiling", self.double_agents.exposure_ceiling),
            ("network.base_recruitment_rate", self.network.base_recruitment_rate),
            ("network.burn_exposure_threshold", self.network.burn_exposure_threshold),
            ("network.turn_chance", self.network.turn_chance),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.operations.min_success > self.operations.max_success {
            return Err(ConfigError::Invalid(
                "operations.min_success exceeds operations.max_success".to_string(),
            ));
        }
        if self.double_agents.exposure_floor > self.double_agents.exposure_ceiling {
            return Err(ConfigError::Invalid(
                "double_agents.exposure_floor exceeds double_agents.exposure_ceiling".to_string(),
            ));
        }
        if self.network.cell_capacity == 0 {
            return Err(ConfigError::Invalid("network.cell_capacity must be at least 1".to_string()));
        }
        if self.heat.max_heat <= 0.0 {
            return Err(ConfigError::Invalid("heat.max_heat must be positive".to_string()));
        }
        Ok(())
    }
}

/// Secret channel parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Trust a new channel starts with
    pub base_trust: f32,
    /// Encryption strength a new channel starts with
    pub base_encryption: f32,
    /// Heat raised when a channel is opened
    pub establish_heat: f32,
    /// Leak chance before trust/encryption/heat/incident terms
    pub base_leak_chance: f32,
    /// Leak risk removed per unit of trust
    pub trust_leak_weight: f32,
    /// Leak risk removed per unit of encryption
    pub encryption_leak_weight: f32,
    /// Leak risk added per point of surveillance heat
    pub heat_leak_weight: f32,
    /// Leak risk added per past leak incident
    pub incident_leak_weight: f32,
    /// Leak risk added per send since the last encryption upgrade
    pub usage_leak_weight: f32,
    /// Trust lost when a message leaks
    pub leak_trust_penalty: f32,
    /// Trust gained by a delivered message
    pub send_trust_gain: f32,
    /// Heat raised when a message leaks
    pub leak_heat: f32,
    /// Encryption lost per turn
    pub encryption_decay_rate: f32,
    /// Minimum payment for an encryption upgrade
    pub upgrade_min_cost: f32,
    /// Encryption gained by an upgrade
    pub upgrade_amount: f32,
    /// Trust lost per turn by channels idle longer than the recent window
    pub idle_trust_decay: f32,
    /// Turns a channel may stay unused before trust drifts
    pub idle_window_turns: u64,
    /// Maximum message records kept per channel
    pub history_limit: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_trust: 0.5,
            base_encryption: 0.7,
            establish_heat: 1.0,
            base_leak_chance: 0.15,
            trust_leak_weight: 0.1,
            encryption_leak_weight: 0.1,
            heat_leak_weight: 0.002,
            incident_leak_weight: 0.03,
            usage_leak_weight: 0.005,
            leak_trust_penalty: 0.1,
            send_trust_gain: 0.01,
            leak_heat: 3.0,
            encryption_decay_rate: 0.01,
            upgrade_min_cost: 50.0,
            upgrade_amount: 0.15,
            idle_trust_decay: 0.01,
            idle_window_turns: 5,
            history_limit: 50,
        }
    }
}

/// Alliance parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllianceConfig {
    pub public_formation_heat: f32,
    pub secret_formation_heat: f32,
    pub coerced_formation_heat: f32,
    pub initial_stability: f32,
    pub coerced_initial_stability: f32,
    pub base_discovery_chance: f32,
    /// Discovery chance added per member beyond two
    pub member_discovery_weight: f32,
    /// Discovery chance added per unit of instability
    pub instability_discovery_weight: f32,
    /// Discovery chance added per recent joint operation
    pub recent_operation_discovery_weight: f32,
    /// Turns a joint operation counts as recent
    pub recent_window_turns: u64,
    pub discovery_heat: f32,
    pub discovery_stability_penalty: f32,
    pub base_operational_bonus: f32,
    pub public_bonus_multiplier: f32,
    pub secret_bonus_multiplier: f32,
    pub coerced_bonus_multiplier: f32,
    pub member_loss_stability_penalty: f32,
    pub joint_success_stability_gain: f32,
    pub joint_failure_stability_penalty: f32,
}

impl AllianceConfig {
    pub fn formation_heat(&self, alliance_type: AllianceType) -> f32 {
        match alliance_type {
            AllianceType::Public => self.public_formation_heat,
            AllianceType::Secret => self.secret_formation_heat,
            AllianceType::Coerced => self.coerced_formation_heat,
        }
    }

    pub fn bonus_multiplier(&self, alliance_type: AllianceType) -> f32 {
        match alliance_type {
            AllianceType::Public => self.public_bonus_multiplier,
            AllianceType::Secret => self.secret_bonus_multiplier,
            AllianceType::Coerced => self.coerced_bonus_multiplier,
        }
    }

    pub fn starting_stability(&self, alliance_type: AllianceType) -> f32 {
        match alliance_type {
            AllianceType::Coerced => self.coerced_initial_stability,
            AllianceType::Public | AllianceType::Secret => self.initial_stability,
        }
    }
}

impl Default for AllianceConfig {
    fn default() -> Self {
        Self {
            public_formation_heat: 5.0,
            secret_formation_heat: 2.0,
            coerced_formation_heat: 8.0,
            initial_stability: 0.7,
            coerced_initial_stability: 0.5,
            base_discovery_chance: 0.05,
            member_discovery_weight: 0.05,
            instability_discovery_weight: 0.2,
            recent_operation_discovery_weight: 0.03,
            recent_window_turns: 5,
            discovery_heat: 15.0,
            discovery_stability_penalty: 0.1,
            base_operational_bonus: 0.1,
            public_bonus_multiplier: 1.0,
            secret_bonus_multiplier: 0.8,
            coerced_bonus_multiplier: 0.6,
            member_loss_stability_penalty: 0.2,
            joint_success_stability_gain: 0.02,
            joint_failure_stability_penalty: 0.05,
        }
    }
}

/// Base success rate and heat cost of one operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperationProfile {
    pub base_success: f32,
    pub heat_cost: f32,
}

impl OperationProfile {
    pub const fn new(base_success: f32, heat_cost: f32) -> Self {
        Self { base_success, heat_cost }
    }
}

/// Per-kind operation profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationTable {
    pub intelligence_sharing: OperationProfile,
    pub joint_sabotage: OperationProfile,
    pub coordinated_propaganda: OperationProfile,
    pub resource_transfer: OperationProfile,
    pub covert_support: OperationProfile,
    pub false_flag: OperationProfile,
    pub double_agent_deployment: OperationProfile,
    pub counter_intelligence: OperationProfile,
}

impl OperationTable {
    pub fn profile(&self, kind: OperationKind) -> OperationProfile {
        match kind {
            OperationKind::IntelligenceSharing => self.intelligence_sharing,
            OperationKind::JointSabotage => self.joint_sabotage,
            OperationKind::CoordinatedPropaganda => self.coordinated_propaganda,
            OperationKind::ResourceTransfer => self.resource_transfer,
            OperationKind::CovertSupport => self.covert_support,
            OperationKind::FalseFlag => self.false_flag,
            OperationKind::DoubleAgentDeployment => self.double_agent_deployment,
            OperationKind::CounterIntelligence => self.counter_intelligence,
        }
    }
}

impl Default for OperationTable {
    fn default() -> Self {
        Self {
            intelligence_sharing: OperationProfile::new(0.7, 2.0),
            joint_sabotage: OperationProfile::new(0.5, 8.0),
            coordinated_propaganda: OperationProfile::new(0.6, 4.0),
            resource_transfer: OperationProfile::new(0.75, 3.0),
            covert_support: OperationProfile::new(0.65, 4.0),
            false_flag: OperationProfile::new(0.45, 6.0),
            double_agent_deployment: OperationProfile::new(0.4, 5.0),
            counter_intelligence: OperationProfile::new(1.0, 2.0),
        }
    }
}

/// Covert operation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    pub table: OperationTable,
    pub false_flag_detection_chance: f32,
    /// Heat raised when an operation is discovered
    pub leaked_operation_heat: f32,
    /// Heat multiplier applied to the profile cost when an operation fails
    pub failure_heat_multiplier: f32,
    /// Fraction of covert support that reaches the target
    pub covert_support_efficiency: f32,
    /// Success bonus per unit of trust on each channel of the executor
    pub channel_trust_bonus: f32,
    /// Success penalty per point of surveillance heat
    pub heat_success_penalty: f32,
    pub min_success: f32,
    pub max_success: f32,
    /// Trust added to executor-ally channels by successful intelligence sharing
    pub intel_sharing_trust_boost: f32,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            table: OperationTable::default(),
            false_flag_detection_chance: 0.3,
            leaked_operation_heat: 20.0,
            failure_heat_multiplier: 1.5,
            covert_support_efficiency: 0.7,
            channel_trust_bonus: 0.02,
            heat_success_penalty: 0.003,
            min_success: 0.1,
            max_success: 0.95,
            intel_sharing_trust_boost: 0.05,
        }
    }
}

/// Double agent parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoubleAgentConfig {
    pub initial_exposure_risk: f32,
    pub initial_intelligence_value: f32,
    pub success_exposure_step: f32,
    pub failure_exposure_step: f32,
    pub exposure_floor: f32,
    pub exposure_ceiling: f32,
    pub intelligence_gain: f32,
    pub exposure_heat: f32,
    /// Scales exposure checks by the primary faction's counter-intelligence
    pub counter_intel_exposure_weight: f32,
}

impl Default for DoubleAgentConfig {
    fn default() -> Self {
        Self {
            initial_exposure_risk: 0.1,
            initial_intelligence_value: 0.5,
            success_exposure_step: 0.03,
            failure_exposure_step: 0.08,
            exposure_floor: 0.02,
            exposure_ceiling: 0.5,
            intelligence_gain: 0.1,
            exposure_heat: 12.0,
            counter_intel_exposure_weight: 0.5,
        }
    }
}

/// Recruitment success multiplier per method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecruitmentTable {
    pub blackmail: f32,
    pub family: f32,
    pub ideological: f32,
    pub financial: f32,
    pub professional: f32,
    pub romantic: f32,
}

impl RecruitmentTable {
    pub fn multiplier(&self, method: RecruitmentMethod) -> f32 {
        match method {
            RecruitmentMethod::Blackmail => self.blackmail,
            RecruitmentMethod::Family => self.family,
            RecruitmentMethod::Ideological => self.ideological,
            RecruitmentMethod::Financial => self.financial,
            RecruitmentMethod::Professional => self.professional,
            RecruitmentMethod::Romantic => self.romantic,
        }
    }
}

impl Default for RecruitmentTable {
    fn default() -> Self {
        Self {
            blackmail: 0.9,
            family: 0.85,
            ideological: 0.8,
            financial: 0.7,
            professional: 0.6,
            romantic: 0.5,
        }
    }
}

/// Mission success multiplier per mission type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionTable {
    pub surveillance: f32,
    pub courier: f32,
    pub disinformation: f32,
    pub infiltration: f32,
    pub sabotage: f32,
    pub extraction: f32,
}

impl MissionTable {
    pub fn multiplier(&self, mission_type: MissionType) -> f32 {
        match mission_type {
            MissionType::Surveillance => self.surveillance,
            MissionType::Courier => self.courier,
            MissionType::Disinformation => self.disinformation,
            MissionType::Infiltration => self.infiltration,
            MissionType::Sabotage => self.sabotage,
            MissionType::Extraction => self.extraction,
        }
    }
}

impl Default for MissionTable {
    fn default() -> Self {
        Self {
            surveillance: 1.0,
            courier: 0.95,
            disinformation: 0.75,
            infiltration: 0.7,
            sabotage: 0.6,
            extraction: 0.5,
        }
    }
}

/// Spy network parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub base_recruitment_rate: f32,
    pub recruitment: RecruitmentTable,
    /// Weight of recruiter effectiveness in recruitment chance
    pub recruiter_bonus_weight: f32,
    /// Counter-intelligence threat above which recruitment is penalized
    pub threat_threshold: f32,
    pub threat_recruitment_penalty: f32,
    /// Exposure risk a fresh recruit starts with
    pub initial_exposure: f32,
    /// Maximum agents per cell
    pub cell_capacity: usize,
    pub missions: MissionTable,
    /// Agents above this stress are refused missions
    pub max_mission_stress: f32,
    pub success_stress_weight: f32,
    pub failure_stress_weight: f32,
    pub failure_exposure_base: f32,
    pub failure_exposure_weight: f32,
    pub stress_recovery_rate: f32,
    /// Turns between loyalty re-evaluations; 0 turns them off
    pub loyalty_check_interval: u64,
    pub high_stress_threshold: f32,
    pub high_exposure_threshold: f32,
    pub compromise_threshold: u32,
    /// Turns without contact before a handler-less agent counts as unmonitored
    pub unmonitored_window_turns: u64,
    pub loyalty_degrade_chance_per_factor: f32,
    pub max_loyalty_degrade_chance: f32,
    /// Agents at or above this exposure are checked for exposure every turn
    pub exposure_check_floor: f32,
    /// Agents above this exposure are burned
    pub burn_exposure_threshold: f32,
    /// Chance a compromised agent defects instead of being burned
    pub turn_chance: f32,
    pub burn_security_penalty: f32,
    /// Cells below this security level are compromised
    pub cell_compromise_security: f32,
    pub passive_intel_rate: f32,
    pub burn_risk_exposure_weight: f32,
    pub burn_risk_stress_weight: f32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_recruitment_rate: 0.6,
            recruitment: RecruitmentTable::default(),
            recruiter_bonus_weight: 0.3,
            threat_threshold: 0.5,
            threat_recruitment_penalty: 0.7,
            initial_exposure: 0.05,
            cell_capacity: 7,
            missions: MissionTable::default(),
            max_mission_stress: 0.9,
            success_stress_weight: 0.1,
            failure_stress_weight: 0.25,
            failure_exposure_base: 0.1,
            failure_exposure_weight: 0.2,
            stress_recovery_rate: 0.05,
            loyalty_check_interval: 5,
            high_stress_threshold: 0.7,
            high_exposure_threshold: 0.5,
            compromise_threshold: 3,
            unmonitored_window_turns: 10,
            loyalty_degrade_chance_per_factor: 0.15,
            max_loyalty_degrade_chance: 0.6,
            exposure_check_floor: 0.5,
            burn_exposure_threshold: 0.8,
            turn_chance: 0.2,
            burn_security_penalty: 0.2,
            cell_compromise_security: 0.3,
            passive_intel_rate: 0.1,
            burn_risk_exposure_weight: 0.7,
            burn_risk_stress_weight: 0.3,
        }
    }
}

/// Global surveillance heat parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatConfig {
    pub initial_heat: f32,
    pub max_heat: f32,
    pub cooling_per_turn: f32,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            initial_heat: 0.0,
            max_heat: 100.0,
            cooling_per_turn: 1.0,
        }
    }
}
