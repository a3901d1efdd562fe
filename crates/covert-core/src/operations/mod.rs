//! Covert Operation Executor
//!
//! Resolves a single operation request into a success flag, a heat delta, a
//! narrative line and structured side effects. The executor never mutates
//! state itself; the engine applies the side effects it returns.

pub mod request;

pub use request::{
    OperationKind, OperationOutcome, OperationPayload, OperationRejection, OperationRequest,
    OperationResult, SideEffect,
};

use covert_events::FactionId;

use crate::alliances::AllianceManager;
use crate::channels::ChannelRegistry;
use crate::config::OperationConfig;
use crate::ledger::{FactionLedger, ResourceKind};
use crate::rng::{check, RandomSource};

/// Read-only view of the state an operation is resolved against
pub struct OperationContext<'a> {
    pub alliances: &'a AllianceManager,
    pub channels: &'a ChannelRegistry,
    pub ledger: &'a dyn FactionLedger,
    pub heat: f32,
}

#[derive(Debug, Clone)]
pub struct CovertOperationExecutor {
    config: OperationConfig,
}

impl CovertOperationExecutor {
    pub fn new(config: OperationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OperationConfig {
        &self.config
    }

    /// Base rate plus alliance and channel-trust bonuses, minus a heat penalty.
    pub fn calculate_success_chance(
        &self,
        kind: OperationKind,
        executor: &FactionId,
        alliances: &AllianceManager,
        channels: &ChannelRegistry,
        heat: f32,
    ) -> f32 {
        let base = self.config.table.profile(kind).base_success;
        let alliance_bonus = alliances.total_operational_bonus(executor);
        let trust_bonus = channels.trust_bonus(executor, self.config.channel_trust_bonus);
        let heat_penalty = heat.max(0.0) * self.config.heat_success_penalty;

        (base + alliance_bonus + trust_bonus - heat_penalty)
            .clamp(self.config.min_success, self.config.max_success)
    }

    /// Heat charged when an operation of this kind fails.
    pub fn failure_heat(&self, kind: OperationKind) -> f32 {
        self.config.table.profile(kind).heat_cost * self.config.failure_heat_multiplier
    }

    pub fn execute(
        &self,
        request: &OperationRequest,
        ctx: &OperationContext<'_>,
        rng: &mut dyn RandomSource,
    ) -> OperationResult {
        if let Some(rejection) = self.precondition(request, ctx) {
            tracing::debug!("{} by {} rejected: {:?}", request.kind(), request.executor, rejection);
            return OperationResult::rejected(request, rejection);
        }

        let kind = request.kind();
        let chance = self.calculate_success_chance(
            kind,
            &request.executor,
            ctx.alliances,
            ctx.channels,
            ctx.heat,
        );

        let mut result = match &request.payload {
            OperationPayload::FalseFlag { framed_action } => self.false_flag(request, framed_action, rng),
            OperationPayload::CounterIntelligence { focus } => self.counter_intelligence(request, focus.as_ref()),
            OperationPayload::DoubleAgentDeployment { cover_role } => {
                self.resolve(request, chance, rng, |target| {
                    vec![SideEffect::DeployDoubleAgent {
                        primary: request.executor.clone(),
                        secondary: target.clone(),
                        cover_role: cover_role.clone(),
                    }]
                })
            }
            OperationPayload::CovertSupport { resource, amount } => {
                let received = amount * self.config.covert_support_efficiency;
                self.resolve(request, chance, rng, |target| {
                    vec![SideEffect::TransferResources {
                        from: request.executor.clone(),
                        to: target.clone(),
                        resource: *resource,
                        sent: *amount,
                        received,
                    }]
                })
            }
            OperationPayload::ResourceTransfer { resource, amount } => {
                self.resolve(request, chance, rng, |target| {
                    vec![SideEffect::TransferResources {
                        from: request.executor.clone(),
                        to: target.clone(),
                        resource: *resource,
                        sent: *amount,
                        received: *amount,
                    }]
                })
            }
            OperationPayload::IntelligenceSharing { .. } => {
                let boost = self.config.intel_sharing_trust_boost;
                let effects: Vec<SideEffect> = recipients(request)
                    .filter_map(|r| ctx.channels.find_channel(&request.executor, r))
                    .map(|c| SideEffect::BoostChannelTrust {
                        channel_id: c.channel_id.clone(),
                        amount: boost,
                    })
                    .collect();
                self.resolve(request, chance, rng, |_| effects)
            }
            OperationPayload::JointSabotage { target_asset } => {
                self.resolve(request, chance, rng, |target| {
                    vec![SideEffect::SabotageTarget {
                        target: target.clone(),
                        asset: target_asset.clone(),
                    }]
                })
            }
            OperationPayload::CoordinatedPropaganda { reach, .. } => {
                let target = request.target.clone();
                self.resolve(request, chance, rng, |_| {
                    vec![SideEffect::PropagandaPush {
                        target,
                        reach: reach.clamp(0.0, 1.0),
                    }]
                })
            }
        };

        if !matches!(kind, OperationKind::FalseFlag | OperationKind::CounterIntelligence) {
            result.success_chance = chance;
        }
        tracing::debug!(
            "{} by {}: {:?} (chance {:.3}, heat +{:.1})",
            kind,
            request.executor,
            result.outcome,
            result.success_chance,
            result.heat_delta
        );
        result
    }

    /// Checks target, funds and recipients before anything is rolled.
    fn precondition(&self, request: &OperationRequest, ctx: &OperationContext<'_>) -> Option<OperationRejection> {
        let needs_target = matches!(
            request.kind(),
            OperationKind::JointSabotage
                | OperationKind::ResourceTransfer
                | OperationKind::CovertSupport
                | OperationKind::FalseFlag
                | OperationKind::DoubleAgentDeployment
        );
        if needs_target && request.target.is_none() {
            return Some(OperationRejection::MissingTarget);
        }
        if request.target.as_ref() == Some(&request.executor) {
            return Some(OperationRejection::TargetIsExecutor);
        }

        match &request.payload {
            OperationPayload::ResourceTransfer { resource, amount }
            | OperationPayload::CovertSupport { resource, amount } => {
                if *amount <= 0.0 || !amount.is_finite() {
                    return Some(OperationRejection::InvalidAmount);
                }
                if !can_afford(ctx.ledger, &request.executor, *resource, *amount) {
                    return Some(OperationRejection::InsufficientResources);
                }
                let has_account = request
                    .target
                    .as_ref()
                    .is_some_and(|t| ctx.ledger.balance(t, *resource).is_some());
                if !has_account {
                    return Some(OperationRejection::NoLedgerAccount);
                }
            }
            OperationPayload::IntelligenceSharing { .. } => {
                if recipients(request).next().is_none() {
                    return Some(OperationRejection::NoRecipients);
                }
            }
            _ => {}
        }
        None
    }

    /// One roll against `chance`; side effects only on success.
    fn resolve<F>(
        &self,
        request: &OperationRequest,
        chance: f32,
        rng: &mut dyn RandomSource,
        effects: F,
    ) -> OperationResult
    where
        F: FnOnce(&FactionId) -> Vec<SideEffect>,
    {
        let kind = request.kind();
        let profile = self.config.table.profile(kind);
        let target_name = request
            .target
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "the public".to_string());

        if check(rng, chance) {
            let mut result = OperationResult::new(request, OperationOutcome::Succeeded);
            result.heat_delta = profile.heat_cost;
            result.side_effects = effects(request.target.as_ref().unwrap_or(&request.executor));
            result.narrative = format!("{} against {} succeeded", kind, target_name);
            result
        } else {
            let mut result = OperationResult::new(request, OperationOutcome::Failed);
            result.heat_delta = self.failure_heat(kind);
            result.narrative = format!("{} against {} failed", kind, target_name);
            result
        }
    }

    /// Independent detection roll; undetected false flags always frame the target.
    fn false_flag(&self, request: &OperationRequest, framed_action: &str, rng: &mut dyn RandomSource) -> OperationResult {
        let detection = self.config.false_flag_detection_chance;
        let Some(target) = request.target.clone() else {
            return OperationResult::rejected(request, OperationRejection::MissingTarget);
        };

        if check(rng, detection) {
            let mut result = OperationResult::new(request, OperationOutcome::Detected);
            result.heat_delta = self.config.leaked_operation_heat;
            result.scandal = true;
            result.success_chance = 1.0 - detection;
            result.narrative = format!(
                "{} caught staging {} to frame {}",
                request.executor, framed_action, target
            );
            result
        } else {
            let mut result = OperationResult::new(request, OperationOutcome::Succeeded);
            result.heat_delta = self.config.table.false_flag.heat_cost;
            result.success_chance = 1.0 - detection;
            result.narrative = format!("{} blamed on {}", framed_action, target);
            result.side_effects = vec![SideEffect::FrameFaction {
                framed: target,
                action: framed_action.to_string(),
            }];
            result
        }
    }

    /// Always succeeds; its intelligence value is modeled elsewhere.
    fn counter_intelligence(&self, request: &OperationRequest, focus: Option<&FactionId>) -> OperationResult {
        let mut result = OperationResult::new(request, OperationOutcome::Succeeded);
        result.heat_delta = self.config.table.counter_intelligence.heat_cost;
        result.success_chance = 1.0;
        result.narrative = match focus {
            Some(f) => format!("{} sweeps for {} penetration", request.executor, f),
            None => format!("{} runs a counter-intelligence sweep", request.executor),
        };
        result
    }
}

fn recipients(request: &OperationRequest) -> impl Iterator<Item = &FactionId> {
    request
        .allies
        .iter()
        .chain(request.target.iter())
        .filter(move |f| *f != &request.executor)
}

fn can_afford(ledger: &dyn FactionLedger, faction: &FactionId, kind: ResourceKind, amount: f32) -> bool {
    ledger.balance(faction, kind).map_or(false, |available| available >= amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alliances::AllianceType;
    use crate::config::{AllianceConfig, ChannelConfig};
    use crate::ledger::{FactionLedgers, FactionResources};
    use crate::rng::ReplayRolls;

    struct Fixture {
        executor: CovertOperationExecutor,
        alliances: AllianceManager,
        channels: ChannelRegistry,
        ledger: FactionLedgers,
    }

    impl Fixture {
        fn new() -> Self {
            let mut ledger = FactionLedgers::new();
            ledger.open_account("red_hand", FactionResources::new(100.0, 10.0, 5.0));
            ledger.open_account("dockers", FactionResources::new(0.0, 0.0, 0.0));
            Self {
                executor: CovertOperationExecutor::new(OperationConfig::default()),
                alliances: AllianceManager::new(AllianceConfig::default()),
                channels: ChannelRegistry::new(ChannelConfig::default()),
                ledger,
            }
        }

        fn run(&self, request: &OperationRequest, heat: f32, rolls: &mut ReplayRolls) -> OperationResult {
            let ctx = OperationContext {
                alliances: &self.alliances,
                channels: &self.channels,
                ledger: &self.ledger,
                heat,
            };
            self.executor.execute(request, &ctx, rolls)
        }
    }

    #[test]
    fn test_success_chance_components() {
        let mut fx = Fixture::new();
        let red = FactionId::from("red_hand");
        let bare = fx.executor.calculate_success_chance(
            OperationKind::JointSabotage,
            &red,
            &fx.alliances,
            &fx.channels,
            0.0,
        );
        assert!((bare - 0.5).abs() < 1e-6);

        fx.alliances
            .form_alliance(
                &[red.clone(), "dockers".into()],
                AllianceType::Secret,
                "Pact",
                None,
                &mut fx.channels,
                1,
            )
            .unwrap();
        let allied = fx.executor.calculate_success_chance(
            OperationKind::JointSabotage,
            &red,
            &fx.alliances,
            &fx.channels,
            0.0,
        );
        // 0.5 + 0.1*0.8*0.7 + 0.5*0.02
        assert!((allied - 0.566).abs() < 1e-5);

        let hot = fx.executor.calculate_success_chance(
            OperationKind::JointSabotage,
            &red,
            &fx.alliances,
            &fx.channels,
            100.0,
        );
        assert!(hot < allied);
    }

    #[test]
    fn test_success_chance_clamped() {
        let fx = Fixture::new();
        let red = FactionId::from("red_hand");
        let chance = fx.executor.calculate_success_chance(
            OperationKind::DoubleAgentDeployment,
            &red,
            &fx.alliances,
            &fx.channels,
            1000.0,
        );
        assert_eq!(chance, 0.1);
        let chance = fx.executor.calculate_success_chance(
            OperationKind::CounterIntelligence,
            &red,
            &fx.alliances,
            &fx.channels,
            0.0,
        );
        assert_eq!(chance, 0.95);
    }

    #[test]
    fn test_false_flag_detected() {
        let fx = Fixture::new();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::FalseFlag { framed_action: "bombing".into() },
        )
        .with_target("dockers");
        let mut rolls = ReplayRolls::new([0.1]);
        let result = fx.run(&request, 0.0, &mut rolls);
        assert!(result.discovered);
        assert!(result.scandal);
        assert!(!result.success);
        assert_eq!(result.heat_delta, 20.0);
        assert!(result.side_effects.is_empty());
        assert_eq!(rolls.consumed(), 1);
    }

    #[test]
    fn test_false_flag_frames_target() {
        let fx = Fixture::new();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::FalseFlag { framed_action: "bombing".into() },
        )
        .with_target("dockers");
        let mut rolls = ReplayRolls::new([0.5]);
        let result = fx.run(&request, 0.0, &mut rolls);
        assert!(result.success);
        assert!(!result.discovered);
        assert_eq!(result.heat_delta, 6.0);
        assert!(matches!(
            result.side_effects.as_slice(),
            [SideEffect::FrameFaction { .. }]
        ));
    }

    #[test]
    fn test_counter_intelligence_always_succeeds_without_roll() {
        let fx = Fixture::new();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::CounterIntelligence { focus: None },
        );
        let mut rolls = ReplayRolls::new([]);
        let result = fx.run(&request, 80.0, &mut rolls);
        assert!(result.success);
        assert_eq!(result.success_chance, 1.0);
        assert_eq!(result.heat_delta, 2.0);
        assert_eq!(rolls.consumed(), 0);
    }

    #[test]
    fn test_covert_support_discount() {
        let fx = Fixture::new();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::CovertSupport { resource: ResourceKind::Money, amount: 50.0 },
        )
        .with_target("dockers");
        let mut rolls = ReplayRolls::new([0.0]);
        let result = fx.run(&request, 0.0, &mut rolls);
        assert!(result.success);
        match &result.side_effects[0] {
            SideEffect::TransferResources { sent, received, .. } => {
                assert_eq!(*sent, 50.0);
                assert!((received - 35.0).abs() < 1e-5);
            }
            other => panic!("unexpected effect {:?}", other),
        }
    }

    #[test]
    fn test_insufficient_funds_rejected_without_roll() {
        let fx = Fixture::new();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::ResourceTransfer { resource: ResourceKind::Money, amount: 500.0 },
        )
        .with_target("dockers");
        let mut rolls = ReplayRolls::new([]);
        let result = fx.run(&request, 0.0, &mut rolls);
        assert_eq!(
            result.outcome,
            OperationOutcome::Rejected { reason: OperationRejection::InsufficientResources }
        );
        assert_eq!(rolls.consumed(), 0);
    }

    #[test]
    fn test_missing_target_rejected() {
        let fx = Fixture::new();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::DoubleAgentDeployment { cover_role: "clerk".into() },
        );
        let mut rolls = ReplayRolls::new([]);
        let result = fx.run(&request, 0.0, &mut rolls);
        assert!(!result.success);
        assert!(result.is_rejected());
    }

    #[test]
    fn test_failure_costs_extra_heat() {
        let fx = Fixture::new();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::JointSabotage { target_asset: "rail depot".into() },
        )
        .with_target("dockers");
        let mut rolls = ReplayRolls::new([0.99]);
        let result = fx.run(&request, 0.0, &mut rolls);
        assert_eq!(result.outcome, OperationOutcome::Failed);
        assert!((result.heat_delta - 12.0).abs() < 1e-6);
        assert!(result.side_effects.is_empty());
    }

    #[test]
    fn test_intelligence_sharing_boosts_existing_channels() {
        let mut fx = Fixture::new();
        fx.channels
            .establish_channel(&"red_hand".into(), &"dockers".into(), 1)
            .unwrap();
        let request = OperationRequest::new(
            "red_hand",
            OperationPayload::IntelligenceSharing { intel_value: 2.0 },
        )
        .with_allies(vec!["dockers".into(), "students".into()]);
        let mut rolls = ReplayRolls::new([0.0]);
        let result = fx.run(&request, 0.0, &mut rolls);
        assert!(result.success);
        assert_eq!(result.side_effects.len(), 1);
    }
}
