//! Secret Channel Registry
//!
//! Pairwise encrypted links between factions. Leak risk is derived on demand
//! from trust, encryption, surveillance heat, past incidents and unmaintained
//! use; it is never stored.

use covert_events::{
    generate_channel_id, ChannelId, DiplomaticEvent, DiplomaticEventType, FactionId, MediaCoverage,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::config::ChannelConfig;
use crate::error::{CovertError, CovertResult};
use crate::operations::OperationKind;
use crate::rng::{check, RandomSource};

/// A single message sent over a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub turn: u64,
    pub sender: FactionId,
    pub content: String,
    pub operation: Option<OperationKind>,
    pub leaked: bool,
}

/// Encrypted communication between two factions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretChannel {
    pub channel_id: ChannelId,
    pub faction_a: FactionId,
    pub faction_b: FactionId,
    pub trust: f32,
    pub encryption_strength: f32,
    pub leak_incidents: u32,
    pub successful_sends: u32,
    pub failed_sends: u32,
    /// Sends since the last encryption upgrade
    pub usage_since_maintenance: u32,
    pub established_turn: u64,
    pub last_used_turn: u64,
    pub abandoned: bool,
    pub history: VecDeque<MessageRecord>,
}

impl SecretChannel {
    fn new(channel_id: ChannelId, a: FactionId, b: FactionId, config: &ChannelConfig, turn: u64) -> Self {
        Self {
            channel_id,
            faction_a: a,
            faction_b: b,
            trust: config.base_trust.clamp(0.0, 1.0),
            encryption_strength: config.base_encryption.clamp(0.0, 1.0),
            leak_incidents: 0,
            successful_sends: 0,
            failed_sends: 0,
            usage_since_maintenance: 0,
            established_turn: turn,
            last_used_turn: turn,
            abandoned: false,
            history: VecDeque::new(),
        }
    }

    pub fn involves(&self, faction: &FactionId) -> bool {
        &self.faction_a == faction || &self.faction_b == faction
    }

    pub fn connects(&self, a: &FactionId, b: &FactionId) -> bool {
        (&self.faction_a == a && &self.faction_b == b) || (&self.faction_a == b && &self.faction_b == a)
    }

    pub fn adjust_trust(&mut self, delta: f32) {
        self.trust = (self.trust + delta).clamp(0.0, 1.0);
    }

    fn adjust_encryption(&mut self, delta: f32) {
        self.encryption_strength = (self.encryption_strength + delta).clamp(0.0, 1.0);
    }

    fn record(&mut self, message: MessageRecord, limit: usize) {
        self.history.push_back(message);
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }
}

/// Computes the chance a message on `channel` leaks at the given heat.
pub fn leak_risk(channel: &SecretChannel, config: &ChannelConfig, heat: f32) -> f32 {
    let trust_term = -channel.trust * config.trust_leak_weight;
    let encryption_term = -channel.encryption_strength * config.encryption_leak_weight;
    let heat_term = heat.max(0.0) * config.heat_leak_weight;
    let incident_term = channel.leak_incidents as f32 * config.incident_leak_weight;
    let usage_term = channel.usage_since_maintenance as f32 * config.usage_leak_weight;

    (config.base_leak_chance + trust_term + encryption_term + heat_term + incident_term + usage_term)
        .clamp(0.0, 1.0)
}

/// Result of opening (or reusing) a channel
#[derive(Debug, Clone)]
pub struct ChannelEstablished {
    pub channel_id: ChannelId,
    pub newly_created: bool,
    pub heat_delta: f32,
    pub event: Option<DiplomaticEvent>,
}

/// Why a message was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryRejection {
    ChannelAbandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Delivered,
    Leaked,
    Rejected(DeliveryRejection),
}

/// Result of sending a message
#[derive(Debug, Clone)]
pub struct MessageReceipt {
    pub status: DeliveryStatus,
    /// Risk the send was rolled against
    pub leak_risk: f32,
    pub heat_delta: f32,
    pub event: Option<DiplomaticEvent>,
}

impl MessageReceipt {
    pub fn delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

/// Owns every secret channel in a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRegistry {
    config: ChannelConfig,
    channels: BTreeMap<ChannelId, SecretChannel>,
    next_channel: u64,
}

impl ChannelRegistry {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            channels: BTreeMap::new(),
            next_channel: 1,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Opens a channel between two factions, reusing an open one for the pair.
    pub fn establish_channel(
        &mut self,
        faction_a: &FactionId,
        faction_b: &FactionId,
        turn: u64,
    ) -> CovertResult<ChannelEstablished> {
        if faction_a == faction_b {
            return Err(CovertError::SameFaction(faction_a.clone()));
        }

        if let Some(existing) = self.find_channel(faction_a, faction_b) {
            return Ok(ChannelEstablished {
                channel_id: existing.channel_id.clone(),
                newly_created: false,
                heat_delta: 0.0,
                event: None,
            });
        }

        let channel_id = generate_channel_id(self.next_channel);
        self.next_channel += 1;
        let channel = SecretChannel::new(
            channel_id.clone(),
            faction_a.clone(),
            faction_b.clone(),
            &self.config,
            turn,
        );
        self.channels.insert(channel_id.clone(), channel);

        tracing::info!("Secret channel {} opened between {} and {}", channel_id, faction_a, faction_b);

        let heat = self.config.establish_heat;
        let event = DiplomaticEvent::new(
            DiplomaticEventType::ChannelEstablished,
            vec![faction_a.clone(), faction_b.clone()],
            turn,
            format!("secret channel {} established", channel_id),
        )
        .with_heat(heat);

        Ok(ChannelEstablished {
            channel_id,
            newly_created: true,
            heat_delta: heat,
            event: Some(event),
        })
    }

    /// Sends a message, rolling once against the channel's current leak risk.
    #[allow(clippy::too_many_arguments)]
    pub fn send_message(
        &mut self,
        channel_id: &ChannelId,
        sender: &FactionId,
        content: impl Into<String>,
        operation: Option<OperationKind>,
        heat: f32,
        turn: u64,
        rng: &mut dyn RandomSource,
    ) -> CovertResult<MessageReceipt> {
        let config = &self.config;
        let channel = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| CovertError::UnknownChannel(channel_id.clone()))?;
        if !channel.involves(sender) {
            return Err(CovertError::NotChannelMember {
                channel: channel_id.clone(),
                faction: sender.clone(),
            });
        }

        let risk = leak_risk(channel, config, heat);
        if channel.abandoned {
            return Ok(MessageReceipt {
                status: DeliveryStatus::Rejected(DeliveryRejection::ChannelAbandoned),
                leak_risk: risk,
                heat_delta: 0.0,
                event: None,
            });
        }

        let leaked = check(rng, risk);
        channel.usage_since_maintenance += 1;
        channel.last_used_turn = turn;
        channel.record(
            MessageRecord {
                turn,
                sender: sender.clone(),
                content: content.into(),
                operation,
                leaked,
            },
            config.history_limit,
        );

        if leaked {
            channel.failed_sends += 1;
            channel.leak_incidents += 1;
            channel.adjust_trust(-config.leak_trust_penalty);
            tracing::debug!("Message on {} leaked (risk {:.3})", channel_id, risk);

            let event = DiplomaticEvent::new(
                DiplomaticEventType::MessageLeaked,
                vec![channel.faction_a.clone(), channel.faction_b.clone()],
                turn,
                format!("communication over {} intercepted", channel_id),
            )
            .with_heat(config.leak_heat)
            .with_coverage(MediaCoverage::Rumor);

            Ok(MessageReceipt {
                status: DeliveryStatus::Leaked,
                leak_risk: risk,
                heat_delta: config.leak_heat,
                event: Some(event),
            })
        } else {
            channel.successful_sends += 1;
            channel.adjust_trust(config.send_trust_gain);
            Ok(MessageReceipt {
                status: DeliveryStatus::Delivered,
                leak_risk: risk,
                heat_delta: 0.0,
                event: None,
            })
        }
    }

    /// Current leak risk of a channel at the given heat.
    pub fn leak_risk(&self, channel_id: &ChannelId, heat: f32) -> CovertResult<f32> {
        let channel = self
            .channels
            .get(channel_id)
            .ok_or_else(|| CovertError::UnknownChannel(channel_id.clone()))?;
        Ok(leak_risk(channel, &self.config, heat))
    }

    /// Linear per-turn encryption decay on every open channel.
    pub fn degrade_encryption(&mut self) {
        let rate = self.config.encryption_decay_rate;
        for channel in self.channels.values_mut().filter(|c| !c.abandoned) {
            channel.adjust_encryption(-rate);
        }
    }

    /// Trust drift for open channels idle longer than the configured window.
    pub fn drift_idle_trust(&mut self, turn: u64) {
        let window = self.config.idle_window_turns;
        let decay = self.config.idle_trust_decay;
        for channel in self.channels.values_mut().filter(|c| !c.abandoned) {
            if turn.saturating_sub(channel.last_used_turn) > window {
                channel.adjust_trust(-decay);
            }
        }
    }

    /// Upgrades encryption when `cost_paid` meets the minimum; resets usage.
    pub fn upgrade_encryption(&mut self, channel_id: &ChannelId, cost_paid: f32) -> CovertResult<bool> {
        let channel = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| CovertError::UnknownChannel(channel_id.clone()))?;
        if cost_paid < self.config.upgrade_min_cost || channel.abandoned {
            return Ok(false);
        }
        channel.adjust_encryption(self.config.upgrade_amount);
        channel.usage_since_maintenance = 0;
        Ok(true)
    }

    pub fn abandon_channel(&mut self, channel_id: &ChannelId) -> CovertResult<()> {
        let channel = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| CovertError::UnknownChannel(channel_id.clone()))?;
        channel.abandoned = true;
        Ok(())
    }

    pub fn adjust_trust(&mut self, channel_id: &ChannelId, delta: f32) -> CovertResult<()> {
        let channel = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| CovertError::UnknownChannel(channel_id.clone()))?;
        channel.adjust_trust(delta);
        Ok(())
    }

    pub fn get(&self, channel_id: &ChannelId) -> Option<&SecretChannel> {
        self.channels.get(channel_id)
    }

    /// Finds the open channel connecting two factions.
    pub fn find_channel(&self, a: &FactionId, b: &FactionId) -> Option<&SecretChannel> {
        self.channels.values().find(|c| !c.abandoned && c.connects(a, b))
    }

    pub fn channels_involving<'a>(&'a self, faction: &'a FactionId) -> impl Iterator<Item = &'a SecretChannel> + 'a {
        self.channels
            .values()
            .filter(move |c| !c.abandoned && c.involves(faction))
    }

    /// Sum of trust across the faction's open channels, scaled by `per_unit`.
    pub fn trust_bonus(&self, faction: &FactionId, per_unit: f32) -> f32 {
        self.channels_involving(faction).map(|c| c.trust * per_unit).sum()
    }

    pub fn all(&self) -> impl Iterator<Item = &SecretChannel> {
        self.channels.values()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ReplayRolls;

    fn registry() -> ChannelRegistry {
        ChannelRegistry::new(ChannelConfig::default())
    }

    fn open(registry: &mut ChannelRegistry) -> ChannelId {
        registry
            .establish_channel(&"red_hand".into(), &"dockers".into(), 1)
            .unwrap()
            .channel_id
    }

    #[test]
    fn test_establish_emits_event_and_heat() {
        let mut registry = registry();
        let result = registry
            .establish_channel(&"red_hand".into(), &"dockers".into(), 3)
            .unwrap();
        assert!(result.newly_created);
        assert_eq!(result.heat_delta, 1.0);
        let event = result.event.unwrap();
        assert_eq!(event.event_type, DiplomaticEventType::ChannelEstablished);
        assert_eq!(event.turn, 3);
    }

    #[test]
    fn test_establish_reuses_open_channel() {
        let mut registry = registry();
        let first = open(&mut registry);
        let again = registry
            .establish_channel(&"dockers".into(), &"red_hand".into(), 2)
            .unwrap();
        assert!(!again.newly_created);
        assert_eq!(again.channel_id, first);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_faction_rejected() {
        let mut registry = registry();
        let err = registry
            .establish_channel(&"red_hand".into(), &"red_hand".into(), 1)
            .unwrap_err();
        assert!(matches!(err, CovertError::SameFaction(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_delivered_message_gains_trust() {
        let mut registry = registry();
        let id = open(&mut registry);
        let mut rolls = ReplayRolls::new([0.99]);
        let receipt = registry
            .send_message(&id, &"red_hand".into(), "meet at dawn", None, 0.0, 2, &mut rolls)
            .unwrap();
        assert!(receipt.delivered());
        let channel = registry.get(&id).unwrap();
        assert_eq!(channel.successful_sends, 1);
        assert!((channel.trust - 0.51).abs() < 1e-6);
        assert_eq!(channel.usage_since_maintenance, 1);
    }

    #[test]
    fn test_outsider_cannot_send() {
        let mut registry = registry();
        let id = open(&mut registry);
        let mut rolls = ReplayRolls::new([]);
        let err = registry
            .send_message(&id, &"ghosts".into(), "hello", None, 0.0, 2, &mut rolls)
            .unwrap_err();
        assert!(matches!(err, CovertError::NotChannelMember { .. }));
        assert_eq!(rolls.consumed(), 0);
    }

    #[test]
    fn test_usage_raises_risk_until_upgrade() {
        let mut registry = registry();
        let id = open(&mut registry);
        let before = registry.leak_risk(&id, 0.0).unwrap();
        let mut rolls = ReplayRolls::new([]);
        for _ in 0..5 {
            registry
                .send_message(&id, &"red_hand".into(), "status", None, 0.0, 2, &mut rolls)
                .unwrap();
        }
        // Trust gain partially offsets usage, net risk still rises
        let after = registry.leak_risk(&id, 0.0).unwrap();
        assert!(after > before);

        assert!(registry.upgrade_encryption(&id, 60.0).unwrap());
        assert_eq!(registry.get(&id).unwrap().usage_since_maintenance, 0);
        assert!(registry.leak_risk(&id, 0.0).unwrap() < after);
    }

    #[test]
    fn test_upgrade_below_minimum_is_noop() {
        let mut registry = registry();
        let id = open(&mut registry);
        assert!(!registry.upgrade_encryption(&id, 10.0).unwrap());
        assert_eq!(registry.get(&id).unwrap().encryption_strength, 0.7);
    }

    #[test]
    fn test_encryption_and_trust_stay_bounded() {
        let mut registry = registry();
        let id = open(&mut registry);
        for _ in 0..200 {
            registry.degrade_encryption();
        }
        assert_eq!(registry.get(&id).unwrap().encryption_strength, 0.0);
        for _ in 0..20 {
            registry.upgrade_encryption(&id, 100.0).unwrap();
        }
        assert_eq!(registry.get(&id).unwrap().encryption_strength, 1.0);

        let mut rolls = ReplayRolls::new([]).with_fallback(0.0);
        for _ in 0..30 {
            registry
                .send_message(&id, &"dockers".into(), "leaky", None, 50.0, 2, &mut rolls)
                .unwrap();
        }
        assert_eq!(registry.get(&id).unwrap().trust, 0.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut config = ChannelConfig::default();
        config.history_limit = 3;
        let mut registry = ChannelRegistry::new(config);
        let id = open(&mut registry);
        let mut rolls = ReplayRolls::new([]);
        for i in 0..5 {
            registry
                .send_message(&id, &"red_hand".into(), format!("msg {}", i), None, 0.0, 2, &mut rolls)
                .unwrap();
        }
        let history = &registry.get(&id).unwrap().history;
        assert_eq!(history.len(), 3);
        assert_eq!(history.front().unwrap().content, "msg 2");
    }

    #[test]
    fn test_abandoned_channel_rejects_without_roll() {
        let mut registry = registry();
        let id = open(&mut registry);
        registry.abandon_channel(&id).unwrap();
        let mut rolls = ReplayRolls::new([]);
        let receipt = registry
            .send_message(&id, &"red_hand".into(), "anyone?", None, 0.0, 2, &mut rolls)
            .unwrap();
        assert_eq!(
            receipt.status,
            DeliveryStatus::Rejected(DeliveryRejection::ChannelAbandoned)
        );
        assert_eq!(rolls.consumed(), 0);
        assert!(registry.find_channel(&"red_hand".into(), &"dockers".into()).is_none());
    }

    #[test]
    fn test_idle_trust_drift() {
        let mut registry = registry();
        let id = open(&mut registry);
        registry.drift_idle_trust(5);
        assert_eq!(registry.get(&id).unwrap().trust, 0.5);
        registry.drift_idle_trust(10);
        assert!(registry.get(&id).unwrap().trust < 0.5);
    }
}
