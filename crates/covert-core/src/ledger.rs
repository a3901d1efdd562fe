//! Faction Ledgers
//!
//! Resource accounts owned by the factions. The engine only reads and writes
//! them through [`FactionLedger`]; the game supplies the implementation.

use covert_events::FactionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Kinds of resources a faction controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Money,
    Influence,
    Personnel,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("no ledger for faction {0}")]
    UnknownFaction(FactionId),
    #[error("faction {faction} has {available} {kind:?}, needs {required}")]
    Insufficient {
        faction: FactionId,
        kind: ResourceKind,
        required: f32,
        available: f32,
    },
    #[error("amount must be non-negative, got {0}")]
    NegativeAmount(f32),
}

/// Read/write access to faction resources.
pub trait FactionLedger {
    fn balance(&self, faction: &FactionId, kind: ResourceKind) -> Option<f32>;
    fn debit(&mut self, faction: &FactionId, kind: ResourceKind, amount: f32) -> Result<(), LedgerError>;
    fn credit(&mut self, faction: &FactionId, kind: ResourceKind, amount: f32) -> Result<(), LedgerError>;

    /// Moves `sent` out of `from` and `received` into `to`, or nothing on error.
    fn transfer(
        &mut self,
        from: &FactionId,
        to: &FactionId,
        kind: ResourceKind,
        sent: f32,
        received: f32,
    ) -> Result<(), LedgerError> {
        if self.balance(to, kind).is_none() {
            return Err(LedgerError::UnknownFaction(to.clone()));
        }
        self.debit(from, kind, sent)?;
        self.credit(to, kind, received)
    }
}

/// Resources held by one faction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactionResources {
    pub money: f32,
    pub influence: f32,
    pub personnel: f32,
}

impl FactionResources {
    pub fn new(money: f32, influence: f32, personnel: f32) -> Self {
        Self { money, influence, personnel }
    }

    pub fn get(&self, kind: ResourceKind) -> f32 {
        match kind {
            ResourceKind::Money => self.money,
            ResourceKind::Influence => self.influence,
            ResourceKind::Personnel => self.personnel,
        }
    }

    fn get_mut(&mut self, kind: ResourceKind) -> &mut f32 {
        match kind {
            ResourceKind::Money => &mut self.money,
            ResourceKind::Influence => &mut self.influence,
            ResourceKind::Personnel => &mut self.personnel,
        }
    }
}

/// In-memory ledger keyed by faction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactionLedgers {
    accounts: BTreeMap<FactionId, FactionResources>,
}

impl FactionLedgers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_account(&mut self, faction: impl Into<FactionId>, resources: FactionResources) {
        self.accounts.insert(faction.into(), resources);
    }

    pub fn account(&self, faction: &FactionId) -> Option<&FactionResources> {
        self.accounts.get(faction)
    }
}

impl FactionLedger for FactionLedgers {
    fn balance(&self, faction: &FactionId, kind: ResourceKind) -> Option<f32> {
        self.accounts.get(faction).map(|r| r.get(kind))
    }

    fn debit(&mut self, faction: &FactionId, kind: ResourceKind, amount: f32) -> Result<(), LedgerError> {
        if amount < 0.0 {
            return Err(LedgerError::NegativeAmount(amount));
        }
        let account = self
            .accounts
            .get_mut(faction)
            .ok_or_else(|| LedgerError::UnknownFaction(faction.clone()))?;
        let available = account.get(kind);
        if available < amount {
            return Err(LedgerError::Insufficient {
                faction: faction.clone(),
                kind,
                required: amount,
                available,
            });
        }
        *account.get_mut(kind) -= amount;
        Ok(())
    }

    fn credit(&mut self, faction: &FactionId, kind: ResourceKind, amount: f32) -> Result<(), LedgerError> {
        if amount < 0.0 {
            return Err(LedgerError::NegativeAmount(amount));
        }
        let account = self
            .accounts
            .get_mut(faction)
            .ok_or_else(|| LedgerError::UnknownFaction(faction.clone()))?;
        *account.get_mut(kind) += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledgers() -> FactionLedgers {
        let mut ledgers = FactionLedgers::new();
        ledgers.open_account("red_hand", FactionResources::new(100.0, 20.0, 5.0));
        ledgers.open_account("dockers", FactionResources::new(10.0, 0.0, 0.0));
        ledgers
    }

    #[test]
    fn test_debit_and_credit() {
        let mut ledgers = ledgers();
        let red = FactionId::from("red_hand");
        ledgers.debit(&red, ResourceKind::Money, 40.0).unwrap();
        ledgers.credit(&red, ResourceKind::Influence, 5.0).unwrap();
        assert_eq!(ledgers.balance(&red, ResourceKind::Money), Some(60.0));
        assert_eq!(ledgers.balance(&red, ResourceKind::Influence), Some(25.0));
    }

    #[test]
    fn test_insufficient_funds_leave_balance() {
        let mut ledgers = ledgers();
        let dockers = FactionId::from("dockers");
        let err = ledgers.debit(&dockers, ResourceKind::Money, 50.0).unwrap_err();
        assert!(matches!(err, LedgerError::Insufficient { .. }));
        assert_eq!(ledgers.balance(&dockers, ResourceKind::Money), Some(10.0));
    }

    #[test]
    fn test_transfer_to_unknown_faction_changes_nothing() {
        let mut ledgers = ledgers();
        let red = FactionId::from("red_hand");
        let err = ledgers
            .transfer(&red, &FactionId::from("ghosts"), ResourceKind::Money, 10.0, 7.0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownFaction(_)));
        assert_eq!(ledgers.balance(&red, ResourceKind::Money), Some(100.0));
    }

    #[test]
    fn test_transfer_with_discount() {
        let mut ledgers = ledgers();
        let red = FactionId::from("red_hand");
        let dockers = FactionId::from("dockers");
        ledgers.transfer(&red, &dockers, ResourceKind::Money, 10.0, 7.0).unwrap();
        assert_eq!(ledgers.balance(&red, ResourceKind::Money), Some(90.0));
        assert_eq!(ledgers.balance(&dockers, ResourceKind::Money), Some(17.0));
    }
}
