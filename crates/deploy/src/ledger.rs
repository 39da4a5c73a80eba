//! Run-scoped ledger of deployed contract addresses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// When a unit's address entered the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployedAt {
    /// Deployed this run; the block number from the deploy receipt.
    Block(u64),
    /// Supplied through the network context's pre-existing address map.
    Provided,
}

impl std::fmt::Display for DeployedAt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployedAt::Block(n) => write!(f, "block {n}"),
            DeployedAt::Provided => write!(f, "pre-existing"),
        }
    }
}

/// One successfully deployed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub unit: String,
    pub address: String,
    pub deployed_at: DeployedAt,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("unit '{0}' is already recorded in this run")]
    AlreadyRecorded(String),
    #[error("unit '{0}' is not deployed")]
    NotDeployed(String),
}

/// Source of truth for "is X already deployed" within one run.
///
/// Records are write-once: a second `record` for the same unit is a bug in
/// the caller (duplicate deployment) and is rejected. Only the executor
/// writes; wiring resolution reads.
#[derive(Debug, Default, Clone)]
pub struct AddressLedger {
    records: BTreeMap<String, AddressRecord>,
}

impl AddressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deployed unit's address.
    pub fn record(
        &mut self,
        unit: impl Into<String>,
        address: impl Into<String>,
        deployed_at: DeployedAt,
    ) -> Result<(), LedgerError> {
        let unit = unit.into();
        if self.records.contains_key(&unit) {
            return Err(LedgerError::AlreadyRecorded(unit));
        }
        self.records.insert(
            unit.clone(),
            AddressRecord {
                unit,
                address: address.into(),
                deployed_at,
            },
        );
        Ok(())
    }

    /// Look up a unit's record.
    ///
    /// `NotDeployed` means "dependency not ready" to readiness-probing
    /// callers; the executor treats it as an internal ordering violation.
    pub fn lookup(&self, unit: &str) -> Result<&AddressRecord, LedgerError> {
        self.records
            .get(unit)
            .ok_or_else(|| LedgerError::NotDeployed(unit.to_string()))
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.records.contains_key(unit)
    }

    /// All records, ordered by unit name.
    pub fn records(&self) -> impl Iterator<Item = &AddressRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
