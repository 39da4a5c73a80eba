//! User-visible outcome of a deployment run.

use std::fmt;

use comfy_table::Table;

use crate::chain::ChainError;
use crate::executor::RunError;
use crate::graph::WiringAction;
use crate::ledger::{AddressLedger, AddressRecord};
use crate::wiring::WiringError;

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every unit deployed and every wiring action applied.
    Completed,
    /// The first run-time error, and the unit being processed when it hit.
    Halted { unit: String, error: RunError },
    /// Cancelled at a between-units checkpoint; `remaining` were never
    /// attempted.
    Aborted { remaining: Vec<String> },
}

/// Classification of the error that ended a run, used for exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorClass {
    Deploy,
    Call,
    Timeout,
    Wiring,
    Internal,
}

impl RunError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RunError::Chain(err) => chain_class(err),
            RunError::Wiring(WiringError::Chain(err)) => chain_class(err),
            RunError::Wiring(WiringError::NotDeployed { .. }) => ErrorClass::Wiring,
            RunError::Ledger(_) | RunError::UnresolvedReference { .. } => ErrorClass::Internal,
        }
    }
}

fn chain_class(err: &ChainError) -> ErrorClass {
    match err {
        ChainError::Deploy { .. } => ErrorClass::Deploy,
        ChainError::Call { .. } => ErrorClass::Call,
        ChainError::Timeout(_) => ErrorClass::Timeout,
    }
}

/// The full list of successfully deployed units with addresses, the wiring
/// performed, and the single error that halted further progress, if any.
#[derive(Debug)]
pub struct RunReport {
    ledger: AddressLedger,
    wired: Vec<WiringAction>,
    outcome: RunOutcome,
}

impl RunReport {
    pub(crate) fn new(ledger: AddressLedger, wired: Vec<WiringAction>, outcome: RunOutcome) -> Self {
        Self {
            ledger,
            wired,
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    /// Deployed units in name order.
    pub fn deployed(&self) -> impl Iterator<Item = &AddressRecord> {
        self.ledger.records()
    }

    pub fn wired(&self) -> &[WiringAction] {
        &self.wired
    }

    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    /// Render the deployed units as a table.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["Unit", "Address", "Deployed at"]);
        for rec in self.deployed() {
            table.add_row(vec![
                rec.unit.clone(),
                rec.address.clone(),
                rec.deployed_at.to_string(),
            ]);
        }
        table
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            RunOutcome::Completed => writeln!(f, "Run Status: COMPLETED")?,
            RunOutcome::Halted { unit, error } => {
                writeln!(f, "Run Status: HALTED at '{}' ({})", unit, error.class())?;
                writeln!(f, "  error: {}", error)?;
            }
            RunOutcome::Aborted { remaining } => {
                writeln!(f, "Run Status: ABORTED ({} units not attempted)", remaining.len())?;
            }
        }
        writeln!(f)?;

        writeln!(f, "=== Deployed units ===")?;
        for rec in self.deployed() {
            writeln!(f, "  {} {} ({})", rec.unit, rec.address, rec.deployed_at)?;
        }

        writeln!(f, "=== Wiring ===")?;
        for action in &self.wired {
            writeln!(
                f,
                "  {}.{}({})",
                action.target, action.method, action.subject
            )?;
        }

        Ok(())
    }
}
