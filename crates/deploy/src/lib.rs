//! chainrig-deploy - Dependency-ordered contract deployment library.
//!
//! This crate plans and executes the deployment of a suite of dependent
//! smart contracts: units are deployed in topological order, their addresses
//! recorded in a run-scoped ledger, and post-deploy wiring calls dispatched
//! once both endpoints exist.

mod chain;
mod context;
mod executor;
mod graph;
mod journal;
mod ledger;
mod manifest;
mod report;
mod rpc;
mod wiring;

pub use chain::{CallReceipt, ChainCaller, ChainDeployer, ChainError, DeployReceipt};
pub use context::{CHAINRIG_FILENAME, ChainrigConfig, NetworkContext};
pub use executor::{AbortHandle, DeploymentExecutor, RunError};
pub use graph::{
    ConstructorArg, DependencyGraph, DeployUnit, DeploymentPlan, GraphError, WiringAction,
};
pub use journal::{DeploymentJournal, JOURNAL_FILENAME, suite_hash};
pub use ledger::{AddressLedger, AddressRecord, DeployedAt, LedgerError};
pub use manifest::{SuiteManifest, UnitSpec, WiringSpec};
pub use report::{ErrorClass, RunOutcome, RunReport};
pub use rpc::HttpChain;
pub use wiring::{WiringError, WiringRunner};
