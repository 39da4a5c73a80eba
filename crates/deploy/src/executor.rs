//! Sequential execution of a deployment plan against a target network.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::chain::{self, ChainCaller, ChainDeployer, ChainError};
use crate::context::NetworkContext;
use crate::graph::{ConstructorArg, DeployUnit, DeploymentPlan};
use crate::ledger::{AddressLedger, DeployedAt, LedgerError};
use crate::report::{RunOutcome, RunReport};
use crate::wiring::{WiringError, WiringRunner};

/// Run-time failures that halt a deployment pass.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Wiring(#[from] WiringError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Constructor resolution hit a hole the topological order should have
    /// made impossible. A bug in plan construction, not a chain condition.
    #[error("constructor of '{unit}' references '{dependency}' which is not in the ledger")]
    UnresolvedReference { unit: String, dependency: String },
}

/// Cooperative cancellation flag, honored between plan steps.
///
/// Mid-call cancellation is not attempted: an in-flight transaction is left
/// to resolve on the network.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the run stop at the next between-units checkpoint.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives a [`DeploymentPlan`] in order, recording addresses and dispatching
/// wiring actions as their endpoints become available.
///
/// The executor exclusively owns the [`AddressLedger`] for the duration of
/// the run; the final ledger contents are handed back inside the
/// [`RunReport`].
#[derive(Debug, Default)]
pub struct DeploymentExecutor {
    wiring: WiringRunner,
    abort: AbortHandle,
}

impl DeploymentExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wiring_runner(mut self, wiring: WiringRunner) -> Self {
        self.wiring = wiring;
        self
    }

    /// Handle for requesting cancellation from another task.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Process the plan in order.
    ///
    /// Units present in `ctx.pre_existing` skip fresh deployment and are
    /// recorded with the supplied address. The first run-time error halts
    /// the pass; already-recorded units stay in the report so a later run
    /// can resume via `pre_existing`.
    pub async fn run<C>(
        self,
        plan: &DeploymentPlan,
        ctx: &NetworkContext,
        chain: &C,
    ) -> RunReport
    where
        C: ChainDeployer + ChainCaller,
    {
        let mut ledger = AddressLedger::new();
        let mut wired = Vec::new();
        let mut dispatched: HashSet<usize> = HashSet::new();

        for (idx, unit) in plan.units().iter().enumerate() {
            if self.abort.is_aborted() {
                let remaining = plan.units()[idx..]
                    .iter()
                    .map(|u| u.name.clone())
                    .collect();
                tracing::warn!(unit = %unit.name, "Run aborted before unit");
                return RunReport::new(ledger, wired, RunOutcome::Aborted { remaining });
            }

            if let Err(error) = self.step(unit, &mut ledger, ctx, chain).await {
                tracing::error!(unit = %unit.name, error = %error, "Run halted");
                return RunReport::new(
                    ledger,
                    wired,
                    RunOutcome::Halted {
                        unit: unit.name.clone(),
                        error,
                    },
                );
            }

            // Dispatch every wiring action whose other endpoint is now
            // deployed, each at most once per run.
            for (widx, action) in plan.wiring().iter().enumerate() {
                if dispatched.contains(&widx) {
                    continue;
                }
                let touches_unit = action.subject == unit.name || action.target == unit.name;
                if !touches_unit || !ledger.contains(&action.subject) || !ledger.contains(&action.target)
                {
                    continue;
                }
                dispatched.insert(widx);

                if let Err(error) = self.wiring.execute(action, &ledger, ctx, chain).await {
                    tracing::error!(
                        subject = %action.subject,
                        target = %action.target,
                        method = %action.method,
                        error = %error,
                        "Run halted during wiring"
                    );
                    return RunReport::new(
                        ledger,
                        wired,
                        RunOutcome::Halted {
                            unit: unit.name.clone(),
                            error: error.into(),
                        },
                    );
                }
                wired.push(action.clone());
            }
        }

        tracing::info!(deployed = ledger.len(), wired = wired.len(), "Run complete");
        RunReport::new(ledger, wired, RunOutcome::Completed)
    }

    /// Deploy (or adopt) a single unit and record its address.
    async fn step<C: ChainDeployer>(
        &self,
        unit: &DeployUnit,
        ledger: &mut AddressLedger,
        ctx: &NetworkContext,
        chain: &C,
    ) -> Result<(), RunError> {
        if let Some(address) = ctx.pre_existing.get(&unit.name) {
            tracing::info!(
                unit = %unit.name,
                address = %address,
                "Address already provided, skipping fresh deploy"
            );
            ledger.record(unit.name.as_str(), address.as_str(), DeployedAt::Provided)?;
            return Ok(());
        }

        let args = resolve_args(unit, ledger)?;
        tracing::info!(unit = %unit.name, artifact = %unit.artifact, "Deploying unit...");

        let receipt = chain::with_timeout(
            ctx.call_timeout(),
            chain.deploy(&unit.artifact, &args, ctx),
        )
        .await?;

        tracing::info!(
            unit = %unit.name,
            address = %receipt.address,
            block = receipt.block_number,
            "Unit deployed"
        );
        ledger.record(
            unit.name.as_str(),
            receipt.address.as_str(),
            DeployedAt::Block(receipt.block_number),
        )?;
        Ok(())
    }
}

/// Resolve constructor arguments, substituting deployed addresses for
/// `AddressOf` references.
///
/// A missing reference is an ordering violation: the plan guarantees every
/// referenced unit precedes its dependents.
fn resolve_args(unit: &DeployUnit, ledger: &AddressLedger) -> Result<Vec<String>, RunError> {
    unit.constructor_args
        .iter()
        .map(|arg| match arg {
            ConstructorArg::Literal(value) => Ok(value.clone()),
            ConstructorArg::AddressOf(dep) => ledger
                .lookup(dep)
                .map(|rec| rec.address.clone())
                .map_err(|_| RunError::UnresolvedReference {
                    unit: unit.name.clone(),
                    dependency: dep.clone(),
                }),
        })
        .collect()
}
