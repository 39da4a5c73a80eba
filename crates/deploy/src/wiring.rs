//! Post-deploy wiring: registering one deployed unit's address with another.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::chain::{self, CallReceipt, ChainCaller, ChainError};
use crate::context::NetworkContext;
use crate::graph::WiringAction;
use crate::ledger::AddressLedger;

#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    #[error("wiring '{method}' needs '{unit}' which is not deployed")]
    NotDeployed { unit: String, method: String },
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Executes a single wiring action against an already-deployed target.
///
/// Transient chain errors are retried with exponential backoff up to
/// `max_retries`; permanent errors surface on first occurrence. The runner
/// does not deduplicate successful calls; the executor dispatches each
/// action at most once per run.
#[derive(Debug, Clone)]
pub struct WiringRunner {
    max_retries: usize,
    min_delay: Duration,
}

impl Default for WiringRunner {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(500),
        }
    }
}

impl WiringRunner {
    pub fn new(max_retries: usize, min_delay: Duration) -> Self {
        Self {
            max_retries,
            min_delay,
        }
    }

    /// Resolve both endpoints and issue `target.method(subject.address)`.
    ///
    /// Fails with [`WiringError::NotDeployed`] before any chain call if
    /// either endpoint is missing from the ledger.
    pub async fn execute<C: ChainCaller>(
        &self,
        action: &WiringAction,
        ledger: &AddressLedger,
        ctx: &NetworkContext,
        chain: &C,
    ) -> Result<CallReceipt, WiringError> {
        let resolve = |unit: &str| {
            ledger
                .lookup(unit)
                .map(|rec| rec.address.clone())
                .map_err(|_| WiringError::NotDeployed {
                    unit: unit.to_string(),
                    method: action.method.clone(),
                })
        };
        let subject_address = resolve(&action.subject)?;
        let target_address = resolve(&action.target)?;

        let args = [subject_address];
        let attempt = || {
            chain::with_timeout(
                ctx.call_timeout(),
                chain.call(&target_address, &action.method, &args, ctx),
            )
        };

        let receipt = attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.min_delay)
                    .with_max_times(self.max_retries),
            )
            .when(ChainError::is_transient)
            .notify(|err, dur| {
                tracing::warn!(
                    error = %err,
                    retry_in = ?dur,
                    method = %action.method,
                    target = %action.target,
                    "Transient wiring failure, retrying..."
                );
            })
            .await?;

        tracing::info!(
            subject = %action.subject,
            target = %action.target,
            method = %action.method,
            tx_hash = %receipt.tx_hash,
            "Wiring action applied"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DeployedAt;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Chain caller that fails a preset number of times before succeeding.
    struct FlakyCaller {
        failures_left: Mutex<usize>,
        transient: bool,
        calls: Mutex<usize>,
    }

    impl FlakyCaller {
        fn new(failures: usize, transient: bool) -> Self {
            Self {
                failures_left: Mutex::new(failures),
                transient,
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl ChainCaller for FlakyCaller {
        async fn call(
            &self,
            address: &str,
            method: &str,
            _args: &[String],
            _ctx: &NetworkContext,
        ) -> Result<CallReceipt, ChainError> {
            *self.calls.lock().unwrap() += 1;
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(ChainError::Call {
                    address: address.to_string(),
                    method: method.to_string(),
                    message: "nonce too low".to_string(),
                    transient: self.transient,
                });
            }
            Ok(CallReceipt {
                tx_hash: "0xfeed".to_string(),
                block_number: 12,
            })
        }
    }

    fn test_ctx() -> NetworkContext {
        NetworkContext {
            endpoint_url: "http://localhost:8545/".to_string(),
            sender: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string(),
            gas_limit: 10_000_000,
            gas_price: 0,
            network_id: 1337,
            call_timeout_secs: 5,
            pre_existing: BTreeMap::new(),
        }
    }

    fn wired_ledger() -> AddressLedger {
        let mut ledger = AddressLedger::new();
        ledger
            .record("manager", "0xAAA", DeployedAt::Block(1))
            .unwrap();
        ledger
            .record("slots", "0xBBB", DeployedAt::Block(2))
            .unwrap();
        ledger
    }

    fn add_friend() -> WiringAction {
        WiringAction {
            subject: "slots".to_string(),
            target: "manager".to_string(),
            method: "addFriend".to_string(),
        }
    }

    fn fast_runner() -> WiringRunner {
        WiringRunner::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let chain = FlakyCaller::new(2, true);
        let receipt = fast_runner()
            .execute(&add_friend(), &wired_ledger(), &test_ctx(), &chain)
            .await
            .unwrap();
        assert_eq!(receipt.tx_hash, "0xfeed");
        assert_eq!(chain.call_count(), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let chain = FlakyCaller::new(1, false);
        let err = fast_runner()
            .execute(&add_friend(), &wired_ledger(), &test_ctx(), &chain)
            .await
            .unwrap_err();
        assert!(matches!(err, WiringError::Chain(ChainError::Call { .. })));
        assert_eq!(chain.call_count(), 1);
    }

    #[tokio::test]
    async fn retry_bound_is_respected() {
        let chain = FlakyCaller::new(usize::MAX, true);
        let err = fast_runner()
            .execute(&add_friend(), &wired_ledger(), &test_ctx(), &chain)
            .await
            .unwrap_err();
        assert!(matches!(err, WiringError::Chain(ChainError::Call { .. })));
        // Initial attempt plus three retries.
        assert_eq!(chain.call_count(), 4);
    }

    #[tokio::test]
    async fn undeployed_target_issues_no_chain_calls() {
        let chain = FlakyCaller::new(0, true);
        let mut ledger = AddressLedger::new();
        ledger
            .record("slots", "0xBBB", DeployedAt::Block(2))
            .unwrap();

        let err = fast_runner()
            .execute(&add_friend(), &ledger, &test_ctx(), &chain)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WiringError::NotDeployed { unit, .. } if unit == "manager"
        ));
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_ledger_reports_subject_first() {
        let chain = FlakyCaller::new(0, true);
        let ledger = AddressLedger::new();
        let err = fast_runner()
            .execute(&add_friend(), &ledger, &test_ctx(), &chain)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WiringError::NotDeployed { unit, .. } if unit == "slots"
        ));
        assert_eq!(chain.call_count(), 0);
    }
}
