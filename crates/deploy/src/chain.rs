//! Trait seams for the external chain collaborators.
//!
//! The executor and wiring runner are generic over these traits; the default
//! JSON-RPC implementation lives in [`crate::rpc`], and tests substitute
//! in-memory fakes.

use std::time::Duration;

use crate::context::NetworkContext;

/// Result of a successful contract deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReceipt {
    /// Address the contract was created at.
    pub address: String,
    pub tx_hash: String,
    pub block_number: u64,
}

/// Result of a successful contract method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReceipt {
    pub tx_hash: String,
    pub block_number: u64,
}

/// Run-time failures from the chain collaborators.
///
/// `Timeout` is raised by [`with_timeout`] when the caller-supplied limit
/// elapses, keeping it distinguishable from an on-chain rejection.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("deploy of '{artifact}' failed: {message}")]
    Deploy {
        artifact: String,
        message: String,
        transient: bool,
    },
    #[error("call '{method}' on {address} failed: {message}")]
    Call {
        address: String,
        method: String,
        message: String,
        transient: bool,
    },
    #[error("chain call exceeded the {}s timeout", .0.as_secs())]
    Timeout(Duration),
}

impl ChainError {
    /// Whether retrying has a chance of succeeding (transport hiccups, nonce
    /// conflicts, timeouts) as opposed to an on-chain rejection.
    pub fn is_transient(&self) -> bool {
        match self {
            ChainError::Deploy { transient, .. } | ChainError::Call { transient, .. } => *transient,
            ChainError::Timeout(_) => true,
        }
    }
}

/// Deploys contract bytecode with resolved constructor arguments.
pub trait ChainDeployer {
    fn deploy(
        &self,
        artifact: &str,
        args: &[String],
        ctx: &NetworkContext,
    ) -> impl Future<Output = Result<DeployReceipt, ChainError>>;
}

/// Issues a method call against an already-deployed contract.
pub trait ChainCaller {
    fn call(
        &self,
        address: &str,
        method: &str,
        args: &[String],
        ctx: &NetworkContext,
    ) -> impl Future<Output = Result<CallReceipt, ChainError>>;
}

/// Bound an external chain operation by the context's per-call timeout.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, ChainError>>,
) -> Result<T, ChainError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ChainError::Timeout(limit)),
    }
}
