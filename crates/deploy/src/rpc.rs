//! Default chain collaborator: JSON-RPC over HTTP.
//!
//! Deploys by sending a contract-creation transaction and polling for its
//! receipt; calls methods by encoding a keccak selector plus 32-byte
//! address words. The per-operation wait is bounded by the caller through
//! the network context's call timeout, not here.

use std::path::PathBuf;
use std::time::Duration;

use alloy_core::primitives::keccak256;
use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::chain::{CallReceipt, ChainCaller, ChainDeployer, ChainError, DeployReceipt};
use crate::context::NetworkContext;

/// Timeout for a single HTTP round-trip (not the whole operation).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between receipt polling attempts.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// JSON-RPC chain client.
///
/// `artifacts_dir` holds one hex-encoded creation-bytecode file per
/// artifact reference.
#[derive(Debug, Clone)]
pub struct HttpChain {
    client: reqwest::Client,
    artifacts_dir: PathBuf,
}

/// Internal failure carrying the transient/permanent classification before
/// it is wrapped into a [`ChainError`] variant.
struct RpcFailure {
    message: String,
    transient: bool,
}

impl RpcFailure {
    fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

impl HttpChain {
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            artifacts_dir: artifacts_dir.into(),
        })
    }

    /// Make a JSON-RPC call, returning the raw `result` value.
    async fn rpc_call(
        &self,
        url: &str,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, RpcFailure> {
        let response = self
            .client
            .post(url)
            .json(&json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .map_err(|e| RpcFailure::transient(format!("failed to send {method}: {e}")))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcFailure::transient(format!("failed to parse {method} response: {e}")))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error")
                .to_string();
            let transient = is_transient_message(&message);
            return Err(RpcFailure { message, transient });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| RpcFailure::permanent(format!("no result in {method} response")))
    }

    /// Send a transaction and wait for its receipt.
    ///
    /// Polls until the node returns a receipt; the caller's per-call timeout
    /// bounds the overall wait.
    async fn send_and_confirm(
        &self,
        ctx: &NetworkContext,
        tx: Value,
    ) -> Result<(String, Value), RpcFailure> {
        let tx_hash = self
            .rpc_call(&ctx.endpoint_url, "eth_sendTransaction", vec![tx])
            .await?
            .as_str()
            .ok_or_else(|| RpcFailure::permanent("transaction hash is not a string"))?
            .to_string();

        tracing::debug!(tx_hash = %tx_hash, "Transaction sent, awaiting receipt...");

        loop {
            let receipt = self
                .rpc_call(
                    &ctx.endpoint_url,
                    "eth_getTransactionReceipt",
                    vec![json!(tx_hash)],
                )
                .await?;
            if !receipt.is_null() {
                if receipt.get("status").and_then(|s| s.as_str()) == Some("0x0") {
                    return Err(RpcFailure::permanent("transaction reverted"));
                }
                return Ok((tx_hash, receipt));
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    /// Verify the node reports the configured network id before any
    /// transaction is sent.
    pub async fn check_network(&self, ctx: &NetworkContext) -> Result<()> {
        let result = self
            .rpc_call(&ctx.endpoint_url, "net_version", vec![])
            .await
            .map_err(|f| anyhow::anyhow!("net_version failed: {}", f.message))?;
        let reported = result
            .as_str()
            .map(str::to_string)
            .or_else(|| result.as_u64().map(|n| n.to_string()))
            .context("net_version result is not a string")?;
        if reported != ctx.network_id.to_string() {
            anyhow::bail!(
                "Node reports network id {reported}, expected {}",
                ctx.network_id
            );
        }
        Ok(())
    }

    fn load_bytecode(&self, artifact: &str) -> Result<String, RpcFailure> {
        let path = self.artifacts_dir.join(artifact);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            RpcFailure::permanent(format!("failed to read artifact {}: {e}", path.display()))
        })?;
        let bytecode = raw.trim().trim_start_matches("0x").to_string();
        if bytecode.is_empty() || !bytecode.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RpcFailure::permanent(format!(
                "artifact {} is not hex bytecode",
                path.display()
            )));
        }
        Ok(bytecode)
    }
}

impl ChainDeployer for HttpChain {
    async fn deploy(
        &self,
        artifact: &str,
        args: &[String],
        ctx: &NetworkContext,
    ) -> Result<DeployReceipt, ChainError> {
        let to_deploy_error = |f: RpcFailure| ChainError::Deploy {
            artifact: artifact.to_string(),
            message: f.message,
            transient: f.transient,
        };

        let mut data = self.load_bytecode(artifact).map_err(to_deploy_error)?;
        for arg in args {
            data.push_str(
                &encode_word(arg).map_err(|m| to_deploy_error(RpcFailure::permanent(m)))?,
            );
        }

        let tx = json!({
            "from": ctx.sender,
            "data": format!("0x{data}"),
            "gas": format!("0x{:x}", ctx.gas_limit),
            "gasPrice": format!("0x{:x}", ctx.gas_price),
        });

        let (tx_hash, receipt) = self
            .send_and_confirm(ctx, tx)
            .await
            .map_err(to_deploy_error)?;

        let address = receipt
            .get("contractAddress")
            .and_then(|a| a.as_str())
            .ok_or_else(|| {
                to_deploy_error(RpcFailure::permanent("receipt has no contract address"))
            })?
            .to_string();
        let block_number = parse_hex_u64(&receipt, "blockNumber");

        Ok(DeployReceipt {
            address,
            tx_hash,
            block_number,
        })
    }
}

impl ChainCaller for HttpChain {
    async fn call(
        &self,
        address: &str,
        method: &str,
        args: &[String],
        ctx: &NetworkContext,
    ) -> Result<CallReceipt, ChainError> {
        let to_call_error = |f: RpcFailure| ChainError::Call {
            address: address.to_string(),
            method: method.to_string(),
            message: f.message,
            transient: f.transient,
        };

        let data =
            encode_call(method, args).map_err(|m| to_call_error(RpcFailure::permanent(m)))?;

        let tx = json!({
            "from": ctx.sender,
            "to": address,
            "data": data,
            "gas": format!("0x{:x}", ctx.gas_limit),
            "gasPrice": format!("0x{:x}", ctx.gas_price),
        });

        let (tx_hash, receipt) = self.send_and_confirm(ctx, tx).await.map_err(to_call_error)?;
        let block_number = parse_hex_u64(&receipt, "blockNumber");

        Ok(CallReceipt {
            tx_hash,
            block_number,
        })
    }
}

/// Heuristic classification of node error messages worth retrying.
fn is_transient_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    ["nonce", "timeout", "underpriced", "connection", "busy", "try again"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

fn parse_hex_u64(value: &Value, key: &str) -> u64 {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        .unwrap_or(0)
}

/// ABI-encode a call whose arguments are all addresses.
///
/// The wiring calls in scope register one contract's address with another,
/// so the signature is `method(address,...)`.
fn encode_call(method: &str, args: &[String]) -> Result<String, String> {
    let signature = format!("{method}({})", vec!["address"; args.len()].join(","));
    let hash = keccak256(signature.as_bytes());
    let mut data = format!("0x{}", hex::encode(&hash[..4]));
    for arg in args {
        data.push_str(&encode_word(arg)?);
    }
    Ok(data)
}

/// Encode one value as a 32-byte word: `0x`-hex values are left-padded,
/// bare decimals are encoded as unsigned integers.
fn encode_word(value: &str) -> Result<String, String> {
    if let Some(hex_part) = value.strip_prefix("0x") {
        if hex_part.is_empty() || hex_part.len() > 64 {
            return Err(format!("cannot encode '{value}' as a 32-byte word"));
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("'{value}' contains non-hex characters"));
        }
        return Ok(format!("{:0>64}", hex_part.to_lowercase()));
    }
    match value.parse::<u128>() {
        Ok(number) => Ok(format!("{number:064x}")),
        Err(_) => Err(format!("cannot encode '{value}' as a 32-byte word")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_known_vector() {
        // transfer(address,uint256) is the canonical ERC-20 selector.
        let hash = keccak256(b"transfer(address,uint256)");
        assert_eq!(hex::encode(&hash[..4]), "a9059cbb");
    }

    #[test]
    fn encode_call_produces_selector_plus_words() {
        let data = encode_call(
            "addFriend",
            &["0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string()],
        )
        .unwrap();

        let expected_selector = hex::encode(&keccak256(b"addFriend(address)")[..4]);
        assert!(data.starts_with(&format!("0x{expected_selector}")));
        // "0x" + 8 selector chars + one 64-char word.
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(
            data.ends_with("00000000000000000000000070997970c51812dc3a010c7d01b50e0d17dc79c8")
        );
    }

    #[test]
    fn encode_word_pads_addresses() {
        let word = encode_word("0xdeadbeef").unwrap();
        assert_eq!(word.len(), 64);
        assert!(word.ends_with("deadbeef"));
        assert!(word.starts_with("0000"));
    }

    #[test]
    fn encode_word_handles_decimals() {
        assert_eq!(
            encode_word("36").unwrap(),
            "0000000000000000000000000000000000000000000000000000000000000024"
        );
    }

    #[test]
    fn encode_word_rejects_garbage() {
        assert!(encode_word("not-a-value").is_err());
        assert!(encode_word("0x").is_err());
        assert!(encode_word("0xZZ").is_err());
        let oversized = format!("0x{}", "f".repeat(65));
        assert!(encode_word(&oversized).is_err());
    }

    #[test]
    fn transient_messages_are_classified() {
        assert!(is_transient_message("Nonce too low"));
        assert!(is_transient_message("request timeout"));
        assert!(is_transient_message("replacement transaction underpriced"));
        assert!(!is_transient_message("execution reverted"));
        assert!(!is_transient_message("out of gas"));
    }
}
