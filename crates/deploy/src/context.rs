//! Network configuration and the `Chainrig.toml` file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::manifest::{SuiteManifest, UnitSpec, WiringSpec};

/// The default name for the chainrig configuration file.
pub const CHAINRIG_FILENAME: &str = "Chainrig.toml";

/// Default bound on a single external deploy/call, in seconds.
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;

fn default_call_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}

/// Settings for one target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContext {
    /// JSON-RPC endpoint of the node.
    pub endpoint_url: String,
    /// Account the node signs with; the `from` field of every transaction.
    pub sender: String,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub network_id: u64,
    /// Bound on each external deploy/call, in seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Unit name -> address. Units present here skip fresh deployment and
    /// are recorded with the given address directly.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pre_existing: BTreeMap<String, String>,
}

impl NetworkContext {
    /// Per-call timeout as a [`Duration`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Check the endpoint URL parses before any network traffic happens.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.endpoint_url)
            .with_context(|| format!("Invalid endpoint URL '{}'", self.endpoint_url))?;
        Ok(())
    }
}

/// The full `Chainrig.toml` contents: the contract suite plus the networks
/// it can be deployed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainrigConfig {
    #[serde(default)]
    pub units: Vec<UnitSpec>,
    #[serde(default)]
    pub wiring: Vec<WiringSpec>,
    pub networks: BTreeMap<String, NetworkContext>,
}

impl ChainrigConfig {
    /// The contract suite declared in this config.
    pub fn suite(&self) -> SuiteManifest {
        SuiteManifest {
            units: self.units.clone(),
            wiring: self.wiring.clone(),
        }
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize chainrig config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Chainrig.toml`
    /// inside the given directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(CHAINRIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Select a network by name.
    pub fn network(&self, name: &str) -> Result<&NetworkContext> {
        self.networks.get(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown network '{}'; configured networks: {}",
                name,
                self.networks
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }
}
