//! Deployments journal: persisted addresses for resuming a halted run.
//!
//! Saved after every run (complete or not) so a retry can re-supply the
//! already-deployed addresses via the pre-existing override map. The journal
//! carries a hash of the suite manifest; resuming against a changed suite is
//! rejected rather than silently mixing incompatible deployments.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::manifest::SuiteManifest;
use crate::report::RunReport;

/// The default name for the deployments journal file.
pub const JOURNAL_FILENAME: &str = "deployments.json";

/// Persisted record of one network's deployed addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentJournal {
    /// Network name the addresses belong to.
    pub network: String,
    /// SHA-256 hash of the suite manifest these addresses were deployed from.
    pub suite_hash: String,
    pub recorded_at: DateTime<Utc>,
    /// Unit name -> deployed address.
    pub addresses: BTreeMap<String, String>,
}

impl DeploymentJournal {
    /// Capture a run's successful deployments.
    pub fn from_report(network: impl Into<String>, suite_hash: String, report: &RunReport) -> Self {
        let addresses = report
            .deployed()
            .map(|rec| (rec.unit.clone(), rec.address.clone()))
            .collect();
        Self {
            network: network.into(),
            suite_hash,
            recorded_at: Utc::now(),
            addresses,
        }
    }

    /// Save the journal as formatted JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize journal")?;
        std::fs::write(path, json)
            .context(format!("Failed to write journal to {}", path.display()))?;
        tracing::info!(path = %path.display(), entries = self.addresses.len(), "Journal saved");
        Ok(())
    }

    /// Load a journal file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Journal file does not exist: {}", path.display());
        }
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read journal from {}", path.display()))?;
        let journal: Self =
            serde_json::from_str(&content).context("Failed to parse journal JSON")?;
        Ok(journal)
    }

    /// Check this journal belongs to the given suite and network before its
    /// addresses are used to seed a resumed run.
    pub fn check_matches(&self, network: &str, suite_hash: &str) -> Result<()> {
        if self.network != network {
            anyhow::bail!(
                "Journal was recorded for network '{}', not '{}'",
                self.network,
                network
            );
        }
        if self.suite_hash != suite_hash {
            anyhow::bail!(
                "Suite manifest changed since the journal was recorded \
                 (journal hash {}, current {})",
                self.suite_hash,
                suite_hash
            );
        }
        Ok(())
    }
}

/// Deterministic SHA-256 hash of the suite manifest.
pub fn suite_hash(manifest: &SuiteManifest) -> String {
    let json = serde_json::to_string(manifest)
        .expect("SuiteManifest serialization should never fail");
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    hex::encode(hasher.finalize())
}
