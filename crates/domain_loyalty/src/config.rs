//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tunables for the ledger engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long earned points stay spendable
    pub expiry_days: i64,
    /// Optimistic commit attempts per operation before giving up
    pub max_commit_retries: u32,
    /// Entries fetched per sweep batch; keeps each sweep transaction short
    pub sweep_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expiry_days: 365,
            max_commit_retries: 5,
            sweep_batch_size: 100,
        }
    }
}
