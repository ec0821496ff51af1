//! Persistence port for the balance ledger.
//!
//! The whole balance map is stored as one JSON blob under [`BALANCES_KEY`].

pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::token::TokenSymbol;
use anyhow::Result;
use async_trait::async_trait;
use disk::DiskStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

pub const BALANCES_KEY: &str = "token-balances";

/// One persisted balance, minor units as an integer string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub balance: String,
    pub decimals: u32,
}

pub type BalanceSnapshot = BTreeMap<TokenSymbol, BalanceRecord>;

#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// The last saved snapshot, or `None` on first run.
    async fn load(&self) -> Result<Option<BalanceSnapshot>>;

    async fn save(&self, snapshot: &BalanceSnapshot) -> Result<()>;
}

/// Parses a stored blob. Entries for symbols this build does not know, or
/// that are not balance records, are skipped.
pub(crate) fn decode_snapshot(blob: &[u8]) -> Result<BalanceSnapshot> {
    let entries: BTreeMap<String, Value> = serde_json::from_slice(blob)?;

    let mut snapshot = BalanceSnapshot::new();
    for (key, value) in entries {
        let Ok(symbol) = key.parse::<TokenSymbol>() else {
            warn!("Skipping stored balance for unknown token '{}'", key);
            continue;
        };
        match serde_json::from_value::<BalanceRecord>(value) {
            Ok(record) => {
                snapshot.insert(symbol, record);
            }
            Err(e) => warn!("Skipping malformed stored balance for {}: {}", symbol, e),
        }
    }
    Ok(snapshot)
}

/// Opens the fjall-backed store under the configured data path.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn BalanceStore>> {
    let path = config.default_data_path()?;
    Ok(Arc::new(DiskStore::open(&path)?))
}
