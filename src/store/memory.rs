use crate::store::{BALANCES_KEY, BalanceSnapshot, BalanceStore, decode_snapshot};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Keeps the serialized blob in a map, the same shape the disk store writes.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `snapshot`, as if saved by an earlier run.
    pub fn with_snapshot(snapshot: &BalanceSnapshot) -> Result<Self> {
        let mut blobs = HashMap::new();
        blobs.insert(BALANCES_KEY.to_string(), serde_json::to_vec(snapshot)?);
        Ok(Self {
            inner: Arc::new(Mutex::new(blobs)),
        })
    }

    /// A store holding a raw blob, e.g. one written by another build.
    #[cfg(test)]
    pub(crate) fn with_blob(blob: &[u8]) -> Self {
        let mut blobs = HashMap::new();
        blobs.insert(BALANCES_KEY.to_string(), blob.to_vec());
        Self {
            inner: Arc::new(Mutex::new(blobs)),
        }
    }
}

#[async_trait]
impl BalanceStore for MemoryStore {
    async fn load(&self) -> Result<Option<BalanceSnapshot>> {
        let blobs = self.inner.lock().await;
        match blobs.get(BALANCES_KEY) {
            Some(blob) => {
                debug!("Store HIT for key: {}", BALANCES_KEY);
                Ok(Some(decode_snapshot(blob)?))
            }
            None => {
                debug!("Store MISS for key: {}", BALANCES_KEY);
                Ok(None)
            }
        }
    }

    async fn save(&self, snapshot: &BalanceSnapshot) -> Result<()> {
        let blob = serde_json::to_vec(snapshot)?;
        let mut blobs = self.inner.lock().await;
        blobs.insert(BALANCES_KEY.to_string(), blob);
        debug!("Store PUT for key: {}", BALANCES_KEY);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::TokenSymbol;
    use crate::store::BalanceRecord;

    fn sample() -> BalanceSnapshot {
        let mut snapshot = BalanceSnapshot::new();
        snapshot.insert(
            TokenSymbol::Usdt,
            BalanceRecord {
                balance: "900000000".to_string(),
                decimals: 6,
            },
        );
        snapshot
    }

    #[tokio::test]
    async fn test_memory_store_load_save() {
        let store = MemoryStore::new();

        // Initially, nothing is stored
        assert!(store.load().await.unwrap().is_none());

        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.save(&sample()).await.unwrap();
        assert_eq!(other.load().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_memory_store_with_snapshot() {
        let store = MemoryStore::with_snapshot(&sample()).unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_blob_uses_lowercase_symbols() {
        let store = MemoryStore::new();
        store.save(&sample()).await.unwrap();

        let blobs = store.inner.lock().await;
        let json: serde_json::Value = serde_json::from_slice(&blobs[BALANCES_KEY]).unwrap();
        assert_eq!(json["usdt"]["balance"], "900000000");
        assert_eq!(json["usdt"]["decimals"], 6);
    }
}
