use crate::store::{BALANCES_KEY, BalanceSnapshot, BalanceStore, decode_snapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "balances";

/// Balance blob stored in a fjall keyspace under the data directory.
pub struct DiskStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskStore {
    pub fn open(data_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_path)
            .with_context(|| format!("Failed to create directory: {}", data_path.display()))?;

        let keyspace = fjall::Config::new(data_path.join("fjall_db"))
            .open()
            .with_context(|| format!("Failed to open store at {}", data_path.display()))?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened balance store at {}", data_path.display());

        Ok(Self {
            keyspace,
            partition,
        })
    }
}

#[async_trait]
impl BalanceStore for DiskStore {
    async fn load(&self) -> Result<Option<BalanceSnapshot>> {
        match self.partition.get(BALANCES_KEY)? {
            Some(blob) => {
                debug!("Store HIT for key: {}", BALANCES_KEY);
                let snapshot = decode_snapshot(&blob)
                    .with_context(|| format!("Failed to parse stored {BALANCES_KEY}"))?;
                Ok(Some(snapshot))
            }
            None => {
                debug!("Store MISS for key: {}", BALANCES_KEY);
                Ok(None)
            }
        }
    }

    async fn save(&self, snapshot: &BalanceSnapshot) -> Result<()> {
        self.partition
            .insert(BALANCES_KEY, serde_json::to_vec(snapshot)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Store PUT for key: {}", BALANCES_KEY);
        Ok(())
    }
}
