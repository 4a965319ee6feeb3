//! Durable registry implementation on RocksDB.
//!
//! Rows are bincode-encoded under a `node_` key prefix; the failover delay
//! lives under its own key. The promotion CAS is serialized by an internal
//! mutex spanning the active-slot check and the row write, then flushed so
//! a crash cannot roll back a won promotion.

use super::{NodeRegistry, PromotionOutcome};
use crate::error::{HaError, Result};
use crate::types::{NodeRecord, NodeStatus, DEFAULT_FAILOVER_DELAY};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{Cache, Options, DB};
use std::path::Path;
use std::time::Duration;

const NODE_PREFIX: &[u8] = b"node_";
const FAILOVER_DELAY_KEY: &[u8] = b"ha_failover_delay";

/// Node registry persisted in RocksDB.
pub struct RocksRegistry {
    db: DB,
    /// Serializes the promotion check-and-write.
    cas: Mutex<()>,
    /// Delay reported until an administrator sets one.
    default_delay: Duration,
}

impl RocksRegistry {
    /// Open or create a registry at the given path.
    pub fn open<P: AsRef<Path>>(path: P, cache_size: u64) -> Result<Self> {
        Self::open_with_default_delay(path, cache_size, DEFAULT_FAILOVER_DELAY)
    }

    /// Open with a configured default failover delay. A delay set at
    /// runtime is durable and takes precedence over the default.
    pub fn open_with_default_delay<P: AsRef<Path>>(
        path: P,
        cache_size: u64,
        default_delay: Duration,
    ) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let cache = Cache::new_lru_cache(cache_size as usize);
        opts.set_row_cache(&cache);

        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            cas: Mutex::new(()),
            default_delay,
        })
    }

    fn node_key(name: &str) -> Vec<u8> {
        let mut key = NODE_PREFIX.to_vec();
        key.extend_from_slice(name.as_bytes());
        key
    }

    fn load(&self, name: &str) -> Result<Option<NodeRecord>> {
        match self.db.get(Self::node_key(name))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn store(&self, record: &NodeRecord) -> Result<()> {
        let data = bincode::serialize(record)?;
        self.db.put(Self::node_key(&record.name), data)?;
        Ok(())
    }

    fn scan(&self) -> Result<Vec<NodeRecord>> {
        let mut records = Vec::new();
        let iter = self.db.iterator(rocksdb::IteratorMode::From(
            NODE_PREFIX,
            rocksdb::Direction::Forward,
        ));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(NODE_PREFIX) {
                break;
            }
            let record: NodeRecord = bincode::deserialize(&value)?;
            records.push(record);
        }

        Ok(records)
    }
}

#[async_trait]
impl NodeRegistry for RocksRegistry {
    async fn upsert(&self, record: NodeRecord) -> Result<()> {
        self.store(&record)?;
        self.db.flush()?;
        Ok(())
    }

    async fn heartbeat(&self, name: &str, status: NodeStatus, now: DateTime<Utc>) -> Result<()> {
        let mut record = self
            .load(name)?
            .ok_or_else(|| HaError::NodeNotFound(name.to_string()))?;
        record.status = status;
        record.last_seen = now;
        self.store(&record)
    }

    async fn get(&self, name: &str) -> Result<Option<NodeRecord>> {
        self.load(name)
    }

    async fn list(&self) -> Result<Vec<NodeRecord>> {
        // Keys are name-ordered, so the scan already yields stable listings.
        self.scan()
    }

    async fn try_promote(
        &self,
        name: &str,
        failover_delay: Duration,
        now: DateTime<Utc>,
    ) -> Result<PromotionOutcome> {
        let _guard = self.cas.lock();

        if let Some(holder) = self.scan()?.into_iter().find(|r| {
            r.status == NodeStatus::Active && r.name != name && !r.is_stale(failover_delay, now)
        }) {
            return Ok(PromotionOutcome::Lost {
                current_active: holder.name,
            });
        }

        let mut record = self
            .load(name)?
            .ok_or_else(|| HaError::NodeNotFound(name.to_string()))?;
        record.status = NodeStatus::Active;
        record.last_seen = now;
        self.store(&record)?;
        self.db.flush()?;

        Ok(PromotionOutcome::Promoted)
    }

    async fn set_status(&self, name: &str, status: NodeStatus) -> Result<()> {
        let mut record = self
            .load(name)?
            .ok_or_else(|| HaError::NodeNotFound(name.to_string()))?;
        record.status = status;
        self.store(&record)?;
        self.db.flush()?;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        if self.load(name)?.is_none() {
            return Err(HaError::NodeNotFound(name.to_string()));
        }
        self.db.delete(Self::node_key(name))?;
        self.db.flush()?;
        Ok(())
    }

    async fn failover_delay(&self) -> Result<Duration> {
        match self.db.get(FAILOVER_DELAY_KEY)? {
            Some(data) => {
                let secs: u64 = bincode::deserialize(&data)?;
                Ok(Duration::from_secs(secs))
            }
            None => Ok(self.default_delay),
        }
    }

    async fn set_failover_delay(&self, delay: Duration) -> Result<()> {
        let data = bincode::serialize(&delay.as_secs())?;
        self.db.put(FAILOVER_DELAY_KEY, data)?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CACHE: u64 = 1024 * 1024;

    fn record(name: &str, status: NodeStatus, now: DateTime<Utc>) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            address: Some("localhost:10051".to_string()),
            status,
            last_seen: now,
        }
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = tempdir().unwrap();
        let now = Utc::now();

        {
            let registry = RocksRegistry::open(dir.path(), CACHE).unwrap();
            registry
                .upsert(record("node1", NodeStatus::Active, now))
                .await
                .unwrap();
            registry
                .set_failover_delay(Duration::from_secs(10))
                .await
                .unwrap();
        }

        let registry = RocksRegistry::open(dir.path(), CACHE).unwrap();
        let loaded = registry.get("node1").await.unwrap().unwrap();
        assert_eq!(loaded.status, NodeStatus::Active);
        assert_eq!(loaded.address.as_deref(), Some("localhost:10051"));
        assert_eq!(loaded.last_seen, now);
        assert_eq!(
            registry.failover_delay().await.unwrap(),
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn test_default_failover_delay() {
        let dir = tempdir().unwrap();
        let registry = RocksRegistry::open(dir.path(), CACHE).unwrap();
        assert_eq!(
            registry.failover_delay().await.unwrap(),
            DEFAULT_FAILOVER_DELAY
        );
    }

    #[tokio::test]
    async fn test_promote_cas() {
        let dir = tempdir().unwrap();
        let registry = RocksRegistry::open(dir.path(), CACHE).unwrap();
        let now = Utc::now();

        registry
            .upsert(record("node1", NodeStatus::Standby, now))
            .await
            .unwrap();
        registry
            .upsert(record("node2", NodeStatus::Standby, now))
            .await
            .unwrap();

        assert_eq!(
            registry
                .try_promote("node1", Duration::from_secs(10), now)
                .await
                .unwrap(),
            PromotionOutcome::Promoted
        );
        assert_eq!(
            registry
                .try_promote("node2", Duration::from_secs(10), now)
                .await
                .unwrap(),
            PromotionOutcome::Lost {
                current_active: "node1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_list_and_remove() {
        let dir = tempdir().unwrap();
        let registry = RocksRegistry::open(dir.path(), CACHE).unwrap();
        let now = Utc::now();

        registry
            .upsert(record("node2", NodeStatus::Standby, now))
            .await
            .unwrap();
        registry
            .upsert(record("node1", NodeStatus::Stopped, now))
            .await
            .unwrap();

        let records = registry.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "node1");

        registry.remove("node1").await.unwrap();
        assert_eq!(registry.list().await.unwrap().len(), 1);
        assert!(matches!(
            registry.remove("node1").await.unwrap_err(),
            HaError::NodeNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_set_status_keeps_heartbeat() {
        let dir = tempdir().unwrap();
        let registry = RocksRegistry::open(dir.path(), CACHE).unwrap();
        let now = Utc::now();

        registry
            .upsert(record("node1", NodeStatus::Standby, now))
            .await
            .unwrap();
        registry
            .set_status("node1", NodeStatus::Unavailable)
            .await
            .unwrap();

        let loaded = registry.get("node1").await.unwrap().unwrap();
        assert_eq!(loaded.status, NodeStatus::Unavailable);
        assert_eq!(loaded.last_seen, now);
    }
}
