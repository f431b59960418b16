//! World state backed by RocksDB
//!
//! # Column Families
//!
//! - `world_state` - every ledger key (balances, supply, metadata, `tx_*` log)

use crate::{
    state::{StateIter, WorldState, WriteSet},
    Config, Error, Result,
};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;

/// Column family holding the world state
const CF_WORLD_STATE: &str = "world_state";

/// RocksDB world state
pub struct RocksState {
    db: Arc<DB>,
}

impl RocksState {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            CF_WORLD_STATE,
            Self::cf_options_world_state(),
        )];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)
            .map_err(|e| Error::read(path.display().to_string(), e))?;

        tracing::info!("Opened RocksDB world state at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_world_state() -> Options {
        let mut opts = Options::default();
        // Point reads dominate; keep them cheap
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(CF_WORLD_STATE)
            .ok_or_else(|| Error::read(CF_WORLD_STATE, "column family not found"))
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

impl WorldState for RocksState {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle()?;
        self.db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| Error::read(key, e))
    }

    fn put_state(&self, key: &str, value: &[u8]) -> Result<()> {
        let cf = self.cf_handle()?;
        self.db
            .put_cf(&cf, key.as_bytes(), value)
            .map_err(|e| Error::write(key, e))
    }

    fn commit(&self, writes: WriteSet) -> Result<()> {
        let cf = self.cf_handle()?;
        let mut batch = WriteBatch::default();
        let count = writes.len();

        for (key, value) in writes.iter() {
            batch.put_cf(&cf, key.as_bytes(), value);
        }

        // Atomic commit
        self.db
            .write(batch)
            .map_err(|e| Error::write(format!("write-set of {} keys", count), e))?;

        tracing::debug!(keys = count, "Write-set committed");
        Ok(())
    }

    fn scan_prefix<'a>(&'a self, prefix: &str) -> Result<StateIter<'a>> {
        let cf = self.cf_handle()?;
        let prefix = prefix.to_string();
        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
        );

        let entries = iter
            .map(|item| {
                let (key, value) = item.map_err(|e| Error::read("prefix scan", e))?;
                let key = String::from_utf8(key.into_vec())
                    .map_err(|e| Error::decode("prefix scan key", e))?;
                Ok((key, value.into_vec()))
            })
            .take_while(move |item: &Result<(String, Vec<u8>)>| match item {
                Ok((key, _)) => key.starts_with(&prefix),
                Err(_) => true,
            });

        Ok(Box::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = RocksState::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_WORLD_STATE).is_some());
    }

    #[test]
    fn test_get_put() {
        let (config, _temp) = test_config();
        let storage = RocksState::open(&config).unwrap();

        assert_eq!(storage.get_state("alice").unwrap(), None);
        storage.put_state("alice", b"100").unwrap();
        assert_eq!(storage.get_state("alice").unwrap(), Some(b"100".to_vec()));
    }

    #[test]
    fn test_commit_write_set() {
        let (config, _temp) = test_config();
        let storage = RocksState::open(&config).unwrap();

        let mut writes = WriteSet::new();
        writes.put("alice", b"60".to_vec());
        writes.put("bob", b"20".to_vec());
        writes.put("totalSupply", b"80".to_vec());
        storage.commit(writes).unwrap();

        assert_eq!(storage.get_state("bob").unwrap(), Some(b"20".to_vec()));
        assert_eq!(storage.get_state("totalSupply").unwrap(), Some(b"80".to_vec()));
    }

    #[test]
    fn test_prefix_scan_stops_at_prefix_end() {
        let (config, _temp) = test_config();
        let storage = RocksState::open(&config).unwrap();

        storage.put_state("tx_alice_2", b"b").unwrap();
        storage.put_state("tx_alice_1", b"a").unwrap();
        storage.put_state("tx_bob_1", b"c").unwrap();
        storage.put_state("tx_ali", b"d").unwrap();

        let keys: Vec<String> = storage
            .scan_prefix("tx_alice_")
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(keys, vec!["tx_alice_1", "tx_alice_2"]);
    }

    #[test]
    fn test_reopen_keeps_state() {
        let (config, _temp) = test_config();
        {
            let storage = RocksState::open(&config).unwrap();
            storage.put_state("name", b"Kalp Token").unwrap();
            storage.close().unwrap();
        }
        let storage = RocksState::open(&config).unwrap();
        assert_eq!(storage.get_state("name").unwrap(), Some(b"Kalp Token".to_vec()));
    }
}
