//! Optimized storage layer using RocksDB

use crate::config::StorageConfig;
use crate::errors::{StorageError, StorageResult};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct OptimizedStorage {
    db: Arc<DB>,
}

impl OptimizedStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::open(path, 64)
    }

    pub fn new_with_config(config: &StorageConfig) -> StorageResult<Self> {
        if config.clear_on_start {
            let _ = std::fs::remove_dir_all(&config.data_directory);
        }
        Self::open(&config.data_directory, config.write_buffer_size_mb)
    }

    fn open<P: AsRef<Path>>(path: P, write_buffer_size_mb: usize) -> StorageResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)
            .map_err(|e| StorageError::DatabaseOpenFailed(e.to_string()))?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::ReadFailed(e.to_string()))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.db.put(key, value).map_err(StorageError::from)
    }

    pub fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.db.delete(key).map_err(StorageError::from)
    }

    /// Apply a prepared batch atomically
    pub fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        self.db.write(batch).map_err(StorageError::from)
    }

    /// Scan keys sharing `prefix` in ascending order.
    ///
    /// `after` is an exclusive cursor: the scan resumes strictly past it.
    pub fn scan_prefix(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
        limit: usize,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let start = after.unwrap_or(prefix);
        let iter = self
            .db
            .iterator(IteratorMode::From(start, Direction::Forward));

        let mut rows = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            if after.map_or(false, |cursor| key.as_ref() == cursor) {
                continue;
            }
            rows.push((key.to_vec(), value.to_vec()));
            if rows.len() >= limit {
                break;
            }
        }
        Ok(rows)
    }
}
