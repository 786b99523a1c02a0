//! sled-backed [`Store`].
//!
//! Everything lives in one named tree, `shade`. Family-first keys keep each
//! family contiguous, so prefix scans are range scans. sled is thread-safe
//! on its own, so the store is shared by `Arc` without extra locking.

use sled::{Db, Tree};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Store, StoreError, StoreResult};

const TREE_NAME: &str = "shade";

#[derive(Debug)]
pub struct SledStore {
    db: Db,
    records: Tree,
    closed: AtomicBool,
}

impl SledStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// An in-memory sled instance, removed on drop.
    pub fn open_temporary() -> StoreResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let records = db.open_tree(TREE_NAME)?;
        Ok(Self {
            db,
            records,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Store for SledStore {
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        self.records.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.records.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn iterate(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        self.ensure_open()?;
        let mut out = Vec::new();
        for item in self.records.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::Serialization(format!("non-UTF-8 key: {}", e)))?;
            out.push((key, value.to_vec()));
        }
        Ok(out)
    }

    fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.db.flush()?;
        tracing::debug!("sled store flushed and closed");
        Ok(())
    }
}
