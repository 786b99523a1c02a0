//! # Storage
//!
//! The protocol core talks to persistence through one narrow trait,
//! [`Store`]: `put`, `get`, `iterate(prefix)`, `close`. Keys are UTF-8
//! strings laid out by family, values are bincode.
//!
//! ```text
//! {tx_family}/tx/{tx_id}          bincode(Transaction)
//! {tx_family}/anchor/{tx_id}      bincode(AnchorRecord)
//! notary_tx/record/{record_id}    bincode(NotaryRecord)
//! ```
//!
//! Putting the family first means "every anchor of family X" is one prefix
//! scan, and sled keeps each family contiguous on disk.
//!
//! ## Implementations
//!
//! - [`SledStore`]: durable, embedded. What the node runs on.
//! - [`MemoryStore`]: a `BTreeMap` behind a lock. Tests and throwaway demos.
//!
//! Nothing above this module knows which one it has.

pub mod ledger;
pub mod memory;
pub mod sled_store;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

use crate::config::TX_FAMILY_NOTARY;

pub use ledger::Ledger;
pub use memory::MemoryStore;
pub use sled_store::SledStore;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store is closed")]
    Closed,
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Key-value persistence consumed by the anchor registry, the ledger and
/// the notary.
pub trait Store: Send + Sync + fmt::Debug {
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in key order.
    fn iterate(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Flush and refuse further writes. Idempotent.
    fn close(&self) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

pub fn tx_key(tx_family: &str, tx_id: &str) -> String {
    format!("{}/tx/{}", tx_family, tx_id)
}

pub fn tx_prefix(tx_family: &str) -> String {
    format!("{}/tx/", tx_family)
}

pub fn anchor_key(tx_family: &str, tx_id: &str) -> String {
    format!("{}/anchor/{}", tx_family, tx_id)
}

pub fn anchor_prefix(tx_family: &str) -> String {
    format!("{}/anchor/", tx_family)
}

pub fn notary_key(record_id: &str) -> String {
    format!("{}/record/{}", TX_FAMILY_NOTARY, record_id)
}

// ---------------------------------------------------------------------------
// Typed helpers
// ---------------------------------------------------------------------------

pub fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub fn put_value<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> StoreResult<()> {
    store.put(key, &encode(value)?)
}

pub fn get_value<T: DeserializeOwned>(store: &dyn Store, key: &str) -> StoreResult<Option<T>> {
    store.get(key)?.map(|bytes| decode(&bytes)).transpose()
}

pub fn scan_values<T: DeserializeOwned>(store: &dyn Store, prefix: &str) -> StoreResult<Vec<T>> {
    store
        .iterate(prefix)?
        .into_iter()
        .map(|(_, bytes)| decode(&bytes))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(tx_key("financial_tx", "ab"), "financial_tx/tx/ab");
        assert_eq!(anchor_key("financial_tx", "ab"), "financial_tx/anchor/ab");
        assert_eq!(notary_key("cd"), "notary_tx/record/cd");
        assert!(tx_key("f", "x").starts_with(&tx_prefix("f")));
        assert!(!anchor_key("f", "x").starts_with(&tx_prefix("f")));
    }

    #[test]
    fn typed_helpers_roundtrip() {
        let store = MemoryStore::new();
        put_value(&store, "k/1", &(7u64, "seven".to_string())).unwrap();
        let back: Option<(u64, String)> = get_value(&store, "k/1").unwrap();
        assert_eq!(back, Some((7, "seven".to_string())));
        let missing: Option<u64> = get_value(&store, "k/2").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let store = MemoryStore::new();
        store.put("k", &[1]).unwrap();
        let err = get_value::<String>(&store, "k").unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
