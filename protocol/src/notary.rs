//! # Notary Records
//!
//! Proof that a document existed, and who registered it, without storing
//! the document. A record is keyed by `hex(SHA-256(document))`, signed by
//! the owner over that id, and written under the `notary_tx` family.
//!
//! Verification re-hashes the candidate document and checks the stored
//! signature. Anyone with the document and the store can do it; nobody with
//! only the store learns the document.
//!
//! A record may carry an expiry. Once the notary's clock passes it, the
//! record reads as absent everywhere except `list(true)`, and the document
//! may be registered again.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::anchor::{Clock, SystemClock};
use crate::config::TX_FAMILY_NOTARY;
use crate::crypto::hash::sha256_array;
use crate::crypto::signer::Signer;
use crate::error::{ProtocolError, Result};
use crate::storage::{get_value, notary_key, put_value, scan_values, Store};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotaryRecord {
    pub record_id: String,
    pub tx_family: String,
    pub owner: String,
    pub owner_public_key: Vec<u8>,
    pub registered_at: DateTime<Utc>,
    pub document_hash: [u8; 32],
    pub signature: Vec<u8>,
    /// `None` for records that never expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl NotaryRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

pub struct Notary {
    store: Arc<dyn Store>,
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
}

impl Notary {
    pub fn new(store: Arc<dyn Store>, signer: Arc<dyn Signer>) -> Self {
        Self {
            store,
            signer,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register `document` under the owner's key, with no expiry.
    pub fn register(
        &self,
        document: &[u8],
        private_key: &[u8],
        public_key: &[u8],
    ) -> Result<NotaryRecord> {
        self.register_with_expiry(document, private_key, public_key, None)
    }

    /// Register `document`, expiring `expires_in` from now when given.
    ///
    /// A document with a live record cannot be registered again. An expired
    /// record is replaced.
    pub fn register_with_expiry(
        &self,
        document: &[u8],
        private_key: &[u8],
        public_key: &[u8],
        expires_in: Option<Duration>,
    ) -> Result<NotaryRecord> {
        let now = self.clock.now();
        let expires_at = match expires_in {
            None => None,
            Some(d) if d <= Duration::zero() => {
                return Err(ProtocolError::InvalidValue(
                    "notary expiry must be positive".into(),
                ))
            }
            Some(d) => Some(now.checked_add_signed(d).ok_or_else(|| {
                ProtocolError::InvalidValue(format!(
                    "notary expiry of {}s is out of range",
                    d.num_seconds()
                ))
            })?),
        };

        let document_hash = sha256_array(document);
        let record_id = hex::encode(document_hash);
        let key = notary_key(&record_id);
        if let Some(existing) = get_value::<NotaryRecord>(self.store.as_ref(), &key)? {
            if !existing.is_expired_at(now) {
                return Err(ProtocolError::InvalidValue(format!(
                    "document {} is already notarized",
                    record_id
                )));
            }
        }

        let owner = self.signer.derive_address(public_key)?;
        let signature = self.signer.sign(record_id.as_bytes(), private_key)?;
        if !self.signer.verify(record_id.as_bytes(), public_key, &signature) {
            return Err(ProtocolError::InvalidValue(
                "public key does not match the signing key".into(),
            ));
        }

        let record = NotaryRecord {
            record_id,
            tx_family: TX_FAMILY_NOTARY.to_string(),
            owner,
            owner_public_key: public_key.to_vec(),
            registered_at: now,
            document_hash,
            signature,
            expires_at,
        };
        put_value(self.store.as_ref(), &key, &record)?;
        tracing::info!(
            record_id = %record.record_id,
            owner = %record.owner,
            expires_at = ?record.expires_at,
            "document notarized"
        );
        Ok(record)
    }

    /// The record under `record_id`. Expired records read as absent.
    pub fn get(&self, record_id: &str) -> Result<Option<NotaryRecord>> {
        let record: Option<NotaryRecord> = get_value(self.store.as_ref(), &notary_key(record_id))?;
        let now = self.clock.now();
        Ok(record.filter(|r| !r.is_expired_at(now)))
    }

    /// The record for `document`, if one exists and its signature holds.
    pub fn verify(&self, document: &[u8]) -> Result<Option<NotaryRecord>> {
        let record_id = hex::encode(sha256_array(document));
        let Some(record) = self.get(&record_id)? else {
            return Ok(None);
        };
        let valid = self.signer.verify(
            record.record_id.as_bytes(),
            &record.owner_public_key,
            &record.signature,
        );
        if !valid {
            tracing::warn!(record_id = %record_id, "notary record signature does not verify");
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// All records, oldest first. Expired ones only when `include_expired`.
    pub fn list(&self, include_expired: bool) -> Result<Vec<NotaryRecord>> {
        let prefix = notary_key("");
        let mut records: Vec<NotaryRecord> = scan_values(self.store.as_ref(), &prefix)?;
        if !include_expired {
            let now = self.clock.now();
            records.retain(|r| !r.is_expired_at(now));
        }
        records.sort_by(|a, b| (a.registered_at, &a.record_id).cmp(&(b.registered_at, &b.record_id)));
        Ok(records)
    }
}
