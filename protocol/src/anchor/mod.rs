//! # Anchoring & Cancellation
//!
//! Anchoring a transaction starts a cancellation window. Until the deadline
//! the sender can take it back. Once the deadline passes, and provided
//! every verification check came back clean, the anchor can be finalized.
//!
//! ```text
//!                 cancel_anchor (now < deadline)
//!   ┌─────────┐ ─────────────────────────────────▶ ┌──────────┐
//!   │ Pending │                                    │ Canceled │ ──▶ may be re-anchored
//!   └─────────┘ ─────────────────────────────────▶ └──────────┘
//!        │        finalize (now >= deadline,
//!        │                  all checks passed)
//!        ▼
//!   ┌───────────┐
//!   │ Finalized │  terminal
//!   └───────────┘
//! ```
//!
//! ## Concurrency
//!
//! Records live in a `DashMap` keyed by `tx_id`. Every mutation takes the
//! map entry for the whole read-check-write, so two threads racing on the
//! same `tx_id` are serialized: one anchors, the other gets
//! `AlreadyAnchored`. Different `tx_id`s land on different shards and
//! don't wait on each other.
//!
//! With a store attached, each transition is written through before the
//! in-memory record changes. A failed write leaves the record untouched.

pub mod clock;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::TX_FAMILIES;
use crate::error::{ProtocolError, Result};
use crate::storage::{anchor_key, anchor_prefix, put_value, scan_values, Store};
use crate::transaction::Transaction;

pub use clock::{Clock, ManualClock, SystemClock};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorStatus {
    Pending,
    Finalized,
    Canceled,
}

impl AnchorStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnchorStatus::Pending)
    }
}

impl fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorStatus::Pending => f.write_str("pending"),
            AnchorStatus::Finalized => f.write_str("finalized"),
            AnchorStatus::Canceled => f.write_str("canceled"),
        }
    }
}

/// What was verified about the transaction before or after anchoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationChecks {
    pub signature: bool,
    pub range_proof: bool,
    pub compliance: bool,
}

impl VerificationChecks {
    pub fn all_passed(&self) -> bool {
        self.signature && self.range_proof && self.compliance
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub tx_id: String,
    pub tx_family: String,
    pub anchored_at: DateTime<Utc>,
    pub cancellation_deadline: DateTime<Utc>,
    pub status: AnchorStatus,
    pub checks: VerificationChecks,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Restricts [`AnchorRegistry::list_anchors`]. `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct AnchorFilter {
    pub status: Option<AnchorStatus>,
    pub tx_family: Option<String>,
}

impl AnchorFilter {
    fn matches(&self, record: &AnchorRecord) -> bool {
        self.status.map_or(true, |s| s == record.status)
            && self
                .tx_family
                .as_deref()
                .map_or(true, |f| f == record.tx_family)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct AnchorRegistry {
    records: DashMap<String, AnchorRecord>,
    window: Duration,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn Store>>,
}

impl AnchorRegistry {
    /// In-memory registry on the system clock.
    pub fn new(window: Duration) -> Self {
        Self {
            records: DashMap::new(),
            window,
            clock: Arc::new(SystemClock),
            store: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Write every transition through to `store`.
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn anchor_transaction(
        &self,
        tx: &Transaction,
        checks: VerificationChecks,
    ) -> Result<AnchorRecord> {
        self.anchor(&tx.tx_id, &tx.tx_family, checks)
    }

    /// Anchor by id. A canceled record may be replaced; anything else is
    /// `AlreadyAnchored`.
    pub fn anchor(
        &self,
        tx_id: &str,
        tx_family: &str,
        checks: VerificationChecks,
    ) -> Result<AnchorRecord> {
        let now = self.clock.now();
        let deadline = now.checked_add_signed(self.window).ok_or_else(|| {
            ProtocolError::InvalidValue(format!(
                "cancellation window of {}s overflows the deadline",
                self.window.num_seconds()
            ))
        })?;
        let record = AnchorRecord {
            tx_id: tx_id.to_string(),
            tx_family: tx_family.to_string(),
            anchored_at: now,
            cancellation_deadline: deadline,
            status: AnchorStatus::Pending,
            checks,
            resolved_at: None,
        };

        match self.records.entry(tx_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().status != AnchorStatus::Canceled {
                    tracing::warn!(tx_id, "anchor refused: already anchored");
                    return Err(ProtocolError::AlreadyAnchored {
                        tx_id: tx_id.to_string(),
                    });
                }
                self.persist(&record)?;
                entry.insert(record.clone());
                tracing::info!(tx_id, tx_family, "re-anchored after cancellation");
            }
            Entry::Vacant(entry) => {
                self.persist(&record)?;
                entry.insert(record.clone());
                tracing::info!(
                    tx_id,
                    tx_family,
                    deadline = %record.cancellation_deadline,
                    "transaction anchored"
                );
            }
        }
        Ok(record)
    }

    pub fn verify_anchor(&self, tx_id: &str) -> Result<AnchorRecord> {
        self.records
            .get(tx_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ProtocolError::not_found("anchor", tx_id))
    }

    /// Cancel a pending anchor while its window is open.
    pub fn cancel_anchor(&self, tx_id: &str) -> Result<bool> {
        let mut entry = self
            .records
            .get_mut(tx_id)
            .ok_or_else(|| ProtocolError::not_found("anchor", tx_id))?;
        let current = entry.value();
        if current.status.is_terminal() {
            return Err(ProtocolError::AlreadyFinal {
                tx_id: tx_id.to_string(),
                status: current.status,
            });
        }

        let now = self.clock.now();
        if now >= current.cancellation_deadline {
            tracing::warn!(tx_id, "cancellation refused: window closed");
            return Err(ProtocolError::WindowExpired {
                tx_id: tx_id.to_string(),
                deadline: current.cancellation_deadline,
            });
        }

        let mut updated = current.clone();
        updated.status = AnchorStatus::Canceled;
        updated.resolved_at = Some(now);
        self.persist(&updated)?;
        *entry.value_mut() = updated;
        tracing::info!(tx_id, "anchor canceled");
        Ok(true)
    }

    /// Finalize once the window has closed and every check passed.
    /// `Ok(false)` means "not yet" and leaves the record pending.
    pub fn finalize(&self, tx_id: &str) -> Result<bool> {
        let mut entry = self
            .records
            .get_mut(tx_id)
            .ok_or_else(|| ProtocolError::not_found("anchor", tx_id))?;
        let current = entry.value();
        if current.status.is_terminal() {
            return Err(ProtocolError::AlreadyFinal {
                tx_id: tx_id.to_string(),
                status: current.status,
            });
        }

        let now = self.clock.now();
        if now < current.cancellation_deadline {
            return Ok(false);
        }
        if !current.checks.all_passed() {
            tracing::debug!(tx_id, checks = ?current.checks, "finalization held: checks incomplete");
            return Ok(false);
        }

        let mut updated = current.clone();
        updated.status = AnchorStatus::Finalized;
        updated.resolved_at = Some(now);
        self.persist(&updated)?;
        *entry.value_mut() = updated;
        tracing::info!(tx_id, "anchor finalized");
        Ok(true)
    }

    /// Replace the checks on a pending anchor.
    pub fn record_checks(&self, tx_id: &str, checks: VerificationChecks) -> Result<AnchorRecord> {
        let mut entry = self
            .records
            .get_mut(tx_id)
            .ok_or_else(|| ProtocolError::not_found("anchor", tx_id))?;
        if entry.status.is_terminal() {
            return Err(ProtocolError::AlreadyFinal {
                tx_id: tx_id.to_string(),
                status: entry.status,
            });
        }
        let mut updated = entry.value().clone();
        updated.checks = checks;
        self.persist(&updated)?;
        *entry.value_mut() = updated.clone();
        Ok(updated)
    }

    /// Finalize every eligible pending anchor. Returns the ids finalized.
    pub fn finalize_due(&self) -> Vec<String> {
        let now = self.clock.now();
        // Collect first; finalize() takes the entry lock itself.
        let due: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.status == AnchorStatus::Pending && now >= r.cancellation_deadline)
            .map(|r| r.key().clone())
            .collect();

        let mut finalized = Vec::new();
        for tx_id in due {
            match self.finalize(&tx_id) {
                Ok(true) => finalized.push(tx_id),
                Ok(false) => {}
                Err(e) if e.is_policy_rejection() => {
                    tracing::debug!(tx_id = %tx_id, error = %e, "skipped during sweep");
                }
                Err(e) => tracing::warn!(tx_id = %tx_id, error = %e, "finalization failed"),
            }
        }
        finalized.sort();
        finalized
    }

    /// Snapshot of anchors, ordered by `(anchored_at, tx_id)`.
    pub fn list_anchors(&self, filter: Option<AnchorFilter>) -> Vec<AnchorRecord> {
        let filter = filter.unwrap_or_default();
        let mut out: Vec<AnchorRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        out.sort_by(|a, b| (a.anchored_at, &a.tx_id).cmp(&(b.anchored_at, &b.tx_id)));
        out
    }

    /// Reload persisted anchors. Returns how many were loaded.
    pub fn restore_from_store(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let mut loaded = 0;
        for family in TX_FAMILIES {
            let records: Vec<AnchorRecord> = scan_values(store.as_ref(), &anchor_prefix(family))?;
            for record in records {
                self.records.insert(record.tx_id.clone(), record);
                loaded += 1;
            }
        }
        tracing::info!(loaded, "anchors restored from store");
        Ok(loaded)
    }

    fn persist(&self, record: &AnchorRecord) -> Result<()> {
        if let Some(store) = &self.store {
            put_value(
                store.as_ref(),
                &anchor_key(&record.tx_family, &record.tx_id),
                record,
            )?;
        }
        Ok(())
    }
}

impl fmt::Debug for AnchorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnchorRegistry")
            .field("anchors", &self.records.len())
            .field("window_secs", &self.window.num_seconds())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}
