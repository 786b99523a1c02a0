//! Transaction ledger over a [`Store`].
//!
//! Transactions are written once, under `{family}/tx/{tx_id}`, and never
//! updated: a transaction is immutable after creation. Openings (amount and
//! blinding) are never written here.

use std::sync::Arc;

use super::{get_value, put_value, scan_values, tx_key, tx_prefix, Store};
use crate::config::TX_FAMILIES;
use crate::crypto::paillier::{Ciphertext, PaillierPublicKey};
use crate::error::{ProtocolError, Result};
use crate::transaction::Transaction;

#[derive(Debug, Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Persist `tx`. Writing the same `tx_id` twice with different content
    /// is refused.
    pub fn save_transaction(&self, tx: &Transaction) -> Result<()> {
        let key = tx_key(&tx.tx_family, &tx.tx_id);
        if let Some(existing) = get_value::<Transaction>(self.store.as_ref(), &key)? {
            if existing != *tx {
                return Err(ProtocolError::InvalidValue(format!(
                    "ledger already holds a different transaction {}",
                    tx.tx_id
                )));
            }
            return Ok(());
        }
        put_value(self.store.as_ref(), &key, tx)?;
        tracing::debug!(tx_id = %tx.tx_id, tx_family = %tx.tx_family, "transaction stored");
        Ok(())
    }

    pub fn get_transaction(&self, tx_family: &str, tx_id: &str) -> Result<Option<Transaction>> {
        Ok(get_value(self.store.as_ref(), &tx_key(tx_family, tx_id))?)
    }

    /// Look `tx_id` up in every known family.
    pub fn find_transaction(&self, tx_id: &str) -> Result<Option<Transaction>> {
        for family in TX_FAMILIES {
            if let Some(tx) = self.get_transaction(family, tx_id)? {
                return Ok(Some(tx));
            }
        }
        Ok(None)
    }

    /// Every transaction in `tx_family`, oldest first.
    pub fn transactions_by_family(&self, tx_family: &str) -> Result<Vec<Transaction>> {
        let mut txs: Vec<Transaction> = scan_values(self.store.as_ref(), &tx_prefix(tx_family))?;
        txs.sort_by(|a, b| (a.timestamp, &a.tx_id).cmp(&(b.timestamp, &b.tx_id)));
        Ok(txs)
    }

    /// Every transaction in every known family, oldest first.
    pub fn all_transactions(&self) -> Result<Vec<Transaction>> {
        let mut txs = Vec::new();
        for family in TX_FAMILIES {
            txs.extend(self.transactions_by_family(family)?);
        }
        txs.sort_by(|a, b| (a.timestamp, &a.tx_id).cmp(&(b.timestamp, &b.tx_id)));
        Ok(txs)
    }

    /// Net encrypted balance of `address` in `tx_family`: amounts received
    /// minus amounts sent, under `key`. A transfer to oneself nets to zero.
    /// `None` when the address has no transactions under `key`.
    pub fn encrypted_balance(
        &self,
        address: &str,
        tx_family: &str,
        key: &PaillierPublicKey,
    ) -> Result<Option<Ciphertext>> {
        let mut balance: Option<Ciphertext> = None;
        for tx in self.transactions_by_family(tx_family)? {
            if !tx.encrypted_amount.belongs_to(key) {
                continue;
            }
            if tx.recipient == address {
                balance = Some(match balance {
                    None => tx.encrypted_amount.clone(),
                    Some(acc) => key.add(&acc, &tx.encrypted_amount)?,
                });
            }
            if tx.sender == address {
                let acc = match balance {
                    Some(acc) => acc,
                    None => key.encrypt(0)?,
                };
                balance = Some(key.sub(&acc, &tx.encrypted_amount)?);
            }
        }
        Ok(balance)
    }

    /// Homomorphic sum of every amount in `tx_family` encrypted under
    /// `key`. Amounts under other keys are skipped. `None` when there is
    /// nothing to sum.
    pub fn encrypted_total(
        &self,
        tx_family: &str,
        key: &PaillierPublicKey,
    ) -> Result<Option<Ciphertext>> {
        let mut total: Option<Ciphertext> = None;
        for tx in self.transactions_by_family(tx_family)? {
            if !tx.encrypted_amount.belongs_to(key) {
                continue;
            }
            total = Some(match total {
                None => tx.encrypted_amount,
                Some(acc) => key.add(&acc, &tx.encrypted_amount)?,
            });
        }
        Ok(total)
    }
}
