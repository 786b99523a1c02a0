//! The transaction orchestrator: one place where commitments, proofs,
//! encryption, signatures, compliance and anchoring meet.
//!
//! Creation runs sender-side and holds the private key for exactly one
//! call. Validation runs anywhere and needs only the sender's public key.
//!
//! ## Failure semantics
//!
//! Bad input (negative amount, unknown family, malformed transaction) is an
//! `Err`. A transaction that is well-formed but does not verify (bad
//! signature, bad proof, compliance hit, already anchored) is a normal
//! outcome: `validate_and_anchor_transaction` returns `Ok(false)` and no
//! anchor transition happens. Callers that want the reason use
//! [`TransactionOrchestrator::verify_transaction`], which surfaces it as a
//! typed error.

use rand::rngs::OsRng;
use std::sync::Arc;

use chrono::Utc;

use super::model::{Transaction, TransactionOpening};
use crate::anchor::{AnchorRecord, AnchorRegistry, AnchorStatus, VerificationChecks};
use crate::compliance::ComplianceVerification;
use crate::config::{ProtocolConfig, TX_FAMILIES};
use crate::crypto::commitment::random_scalar;
use crate::crypto::paillier::{PaillierKeypair, PaillierPublicKey};
use crate::crypto::signer::Signer;
use crate::error::{ProtocolError, Result};
use crate::psi::PsiEngine;
use crate::rangeproof::RangeProofEngine;
use crate::storage::{Ledger, Store};

pub struct TransactionOrchestrator {
    range_engine: RangeProofEngine,
    compliance: ComplianceVerification,
    anchors: AnchorRegistry,
    signer: Arc<dyn Signer>,
    ledger: Ledger,
    amount_key: PaillierPublicKey,
    max_amount: u64,
}

impl TransactionOrchestrator {
    pub fn new(
        range_engine: RangeProofEngine,
        compliance: ComplianceVerification,
        anchors: AnchorRegistry,
        signer: Arc<dyn Signer>,
        store: Arc<dyn Store>,
        amount_key: PaillierPublicKey,
        max_amount: u64,
    ) -> Self {
        Self {
            range_engine,
            compliance,
            anchors,
            signer,
            ledger: Ledger::new(store),
            amount_key,
            max_amount,
        }
    }

    /// Wire everything from configuration. A fresh amount keypair is
    /// generated; its private half is returned to whoever audits amounts.
    pub fn from_config(
        config: &ProtocolConfig,
        store: Arc<dyn Store>,
        signer: Arc<dyn Signer>,
    ) -> Result<(Self, PaillierKeypair)> {
        config.validate()?;
        let range_engine = RangeProofEngine::from_config(config)?;
        let compliance = ComplianceVerification::from_config(config, PsiEngine::from_config(config)?)?;
        let anchors = AnchorRegistry::new(config.cancellation_window()).with_store(store.clone());
        let amount_keys = PaillierKeypair::generate(config.paillier_key_bits)?;

        tracing::info!(
            backend = %config.range_proof_backend,
            scheme = %config.psi_scheme,
            level = %config.compliance_level,
            window_secs = config.cancellation_window_secs,
            "orchestrator configured"
        );

        let orchestrator = Self::new(
            range_engine,
            compliance,
            anchors,
            signer,
            store,
            amount_keys.public.clone(),
            config.max_transaction_amount,
        );
        Ok((orchestrator, amount_keys))
    }

    pub fn anchors(&self) -> &AnchorRegistry {
        &self.anchors
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn compliance(&self) -> &ComplianceVerification {
        &self.compliance
    }

    pub fn amount_key(&self) -> &PaillierPublicKey {
        &self.amount_key
    }

    pub fn max_amount(&self) -> u64 {
        self.max_amount
    }

    /// Build, prove, encrypt, sign and store a transfer, and anchor it when
    /// `anchor` is set.
    ///
    /// The amount is checked before anything else happens: a negative or
    /// oversized amount leaves no signature, no ledger entry and no anchor.
    /// When anchoring, compliance runs before the ledger write, so a
    /// rejected transfer is not stored either.
    pub fn create_and_encrypt_transaction(
        &self,
        tx_family: &str,
        sender: &str,
        recipient: &str,
        amount: i64,
        private_key: &[u8],
        anchor: bool,
    ) -> Result<(Transaction, TransactionOpening)> {
        let value = u64::try_from(amount).map_err(|_| {
            ProtocolError::InvalidValue(format!("amount must be non-negative, got {}", amount))
        })?;
        if value > self.max_amount {
            return Err(ProtocolError::InvalidValue(format!(
                "amount {} exceeds the maximum of {}",
                value, self.max_amount
            )));
        }
        if !TX_FAMILIES.contains(&tx_family) {
            return Err(ProtocolError::InvalidValue(format!(
                "unknown transaction family {:?}",
                tx_family
            )));
        }

        let blinding = random_scalar(&mut OsRng);
        let (commitment, range_proof) =
            self.range_engine
                .create_range_proof(value, 0, self.max_amount, &blinding)?;
        let encrypted_amount = self.amount_key.encrypt(amount)?;

        let mut tx = Transaction {
            tx_id: String::new(),
            tx_family: tx_family.to_string(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            commitment,
            encrypted_amount,
            range_proof,
            signature: Vec::new(),
        };
        tx.tx_id = tx.compute_id();
        tx.signature = self.signer.sign(&tx.signable_bytes(), private_key)?;
        tx.validate_structure()?;

        let checks = if anchor {
            self.compliance.verify_transaction(&tx)?.ensure_passed()?;
            Some(VerificationChecks {
                signature: true,
                range_proof: self.range_engine.validate_range_proof(
                    &tx.commitment,
                    &tx.range_proof,
                    0,
                    self.max_amount,
                ),
                compliance: true,
            })
        } else {
            None
        };

        self.ledger.save_transaction(&tx)?;
        if let Some(checks) = checks {
            self.anchors.anchor_transaction(&tx, checks)?;
        }

        tracing::info!(
            tx_id = %tx.tx_id,
            tx_family = %tx.tx_family,
            backend = %tx.range_proof.backend,
            anchored = anchor,
            "transaction created"
        );

        let opening = TransactionOpening {
            tx_id: tx.tx_id.clone(),
            amount: value,
            blinding,
        };
        Ok((tx, opening))
    }

    /// Verify `tx` and, when `anchor` is set, screen and anchor it.
    ///
    /// `Ok(true)`: every check passed (and the anchor exists).
    /// `Ok(false)`: a check failed or the transaction is already anchored;
    /// nothing changed.
    pub fn validate_and_anchor_transaction(
        &self,
        tx: &Transaction,
        sender_public_key: &[u8],
        anchor: bool,
    ) -> Result<bool> {
        match self.verify_transaction(tx, sender_public_key, anchor) {
            Ok(_) => Ok(true),
            Err(e) if e.is_policy_rejection() => {
                tracing::warn!(tx_id = %tx.tx_id, reason = %e, "transaction rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// The error-reporting form of [`Self::validate_and_anchor_transaction`].
    ///
    /// Checks run in order: structure, signature, range proof, then
    /// compliance and anchoring when `anchor` is set. The first failure is
    /// returned. Returns the new anchor record when one was created.
    pub fn verify_transaction(
        &self,
        tx: &Transaction,
        sender_public_key: &[u8],
        anchor: bool,
    ) -> Result<Option<AnchorRecord>> {
        tx.validate_structure()?;

        if !self
            .signer
            .verify(&tx.signable_bytes(), sender_public_key, &tx.signature)
        {
            return Err(ProtocolError::SignatureInvalid {
                tx_id: tx.tx_id.clone(),
            });
        }
        tracing::debug!(tx_id = %tx.tx_id, "signature verified");

        if !self
            .range_engine
            .validate_range_proof(&tx.commitment, &tx.range_proof, 0, self.max_amount)
        {
            return Err(ProtocolError::ProofInvalid(format!(
                "range proof for {} does not verify over [0, {}]",
                tx.tx_id, self.max_amount
            )));
        }
        tracing::debug!(tx_id = %tx.tx_id, backend = %tx.range_proof.backend, "range proof verified");

        if !anchor {
            return Ok(None);
        }

        self.compliance.verify_transaction(tx)?.ensure_passed()?;
        // Refuse duplicates before touching the ledger.
        if let Ok(existing) = self.anchors.verify_anchor(&tx.tx_id) {
            if existing.status != AnchorStatus::Canceled {
                return Err(ProtocolError::AlreadyAnchored {
                    tx_id: tx.tx_id.clone(),
                });
            }
        }
        self.ledger.save_transaction(tx)?;
        let record = self.anchors.anchor_transaction(
            tx,
            VerificationChecks {
                signature: true,
                range_proof: true,
                compliance: true,
            },
        )?;
        Ok(Some(record))
    }

    pub fn cancel_transaction(&self, tx_id: &str) -> Result<bool> {
        self.anchors.cancel_anchor(tx_id)
    }

    pub fn finalize_transaction(&self, tx_id: &str) -> Result<bool> {
        self.anchors.finalize(tx_id)
    }
}

impl std::fmt::Debug for TransactionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionOrchestrator")
            .field("backend", &self.range_engine.kind())
            .field("compliance", &self.compliance)
            .field("anchors", &self.anchors)
            .field("max_amount", &self.max_amount)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::ManualClock;
    use crate::compliance::ComplianceLevel;
    use crate::config::TX_FAMILY_FINANCIAL;
    use crate::crypto::keys::SigningKeypair;
    use crate::crypto::signer::Ed25519Signer;
    use crate::psi::SchnorrPsi;
    use crate::rangeproof::RangeProofBackendKind;
    use crate::storage::MemoryStore;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        orchestrator: TransactionOrchestrator,
        clock: Arc<ManualClock>,
        keys: PaillierKeypair,
        sender: SigningKeypair,
    }

    fn fixture() -> Fixture {
        let mut rng = StdRng::seed_from_u64(2024);
        let clock = Arc::new(ManualClock::default());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let keys = PaillierKeypair::generate_with_rng(512, &mut rng).unwrap();
        let compliance = ComplianceVerification::new(
            PsiEngine::Schnorr(SchnorrPsi::generate_with_rng(&mut rng)),
            &["0xBad"],
            &["0xAlice", "0xBob"],
            ComplianceLevel::Basic,
        )
        .unwrap();
        let orchestrator = TransactionOrchestrator::new(
            RangeProofEngine::from_kind(RangeProofBackendKind::Simulated, false).unwrap(),
            compliance,
            AnchorRegistry::new(Duration::seconds(300))
                .with_clock(clock.clone())
                .with_store(store.clone()),
            Arc::new(Ed25519Signer),
            store,
            keys.public.clone(),
            5000,
        );
        Fixture {
            orchestrator,
            clock,
            keys,
            sender: SigningKeypair::from_seed(&[3u8; 32]),
        }
    }

    fn create(f: &Fixture, recipient: &str, amount: i64, anchor: bool) -> Result<(Transaction, TransactionOpening)> {
        f.orchestrator.create_and_encrypt_transaction(
            TX_FAMILY_FINANCIAL,
            "0xAlice",
            recipient,
            amount,
            &f.sender.secret_key_bytes(),
            anchor,
        )
    }

    #[test]
    fn create_then_validate_and_anchor() {
        let f = fixture();
        let (tx, opening) = create(&f, "0xBob", 1000, false).unwrap();
        assert!(opening.opens(&tx));
        assert_eq!(f.keys.private.decrypt(&tx.encrypted_amount).unwrap(), 1000);

        let pk = f.sender.public_key_bytes();
        assert!(f.orchestrator.validate_and_anchor_transaction(&tx, &pk, true).unwrap());
        let record = f.orchestrator.anchors().verify_anchor(&tx.tx_id).unwrap();
        assert_eq!(record.status, AnchorStatus::Pending);
        assert!(record.checks.all_passed());

        // Second anchor attempt is a policy outcome.
        assert!(!f.orchestrator.validate_and_anchor_transaction(&tx, &pk, true).unwrap());
    }

    #[test]
    fn negative_and_oversized_amounts_leave_no_trace() {
        let f = fixture();
        for amount in [-5, 5001] {
            assert!(matches!(
                create(&f, "0xBob", amount, true),
                Err(ProtocolError::InvalidValue(_))
            ));
        }
        assert!(f.orchestrator.anchors().is_empty());
        assert!(f
            .orchestrator
            .ledger()
            .transactions_by_family(TX_FAMILY_FINANCIAL)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn wrong_key_or_flipped_bit_is_rejected() {
        let f = fixture();
        let (tx, _) = create(&f, "0xBob", 10, false).unwrap();
        let stranger = SigningKeypair::from_seed(&[4u8; 32]);
        assert!(!f
            .orchestrator
            .validate_and_anchor_transaction(&tx, &stranger.public_key_bytes(), true)
            .unwrap());

        let mut forged = tx.clone();
        forged.signature[10] ^= 0x01;
        let err = f
            .orchestrator
            .verify_transaction(&forged, &f.sender.public_key_bytes(), true)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::SignatureInvalid { .. }));
        assert!(f.orchestrator.anchors().is_empty());
    }

    #[test]
    fn tampered_content_is_a_hard_error() {
        let f = fixture();
        let (mut tx, _) = create(&f, "0xBob", 10, false).unwrap();
        tx.recipient = "0xMallory".into();
        assert!(matches!(
            f.orchestrator
                .validate_and_anchor_transaction(&tx, &f.sender.public_key_bytes(), true),
            Err(ProtocolError::InvalidValue(_))
        ));
    }

    #[test]
    fn blacklisted_recipient_is_not_anchored() {
        let f = fixture();
        assert!(matches!(
            create(&f, "0xBad", 10, true),
            Err(ProtocolError::ComplianceRejected(_))
        ));
        assert!(f
            .orchestrator
            .ledger()
            .transactions_by_family(TX_FAMILY_FINANCIAL)
            .unwrap()
            .is_empty());

        let (tx, _) = create(&f, "0xBad", 10, false).unwrap();
        assert!(!f
            .orchestrator
            .validate_and_anchor_transaction(&tx, &f.sender.public_key_bytes(), true)
            .unwrap());
        assert!(f.orchestrator.anchors().is_empty());
        // Without anchoring, compliance is not consulted.
        assert!(f
            .orchestrator
            .validate_and_anchor_transaction(&tx, &f.sender.public_key_bytes(), false)
            .unwrap());
    }

    #[test]
    fn cancel_and_finalize_through_the_orchestrator() {
        let f = fixture();
        let (a, _) = create(&f, "0xBob", 1, true).unwrap();
        let (b, _) = create(&f, "0xBob", 2, true).unwrap();
        assert!(f.orchestrator.cancel_transaction(&a.tx_id).unwrap());

        f.clock.advance(Duration::seconds(301));
        assert!(f.orchestrator.finalize_transaction(&b.tx_id).unwrap());
        assert!(matches!(
            f.orchestrator.cancel_transaction(&b.tx_id),
            Err(ProtocolError::AlreadyFinal { .. })
        ));
    }

    #[test]
    fn encrypted_total_sums_the_family() {
        let f = fixture();
        for amount in [100, 250, 650] {
            create(&f, "0xBob", amount, false).unwrap();
        }
        let total = f
            .orchestrator
            .ledger()
            .encrypted_total(TX_FAMILY_FINANCIAL, f.orchestrator.amount_key())
            .unwrap()
            .unwrap();
        assert_eq!(f.keys.private.decrypt(&total).unwrap(), 1000);
    }
}
