//! Ledger and notary behavior over a real sled store.

use std::sync::Arc;

use chrono::Duration;
use rand::rngs::StdRng;
use rand::SeedableRng;

use shade_protocol::anchor::{AnchorRegistry, Clock, ManualClock};
use shade_protocol::compliance::{ComplianceLevel, ComplianceVerification};
use shade_protocol::config::{TX_FAMILY_COMPLIANCE, TX_FAMILY_FINANCIAL};
use shade_protocol::crypto::keys::SigningKeypair;
use shade_protocol::crypto::paillier::PaillierKeypair;
use shade_protocol::crypto::signer::Ed25519Signer;
use shade_protocol::notary::Notary;
use shade_protocol::psi::{PsiEngine, SchnorrPsi};
use shade_protocol::rangeproof::{RangeProofBackendKind, RangeProofEngine};
use shade_protocol::storage::{SledStore, Store};
use shade_protocol::transaction::TransactionOrchestrator;
use shade_protocol::ProtocolError;

fn orchestrator(store: Arc<dyn Store>, amount_keys: &PaillierKeypair) -> TransactionOrchestrator {
    let engine = PsiEngine::Schnorr(SchnorrPsi::generate_with_rng(&mut StdRng::seed_from_u64(21)));
    let compliance = ComplianceVerification::new(
        engine,
        &["0xBlacklistedAddress1"],
        &["0xAlice"],
        ComplianceLevel::Basic,
    )
    .unwrap();
    TransactionOrchestrator::new(
        RangeProofEngine::from_kind(RangeProofBackendKind::Simulated, false).unwrap(),
        compliance,
        AnchorRegistry::new(Duration::seconds(60)).with_store(store.clone()),
        Arc::new(Ed25519Signer),
        store,
        amount_keys.public.clone(),
        1_000_000,
    )
}

#[test]
fn encrypted_total_sums_one_family() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn Store> = Arc::new(SledStore::open(dir.path()).unwrap());
    let keys = PaillierKeypair::generate_with_rng(512, &mut StdRng::seed_from_u64(20)).unwrap();
    let orch = orchestrator(store, &keys);
    let sender = SigningKeypair::from_seed(&[3u8; 32]);

    for (family, amount) in [
        (TX_FAMILY_FINANCIAL, 100),
        (TX_FAMILY_FINANCIAL, 250),
        (TX_FAMILY_COMPLIANCE, 9_999),
        (TX_FAMILY_FINANCIAL, 650),
    ] {
        orch.create_and_encrypt_transaction(
            family,
            "0xAlice",
            "0xBob",
            amount,
            &sender.secret_key_bytes(),
            false,
        )
        .unwrap();
    }

    let ledger = orch.ledger();
    assert_eq!(ledger.transactions_by_family(TX_FAMILY_FINANCIAL).unwrap().len(), 3);
    let total = ledger
        .encrypted_total(TX_FAMILY_FINANCIAL, &keys.public)
        .unwrap()
        .unwrap();
    assert_eq!(keys.private.decrypt(&total).unwrap(), 1000);

    let other = PaillierKeypair::generate_with_rng(512, &mut StdRng::seed_from_u64(22)).unwrap();
    assert!(ledger
        .encrypted_total(TX_FAMILY_FINANCIAL, &other.public)
        .unwrap()
        .is_none());
}

#[test]
fn saving_twice_is_idempotent() {
    let store: Arc<dyn Store> = Arc::new(SledStore::open_temporary().unwrap());
    let keys = PaillierKeypair::generate_with_rng(512, &mut StdRng::seed_from_u64(23)).unwrap();
    let orch = orchestrator(store, &keys);
    let sender = SigningKeypair::from_seed(&[4u8; 32]);

    let (tx, _) = orch
        .create_and_encrypt_transaction(
            TX_FAMILY_FINANCIAL,
            "0xAlice",
            "0xBob",
            5,
            &sender.secret_key_bytes(),
            false,
        )
        .unwrap();
    orch.ledger().save_transaction(&tx).unwrap();
    assert_eq!(orch.ledger().transactions_by_family(TX_FAMILY_FINANCIAL).unwrap().len(), 1);

    // A second anchor attempt for the same id is reported, not stored twice.
    let pk = sender.public_key_bytes();
    assert!(orch.validate_and_anchor_transaction(&tx, &pk, true).unwrap());
    assert!(matches!(
        orch.verify_transaction(&tx, &pk, true),
        Err(ProtocolError::AlreadyAnchored { .. })
    ));
}

#[test]
fn closed_store_refuses_writes() {
    let store: Arc<dyn Store> = Arc::new(SledStore::open_temporary().unwrap());
    let keys = PaillierKeypair::generate_with_rng(512, &mut StdRng::seed_from_u64(24)).unwrap();
    let orch = orchestrator(store.clone(), &keys);
    store.close().unwrap();

    let sender = SigningKeypair::from_seed(&[5u8; 32]);
    let err = orch
        .create_and_encrypt_transaction(
            TX_FAMILY_FINANCIAL,
            "0xAlice",
            "0xBob",
            5,
            &sender.secret_key_bytes(),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Storage(_)));
}

#[test]
fn notary_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let kp = SigningKeypair::from_seed(&[6u8; 32]);
    let record_id = {
        let store: Arc<dyn Store> = Arc::new(SledStore::open(dir.path()).unwrap());
        let notary = Notary::new(store.clone(), Arc::new(Ed25519Signer));
        let record = notary
            .register(b"lease agreement", &kp.secret_key_bytes(), &kp.public_key_bytes())
            .unwrap();
        store.close().unwrap();
        record.record_id
    };

    let store: Arc<dyn Store> = Arc::new(SledStore::open(dir.path()).unwrap());
    let notary = Notary::new(store, Arc::new(Ed25519Signer));
    let found = notary.verify(b"lease agreement").unwrap().unwrap();
    assert_eq!(found.record_id, record_id);
    assert!(notary.verify(b"lease agreement v2").unwrap().is_none());
}

#[test]
fn encrypted_balance_nets_received_against_sent() {
    let store: Arc<dyn Store> = Arc::new(SledStore::open_temporary().unwrap());
    let keys = PaillierKeypair::generate_with_rng(512, &mut StdRng::seed_from_u64(25)).unwrap();
    let orch = orchestrator(store, &keys);
    let sender = SigningKeypair::from_seed(&[12u8; 32]);

    for (family, from, to, amount) in [
        (TX_FAMILY_FINANCIAL, "0xAlice", "0xBob", 700),
        (TX_FAMILY_FINANCIAL, "0xBob", "0xCarol", 250),
        (TX_FAMILY_FINANCIAL, "0xCarol", "0xBob", 40),
        (TX_FAMILY_FINANCIAL, "0xBob", "0xBob", 999),
        (TX_FAMILY_COMPLIANCE, "0xAlice", "0xBob", 5_000),
    ] {
        orch.create_and_encrypt_transaction(family, from, to, amount, &sender.secret_key_bytes(), false)
            .unwrap();
    }

    let ledger = orch.ledger();
    let balance = |address: &str| {
        ledger
            .encrypted_balance(address, TX_FAMILY_FINANCIAL, &keys.public)
            .unwrap()
            .map(|ct| keys.private.decrypt(&ct).unwrap())
    };
    assert_eq!(balance("0xBob"), Some(700 - 250 + 40));
    assert_eq!(balance("0xAlice"), Some(-700));
    assert_eq!(balance("0xCarol"), Some(250 - 40));
    assert_eq!(balance("0xNobody"), None);

    let other = PaillierKeypair::generate_with_rng(512, &mut StdRng::seed_from_u64(26)).unwrap();
    assert!(ledger
        .encrypted_balance("0xBob", TX_FAMILY_FINANCIAL, &other.public)
        .unwrap()
        .is_none());

    let all = ledger.all_transactions().unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(
        all.iter().filter(|tx| tx.tx_family == TX_FAMILY_COMPLIANCE).count(),
        1
    );
}

#[test]
fn expired_notary_record_survives_reopen_but_reads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let kp = SigningKeypair::from_seed(&[13u8; 32]);
    let clock = Arc::new(ManualClock::default());
    {
        let store: Arc<dyn Store> = Arc::new(SledStore::open(dir.path()).unwrap());
        let notary = Notary::new(store.clone(), Arc::new(Ed25519Signer)).with_clock(clock.clone());
        notary
            .register_with_expiry(
                b"price quote",
                &kp.secret_key_bytes(),
                &kp.public_key_bytes(),
                Some(Duration::minutes(30)),
            )
            .unwrap();
        notary
            .register(b"title deed", &kp.secret_key_bytes(), &kp.public_key_bytes())
            .unwrap();
        store.close().unwrap();
    }

    let store: Arc<dyn Store> = Arc::new(SledStore::open(dir.path()).unwrap());
    let notary = Notary::new(store, Arc::new(Ed25519Signer)).with_clock(clock.clone());
    assert!(notary.verify(b"price quote").unwrap().is_some());
    assert_eq!(notary.list(false).unwrap().len(), 2);

    clock.set(clock.now() + Duration::minutes(31));
    assert!(notary.verify(b"price quote").unwrap().is_none());
    assert!(notary.verify(b"title deed").unwrap().is_some());
    assert_eq!(notary.list(false).unwrap().len(), 1);
    assert_eq!(notary.list(true).unwrap().len(), 2);
}
