// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SHADE Protocol: Core Library
//!
//! Confidential transfers for ledgers that still have to answer to an
//! auditor. A sender commits to an amount, proves it is in range without
//! revealing it, encrypts it for whoever is entitled to read it, and gets
//! screened against block and allow lists by an authority that never sees
//! the addresses it isn't looking for. Then the transfer is anchored, and
//! the sender has a fixed window to take it back before it becomes final.
//!
//! ## Architecture
//!
//! - **crypto**: hashing, Ed25519 signing, Pedersen commitments, Paillier
//!   homomorphic encryption.
//! - **rangeproof**: one engine, three backends. Bulletproofs in
//!   production, two transparent stand-ins for tests.
//! - **psi**: private set intersection, Paillier or Schnorr flavoured.
//! - **compliance**: blacklist / whitelist policy on top of PSI.
//! - **anchor**: the pending / canceled / finalized state machine.
//! - **storage**: the `Store` trait, sled and in-memory implementations,
//!   and the transaction ledger.
//! - **notary**: document notarization records.
//! - **transaction**: the transaction record and the orchestrator that
//!   ties everything together.
//! - **config**: constants and the load-time `ProtocolConfig`.
//!
//! ## Design Philosophy
//!
//! 1. Choices are made once, at construction. No global backend flags.
//! 2. A failed check is an answer, not an exception: verification APIs
//!    return `false`, and only malformed input is an `Err`.
//! 3. Secrets never reach the ledger. The blinding factor stays with the
//!    sender; private keys never leave the caller.
//! 4. If it touches money, it has tests. Plural.

pub mod anchor;
pub mod compliance;
pub mod config;
pub mod crypto;
pub mod error;
pub mod notary;
pub mod psi;
pub mod rangeproof;
pub mod storage;
pub mod transaction;

pub use error::{ProtocolError, Result};
