//! # Transaction Module
//!
//! ```text
//! model.rs        Transaction, its canonical encoding, TransactionOpening
//! orchestrator.rs create / validate / anchor / cancel
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Create**: the sender's orchestrator commits, proves, encrypts and
//!    signs. The sender keeps the [`TransactionOpening`].
//! 2. **Validate**: any orchestrator checks structure, signature and range
//!    proof against the sender's public key.
//! 3. **Anchor**: compliance screening, then a pending anchor with a
//!    cancellation deadline.
//! 4. **Cancel or finalize**: inside the window the sender may cancel;
//!    after it, a clean anchor finalizes.
//!
//! ## Design Decisions
//!
//! - Transaction IDs are `double_sha256` of the canonical bytes (excluding
//!   the id and the signature), hex-encoded.
//! - Amounts are validated as `i64` at the edge and carried as `u64` inside
//!   proofs. Negative amounts never reach the commitment layer.
//! - The sender address is a free-form string. Nothing binds it to the
//!   signing key; the verifier supplies the public key it trusts.

pub mod model;
pub mod orchestrator;

pub use model::{Transaction, TransactionOpening};
pub use orchestrator::TransactionOrchestrator;
