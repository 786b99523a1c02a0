//! # Compliance Screening
//!
//! Policy on top of [`crate::psi`]. The authority encrypts its blacklist
//! and whitelist once, at construction, and then screens address sets
//! against them.
//!
//! | Level | Rule |
//! |---|---|
//! | `Basic` (1) | no address may be blacklisted |
//! | `Advanced` (2) | no address may be blacklisted, and every address must be whitelisted |
//!
//! A blacklist hit fails at every level. Screening a transaction means
//! screening `[sender, recipient]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::{ConfigError, ProtocolConfig, SAMPLE_BLACKLIST, SAMPLE_WHITELIST};
use crate::error::{ProtocolError, Result};
use crate::psi::{PsiEncryptedSet, PsiEngine};
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceLevel {
    Basic,
    Advanced,
}

impl ComplianceLevel {
    /// Numeric level, as used in audit logs.
    pub fn as_u8(&self) -> u8 {
        match self {
            ComplianceLevel::Basic => 1,
            ComplianceLevel::Advanced => 2,
        }
    }
}

impl fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceLevel::Basic => f.write_str("basic"),
            ComplianceLevel::Advanced => f.write_str("advanced"),
        }
    }
}

/// Outcome of one screening. The index lists point into the screened
/// address set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub passed: bool,
    pub matched_blacklist: Vec<usize>,
    pub matched_whitelist_required_but_absent: Vec<usize>,
    pub level: ComplianceLevel,
}

impl ComplianceResult {
    /// Whether any screened address is blacklisted.
    pub fn matched_blacklist(&self) -> bool {
        !self.matched_blacklist.is_empty()
    }

    /// Whether any screened address was required on the whitelist and
    /// missing from it.
    pub fn matched_whitelist_required_but_absent(&self) -> bool {
        !self.matched_whitelist_required_but_absent.is_empty()
    }

    pub fn ensure_passed(&self) -> Result<()> {
        if self.passed {
            return Ok(());
        }
        Err(ProtocolError::ComplianceRejected(format!(
            "level {}: blacklisted {:?}, not whitelisted {:?}",
            self.level, self.matched_blacklist, self.matched_whitelist_required_but_absent
        )))
    }
}

pub struct ComplianceVerification {
    engine: PsiEngine,
    blacklist: PsiEncryptedSet,
    whitelist: PsiEncryptedSet,
    level: ComplianceLevel,
}

impl ComplianceVerification {
    pub fn new<S: AsRef<str>>(
        engine: PsiEngine,
        blacklist: &[S],
        whitelist: &[S],
        level: ComplianceLevel,
    ) -> Result<Self> {
        let blacklist = engine.encrypt_set(blacklist)?;
        let whitelist = engine.encrypt_set(whitelist)?;
        tracing::info!(
            scheme = %engine.scheme(),
            level = %level,
            blacklist = blacklist.len(),
            whitelist = whitelist.len(),
            "compliance lists encrypted"
        );
        Ok(Self {
            engine,
            blacklist,
            whitelist,
            level,
        })
    }

    /// Load the lists named in `config`, or the built-in samples when a
    /// path is not set.
    pub fn from_config(config: &ProtocolConfig, engine: PsiEngine) -> Result<Self> {
        let blacklist = match &config.blacklist_path {
            Some(path) => load_reference_list(path)?,
            None => SAMPLE_BLACKLIST.iter().map(|s| s.to_string()).collect(),
        };
        let whitelist = match &config.whitelist_path {
            Some(path) => load_reference_list(path)?,
            None => SAMPLE_WHITELIST.iter().map(|s| s.to_string()).collect(),
        };
        Self::new(engine, &blacklist, &whitelist, config.compliance_level)
    }

    pub fn level(&self) -> ComplianceLevel {
        self.level
    }

    pub fn engine(&self) -> &PsiEngine {
        &self.engine
    }

    pub fn check_compliance<S: AsRef<str>>(
        &self,
        address_set: &[S],
        level: ComplianceLevel,
    ) -> Result<ComplianceResult> {
        let encrypted = self.engine.encrypt_set(address_set)?;
        let matched_blacklist: Vec<usize> = self
            .engine
            .compute_intersection(&encrypted, &self.blacklist)?
            .into_iter()
            .collect();

        let matched_whitelist_required_but_absent = match level {
            ComplianceLevel::Basic => Vec::new(),
            ComplianceLevel::Advanced => {
                let whitelisted = self.engine.compute_intersection(&encrypted, &self.whitelist)?;
                (0..address_set.len())
                    .filter(|i| !whitelisted.contains(i))
                    .collect()
            }
        };

        let passed = matched_blacklist.is_empty() && matched_whitelist_required_but_absent.is_empty();
        if passed {
            tracing::debug!(level = %level, addresses = address_set.len(), "compliance passed");
        } else {
            tracing::warn!(
                level = %level,
                blacklisted = matched_blacklist.len(),
                not_whitelisted = matched_whitelist_required_but_absent.len(),
                "compliance failed"
            );
        }

        Ok(ComplianceResult {
            passed,
            matched_blacklist,
            matched_whitelist_required_but_absent,
            level,
        })
    }

    /// Screen `[sender, recipient]` at the configured level.
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<ComplianceResult> {
        self.check_compliance(&[tx.sender.as_str(), tx.recipient.as_str()], self.level)
    }
}

impl fmt::Debug for ComplianceVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplianceVerification")
            .field("scheme", &self.engine.scheme())
            .field("level", &self.level)
            .field("blacklist", &self.blacklist.len())
            .field("whitelist", &self.whitelist.len())
            .finish()
    }
}

/// A reference list file is a JSON array of address strings.
fn load_reference_list(path: &Path) -> Result<Vec<String>> {
    let list_error = |reason: String| ConfigError::ReferenceList {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| list_error(e.to_string()))?;
    let list: Vec<String> = serde_json::from_str(&content).map_err(|e| list_error(e.to_string()))?;
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::{PaillierPsi, SchnorrPsi};
    use crate::crypto::paillier::PaillierKeypair;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn schnorr_engine() -> PsiEngine {
        PsiEngine::Schnorr(SchnorrPsi::generate_with_rng(&mut StdRng::seed_from_u64(9)))
    }

    fn verifier(engine: PsiEngine, level: ComplianceLevel) -> ComplianceVerification {
        ComplianceVerification::new(engine, &["0xBad"], &["0xAlice", "0xBob"], level).unwrap()
    }

    #[test]
    fn basic_rejects_blacklisted_only() {
        let cv = verifier(schnorr_engine(), ComplianceLevel::Basic);
        let ok = cv.check_compliance(&["0xAlice", "0xStranger"], ComplianceLevel::Basic).unwrap();
        assert!(ok.passed);

        let bad = cv.check_compliance(&["0xAlice", "0xBad"], ComplianceLevel::Basic).unwrap();
        assert!(!bad.passed);
        assert_eq!(bad.matched_blacklist, vec![1]);
        assert!(bad.matched_blacklist());
        assert!(!bad.matched_whitelist_required_but_absent());
        assert!(!ok.matched_blacklist());
        assert!(matches!(
            bad.ensure_passed(),
            Err(ProtocolError::ComplianceRejected(_))
        ));
    }

    #[test]
    fn advanced_requires_whitelist() {
        let cv = verifier(schnorr_engine(), ComplianceLevel::Advanced);
        let ok = cv.check_compliance(&["0xAlice", "0xBob"], ComplianceLevel::Advanced).unwrap();
        assert!(ok.passed);

        let missing = cv
            .check_compliance(&["0xAlice", "0xStranger"], ComplianceLevel::Advanced)
            .unwrap();
        assert!(!missing.passed);
        assert!(missing.matched_blacklist.is_empty());
        assert_eq!(missing.matched_whitelist_required_but_absent, vec![1]);
        assert!(missing.matched_whitelist_required_but_absent());
        assert!(!missing.matched_blacklist());
        assert!(!ok.matched_whitelist_required_but_absent());
    }

    #[test]
    fn blacklist_fails_even_when_whitelisted() {
        let engine = schnorr_engine();
        let cv = ComplianceVerification::new(engine, &["0xBoth"], &["0xBoth"], ComplianceLevel::Advanced)
            .unwrap();
        let result = cv.check_compliance(&["0xBoth"], ComplianceLevel::Advanced).unwrap();
        assert!(!result.passed);
        assert_eq!(result.matched_blacklist, vec![0]);
    }

    #[test]
    fn paillier_scheme_screens_too() {
        let kp = PaillierKeypair::generate_with_rng(512, &mut StdRng::seed_from_u64(3)).unwrap();
        let cv = verifier(PsiEngine::Paillier(PaillierPsi::new(kp)), ComplianceLevel::Basic);
        assert!(!cv.check_compliance(&["0xBad"], ComplianceLevel::Basic).unwrap().passed);
        assert!(cv.check_compliance(&["0xAlice"], ComplianceLevel::Basic).unwrap().passed);
    }

    #[test]
    fn lists_load_from_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let black = dir.path().join("black.json");
        fs::write(&black, r#"["0xFromFile"]"#).unwrap();

        let config = ProtocolConfig {
            blacklist_path: Some(black),
            ..ProtocolConfig::default()
        };
        let cv = ComplianceVerification::from_config(&config, schnorr_engine()).unwrap();
        assert!(!cv.check_compliance(&["0xFromFile"], ComplianceLevel::Basic).unwrap().passed);
        // Whitelist falls back to the samples.
        assert!(cv
            .check_compliance(&[SAMPLE_WHITELIST[0]], ComplianceLevel::Advanced)
            .unwrap()
            .passed);
    }

    #[test]
    fn malformed_list_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let black = dir.path().join("black.json");
        fs::write(&black, "{not json").unwrap();
        let config = ProtocolConfig {
            blacklist_path: Some(black),
            ..ProtocolConfig::default()
        };
        let err = ComplianceVerification::from_config(&config, schnorr_engine()).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Config(ConfigError::ReferenceList { .. })
        ));
    }
}
