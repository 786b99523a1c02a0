//! # Protocol Configuration & Constants
//!
//! Every magic number in SHADE lives here, next to the load-time
//! [`ProtocolConfig`] that selects backends and policy.
//!
//! Configuration is read once, validated, and then handed to constructors.
//! Nothing in the crate consults a global flag at call time: if you want a
//! different range-proof backend you build a different engine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::compliance::ComplianceLevel;
use crate::psi::PsiScheme;
use crate::rangeproof::RangeProofBackendKind;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Version byte prefixed to the canonical transaction encoding. Bump it and
/// every `tx_id` changes, so don't.
pub const CANONICAL_ENCODING_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Transaction Families
// ---------------------------------------------------------------------------

/// Value transfers. The default family.
pub const TX_FAMILY_FINANCIAL: &str = "financial_tx";

/// Document notarization records.
pub const TX_FAMILY_NOTARY: &str = "notary_tx";

/// Compliance attestations.
pub const TX_FAMILY_COMPLIANCE: &str = "compliance_tx";

/// All families the protocol recognizes.
pub const TX_FAMILIES: [&str; 3] = [TX_FAMILY_FINANCIAL, TX_FAMILY_NOTARY, TX_FAMILY_COMPLIANCE];

// ---------------------------------------------------------------------------
// Amounts & Windows
// ---------------------------------------------------------------------------

/// Upper bound on a single transfer. Range proofs are issued over
/// `[0, max_transaction_amount]`.
pub const DEFAULT_MAX_TRANSACTION_AMOUNT: u64 = 1_000_000;

/// How long a sender may cancel an anchored transaction, in seconds.
pub const DEFAULT_CANCELLATION_WINDOW_SECS: u64 = 300;

/// Longest accepted cancellation window: ten years. Deadlines are computed
/// as `now + window` and must stay representable.
pub const MAX_CANCELLATION_WINDOW_SECS: u64 = 10 * 365 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Paillier modulus size for production keys.
pub const DEFAULT_PAILLIER_KEY_BITS: u64 = 2048;

/// Anything smaller is a toy. Tests use 512.
pub const MIN_PAILLIER_KEY_BITS: u64 = 256;

/// Bit width of each Bulletproofs sub-range.
pub const RANGE_PROOF_BITS: usize = 64;

/// Built-in sample lists, used when no list file is configured.
pub const SAMPLE_BLACKLIST: [&str; 2] = ["0xBlacklistedAddress1", "0xBlacklistedAddress2"];
pub const SAMPLE_WHITELIST: [&str; 2] = ["0xWhitelistedAddress1", "0xWhitelistedAddress2"];

// ---------------------------------------------------------------------------
// Load-time configuration
// ---------------------------------------------------------------------------

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("the emulated range-proof backend is refused in production")]
    EmulatedInProduction,

    #[error("reference list {path}: {reason}")]
    ReferenceList { path: PathBuf, reason: String },
}

/// Everything that is decided once, at load time.
///
/// ```toml
/// range_proof_backend = "strong"     # strong | simulated | emulated
/// psi_scheme = "schnorr"             # paillier | schnorr
/// compliance_level = "advanced"      # basic | advanced
/// cancellation_window_secs = 300
/// blacklist_path = "lists/blacklist.json"
/// whitelist_path = "lists/whitelist.json"
/// production = true
/// paillier_key_bits = 2048
/// max_transaction_amount = 1000000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    pub range_proof_backend: RangeProofBackendKind,
    pub psi_scheme: PsiScheme,
    pub compliance_level: ComplianceLevel,
    pub cancellation_window_secs: u64,
    /// JSON array of blacklisted addresses. `None` uses [`SAMPLE_BLACKLIST`].
    pub blacklist_path: Option<PathBuf>,
    /// JSON array of whitelisted addresses. `None` uses [`SAMPLE_WHITELIST`].
    pub whitelist_path: Option<PathBuf>,
    pub production: bool,
    pub paillier_key_bits: u64,
    pub max_transaction_amount: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            range_proof_backend: RangeProofBackendKind::Strong,
            psi_scheme: PsiScheme::Paillier,
            compliance_level: ComplianceLevel::Basic,
            cancellation_window_secs: DEFAULT_CANCELLATION_WINDOW_SECS,
            blacklist_path: None,
            whitelist_path: None,
            production: false,
            paillier_key_bits: DEFAULT_PAILLIER_KEY_BITS,
            max_transaction_amount: DEFAULT_MAX_TRANSACTION_AMOUNT,
        }
    }
}

impl ProtocolConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;

        // Relative list paths are relative to the config file, not the cwd.
        if let Some(base) = path.parent() {
            config.blacklist_path = config.blacklist_path.map(|p| base.join(p));
            config.whitelist_path = config.whitelist_path.map(|p| base.join(p));
        }
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that are unsafe or meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.production && self.range_proof_backend == RangeProofBackendKind::Emulated {
            return Err(ConfigError::EmulatedInProduction);
        }
        if self.cancellation_window_secs == 0
            || self.cancellation_window_secs > MAX_CANCELLATION_WINDOW_SECS
        {
            return Err(ConfigError::Invalid(format!(
                "cancellation_window_secs must be in [1, {}]",
                MAX_CANCELLATION_WINDOW_SECS
            )));
        }
        if self.paillier_key_bits < MIN_PAILLIER_KEY_BITS || self.paillier_key_bits % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "paillier_key_bits must be an even number >= {}",
                MIN_PAILLIER_KEY_BITS
            )));
        }
        if self.max_transaction_amount == 0 || self.max_transaction_amount > i64::MAX as u64 {
            return Err(ConfigError::Invalid(
                "max_transaction_amount must be in [1, i64::MAX]".into(),
            ));
        }
        Ok(())
    }

    /// The cancellation window as a `chrono` duration, capped at
    /// [`MAX_CANCELLATION_WINDOW_SECS`] for configs that skipped `validate`.
    pub fn cancellation_window(&self) -> chrono::Duration {
        let secs = self.cancellation_window_secs.min(MAX_CANCELLATION_WINDOW_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ProtocolConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.cancellation_window(), chrono::Duration::seconds(300));
        assert_eq!(cfg.range_proof_backend, RangeProofBackendKind::Strong);
    }

    #[test]
    fn test_parse_full_toml() {
        let cfg = ProtocolConfig::from_toml_str(
            r#"
            range_proof_backend = "simulated"
            psi_scheme = "schnorr"
            compliance_level = "advanced"
            cancellation_window_secs = 120
            production = false
            paillier_key_bits = 512
            max_transaction_amount = 5000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.range_proof_backend, RangeProofBackendKind::Simulated);
        assert_eq!(cfg.psi_scheme, PsiScheme::Schnorr);
        assert_eq!(cfg.compliance_level, ComplianceLevel::Advanced);
        assert_eq!(cfg.cancellation_window_secs, 120);
        assert_eq!(cfg.max_transaction_amount, 5000);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let cfg = ProtocolConfig::from_toml_str("psi_scheme = \"schnorr\"").unwrap();
        assert_eq!(cfg.psi_scheme, PsiScheme::Schnorr);
        assert_eq!(cfg.paillier_key_bits, DEFAULT_PAILLIER_KEY_BITS);
    }

    #[test]
    fn test_oversized_window_rejected() {
        for secs in ["10000000000000000", "5000000000000000"] {
            let err = ProtocolConfig::from_toml_str(&format!("cancellation_window_secs = {}", secs))
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{secs}");
        }
        ProtocolConfig::from_toml_str(&format!(
            "cancellation_window_secs = {}",
            MAX_CANCELLATION_WINDOW_SECS
        ))
        .unwrap();

        // Unvalidated configs still yield a usable duration.
        let cfg = ProtocolConfig {
            cancellation_window_secs: u64::MAX,
            ..ProtocolConfig::default()
        };
        assert_eq!(
            cfg.cancellation_window(),
            chrono::Duration::seconds(MAX_CANCELLATION_WINDOW_SECS as i64)
        );
    }

    #[test]
    fn test_emulated_refused_in_production() {
        let err = ProtocolConfig::from_toml_str(
            "range_proof_backend = \"emulated\"\nproduction = true",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmulatedInProduction));

        // Fine outside production.
        ProtocolConfig::from_toml_str("range_proof_backend = \"emulated\"").unwrap();
    }

    #[test]
    fn test_unknown_backend_is_a_parse_error() {
        let err = ProtocolConfig::from_toml_str("range_proof_backend = \"fastest\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ProtocolConfig::from_toml_str("cancellation_window_secs = 0").is_err());
        assert!(ProtocolConfig::from_toml_str("paillier_key_bits = 64").is_err());
        assert!(ProtocolConfig::from_toml_str("max_transaction_amount = 0").is_err());
    }

    #[test]
    fn test_load_resolves_relative_list_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shade.toml");
        fs::write(&path, "blacklist_path = \"lists/black.json\"\n").unwrap();
        let cfg = ProtocolConfig::load(&path).unwrap();
        assert_eq!(
            cfg.blacklist_path.unwrap(),
            dir.path().join("lists/black.json")
        );
        assert!(cfg.whitelist_path.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProtocolConfig::load(Path::new("/nonexistent/shade.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_families_are_distinct() {
        assert_eq!(TX_FAMILIES.len(), 3);
        assert_ne!(TX_FAMILY_FINANCIAL, TX_FAMILY_NOTARY);
        assert_ne!(TX_FAMILY_NOTARY, TX_FAMILY_COMPLIANCE);
    }
}
