//! scrypt key derivation
//!
//! Turns a password and a per-envelope salt into a 32-byte AES-256 key.
//! Derivation is deliberately expensive and never cached; every encrypt and
//! decrypt call pays for exactly one derivation.

use crate::error::{ErrorCategory, ErrorKind, PwcryptError, Result};
use crate::password::Password;
use log::trace;
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 8;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// log2 of the scrypt N parameter (CPU/memory cost), N = 16384
pub const DEFAULT_LOG_N: u8 = 14;

/// scrypt r parameter (block size)
pub const DEFAULT_R: u32 = 8;

/// scrypt p parameter (parallelization)
pub const DEFAULT_P: u32 = 1;

/// Upper bound on scrypt working memory (128 * r * N bytes).
pub const MAX_MEMORY_BYTES: u64 = 1 << 30;

/// scrypt cost parameters.
///
/// Envelopes do not record these, so anything other than the default
/// produces envelopes only readable with the same custom parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: DEFAULT_LOG_N,
            r: DEFAULT_R,
            p: DEFAULT_P,
        }
    }
}

impl KdfParams {
    pub const fn new(log_n: u8, r: u32, p: u32) -> Self {
        Self { log_n, r, p }
    }

    /// scrypt working memory in bytes, or `None` if it does not fit in a u64.
    pub fn memory_bytes(&self) -> Option<u64> {
        1u64.checked_shl(u32::from(self.log_n))
            .and_then(|n| n.checked_mul(128))
            .and_then(|m| m.checked_mul(u64::from(self.r)))
    }

    /// Checks the parameters without deriving anything.
    pub fn validate(&self) -> Result<()> {
        self.to_scrypt().map(|_| ())
    }

    fn to_scrypt(&self) -> Result<scrypt::Params> {
        if self.r == 0 || self.p == 0 {
            return Err(PwcryptError::with_kind(
                ErrorCategory::KdfParameters,
                ErrorKind::InvalidCostParameters,
                format!(
                    "scrypt r and p must be positive (r={}, p={})",
                    self.r, self.p
                ),
            ));
        }

        match self.memory_bytes() {
            Some(bytes) if bytes <= MAX_MEMORY_BYTES => {}
            _ => {
                return Err(PwcryptError::with_kind(
                    ErrorCategory::KdfParameters,
                    ErrorKind::InvalidCostParameters,
                    format!(
                        "scrypt memory for log_n={} r={} exceeds the {} byte limit",
                        self.log_n, self.r, MAX_MEMORY_BYTES
                    ),
                ));
            }
        }

        scrypt::Params::new(self.log_n, self.r, self.p, KEY_LEN).map_err(|e| {
            PwcryptError::with_kind_and_source(
                ErrorCategory::KdfParameters,
                ErrorKind::InvalidCostParameters,
                "scrypt rejected cost parameters",
                e,
            )
        })
    }
}

/// Derive a 32-byte key from a password and salt using scrypt
pub fn derive_key(
    password: &Password,
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let scrypt_params = params.to_scrypt()?;
    trace!(
        "deriving key: log_n={} r={} p={}",
        params.log_n, params.r, params.p
    );

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(password.as_bytes(), salt, &scrypt_params, &mut key[..]).map_err(|e| {
        PwcryptError::with_kind_and_source(
            ErrorCategory::KdfParameters,
            ErrorKind::KeyDerivation,
            "scrypt key derivation failed",
            e,
        )
    })?;

    Ok(key)
}
