//! Password-based key derivation using Argon2id.
//!
//! Argon2id is a memory-hard KDF that protects against brute-force and
//! GPU-based attacks.  Cost parameters travel with the vault header so a
//! vault always reopens with the settings it was created with, while the
//! `KdfPolicy` decides which settings are acceptable at all.

use std::thread::{self, JoinHandle};

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::keys::{MasterKey, KEY_LEN};
use crate::errors::{Result, VaultError};

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Argon2id cost parameters plus the salt they are applied with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
    /// Random per-vault salt.
    pub salt: [u8; SALT_LEN],
}

impl KdfParams {
    /// Default costs with a freshly generated salt.
    pub fn generate() -> Self {
        Self::with_costs(65_536, 3, 4)
    }

    /// Explicit costs with a freshly generated salt.
    pub fn with_costs(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
            salt: generate_salt(),
        }
    }
}

/// Acceptable range of KDF costs.
///
/// Checked both when creating a vault and when opening one.  The costs of
/// a stored vault are read from the clear header before anything is
/// authenticated, so a file edited to carry cheap parameters, or huge ones
/// that would stall or exhaust memory, is refused before any hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfPolicy {
    /// Minimum memory cost in KiB (default: 8 MB).
    pub min_memory_kib: u32,
    /// Minimum iteration count (default: 1).
    pub min_iterations: u32,
    /// Maximum memory cost in KiB (default: 4 GB).
    pub max_memory_kib: u32,
    /// Maximum iteration count (default: 100).
    pub max_iterations: u32,
    /// Maximum parallelism lanes (default: 64).
    pub max_parallelism: u32,
}

impl Default for KdfPolicy {
    fn default() -> Self {
        Self {
            min_memory_kib: 8_192,
            min_iterations: 1,
            max_memory_kib: 4 * 1024 * 1024,
            max_iterations: 100,
            max_parallelism: 64,
        }
    }
}

impl KdfPolicy {
    /// Reject parameters outside this policy.
    pub fn check(&self, params: &KdfParams) -> Result<()> {
        if params.memory_kib < self.min_memory_kib {
            return Err(VaultError::WeakParameter(format!(
                "Argon2 memory_kib must be at least {} (got {})",
                self.min_memory_kib, params.memory_kib
            )));
        }
        if params.iterations < self.min_iterations.max(1) {
            return Err(VaultError::WeakParameter(format!(
                "Argon2 iterations must be at least {} (got {})",
                self.min_iterations.max(1),
                params.iterations
            )));
        }
        if params.parallelism < 1 {
            return Err(VaultError::WeakParameter(
                "Argon2 parallelism must be at least 1".into(),
            ));
        }
        if params.memory_kib > self.max_memory_kib {
            return Err(VaultError::WeakParameter(format!(
                "Argon2 memory_kib must be at most {} (got {})",
                self.max_memory_kib, params.memory_kib
            )));
        }
        if params.iterations > self.max_iterations {
            return Err(VaultError::WeakParameter(format!(
                "Argon2 iterations must be at most {} (got {})",
                self.max_iterations, params.iterations
            )));
        }
        if params.parallelism > self.max_parallelism {
            return Err(VaultError::WeakParameter(format!(
                "Argon2 parallelism must be at most {} (got {})",
                self.max_parallelism, params.parallelism
            )));
        }
        Ok(())
    }
}

/// Derive a 32-byte master key from a passphrase with Argon2id.
///
/// The same passphrase + params will always produce the same key.
/// The caller remains responsible for wiping its own copy of the passphrase.
pub fn derive(passphrase: &[u8], params: &KdfParams, policy: &KdfPolicy) -> Result<MasterKey> {
    policy.check(params)?;

    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| VaultError::WeakParameter(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase, &params.salt, key.as_mut_slice())
        .map_err(|e| VaultError::KeyDerivation(format!("Argon2id hashing failed: {e}")))?;

    Ok(MasterKey::new(*key))
}

/// Run [`derive`] on a dedicated worker thread.
///
/// Derivation is CPU bound and takes hundreds of milliseconds with the
/// default costs, so interactive callers hand it off and join later.
/// There is no cancellation: a wrong passphrase runs to completion too.
pub fn derive_on_worker(
    passphrase: Zeroizing<Vec<u8>>,
    params: KdfParams,
    policy: KdfPolicy,
) -> JoinHandle<Result<MasterKey>> {
    thread::spawn(move || derive(&passphrase, &params, &policy))
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}
