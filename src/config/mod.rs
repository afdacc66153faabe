//! Configuration: the `.credvault.toml` file layer (`settings`) and the
//! runtime `VaultConfig` object handed to engine calls.

pub mod settings;

use std::time::Duration;

pub use settings::Settings;

use crate::crypto::{KdfParams, KdfPolicy};
use crate::vault::guard::GuardConfig;

/// Runtime policy for creating, opening and guarding vaults.
///
/// Passed explicitly to every engine entry point; nothing here is global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultConfig {
    /// Argon2 memory cost in KiB for newly keyed vaults.
    pub kdf_memory_kib: u32,
    /// Argon2 iterations for newly keyed vaults.
    pub kdf_iterations: u32,
    /// Argon2 lanes for newly keyed vaults.
    pub kdf_parallelism: u32,
    /// Minimum costs accepted on create *and* open.
    pub kdf_policy: KdfPolicy,
    /// Failed-unlock throttling.
    pub guard: GuardConfig,
    /// Close an open session after this much inactivity.
    pub auto_lock: Option<Duration>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_memory_kib: 65_536,
            kdf_iterations: 3,
            kdf_parallelism: 4,
            kdf_policy: KdfPolicy::default(),
            guard: GuardConfig::default(),
            auto_lock: None,
        }
    }
}

impl VaultConfig {
    /// Override the KDF costs used for new keys.
    pub fn with_kdf_costs(mut self, memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        self.kdf_memory_kib = memory_kib;
        self.kdf_iterations = iterations;
        self.kdf_parallelism = parallelism;
        self
    }

    /// Fresh KDF parameters (new random salt) for a new key.
    pub fn new_kdf_params(&self) -> KdfParams {
        KdfParams::with_costs(
            self.kdf_memory_kib,
            self.kdf_iterations,
            self.kdf_parallelism,
        )
    }
}
