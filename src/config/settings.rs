use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::KdfPolicy;
use crate::errors::{Result, VaultError};
use crate::vault::guard::GuardConfig;

use super::VaultConfig;

/// Project-level configuration, loaded from `.credvault.toml`.
///
/// Every field has a sensible default so credvault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Vault file used when `--vault` is not given (relative to the
    /// project directory).
    #[serde(default = "default_vault_path")]
    pub vault_path: String,

    /// Argon2 memory cost in KiB for new keys (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count for new keys (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree for new keys (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Weakest Argon2 memory cost accepted when opening (default: 8 MB).
    #[serde(default = "default_min_memory_kib")]
    pub min_memory_kib: u32,

    /// Weakest Argon2 iteration count accepted when opening (default: 1).
    #[serde(default = "default_min_iterations")]
    pub min_iterations: u32,

    /// Largest Argon2 memory cost accepted when opening (default: 4 GB).
    #[serde(default = "default_max_memory_kib")]
    pub max_memory_kib: u32,

    /// Largest Argon2 iteration count accepted when opening (default: 100).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Largest Argon2 parallelism accepted when opening (default: 64).
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: u32,

    /// Failed unlocks before a cooldown (default: 5, 0 disables).
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,

    /// Cooldown length in seconds (default: 30).
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Idle seconds before an open vault is locked (default: 0, off).
    #[serde(default)]
    pub auto_lock_secs: u64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_path() -> String {
    "credvault.vault".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_min_memory_kib() -> u32 {
    KdfPolicy::default().min_memory_kib
}

fn default_min_iterations() -> u32 {
    KdfPolicy::default().min_iterations
}

fn default_max_memory_kib() -> u32 {
    KdfPolicy::default().max_memory_kib
}

fn default_max_iterations() -> u32 {
    KdfPolicy::default().max_iterations
}

fn default_max_parallelism() -> u32 {
    KdfPolicy::default().max_parallelism
}

fn default_max_failed_attempts() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    30
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_path: default_vault_path(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            min_memory_kib: default_min_memory_kib(),
            min_iterations: default_min_iterations(),
            max_memory_kib: default_max_memory_kib(),
            max_iterations: default_max_iterations(),
            max_parallelism: default_max_parallelism(),
            max_failed_attempts: default_max_failed_attempts(),
            cooldown_secs: default_cooldown_secs(),
            auto_lock_secs: 0,
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".credvault.toml";

    /// Load settings from `<project_dir>/.credvault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        tracing::debug!(path = %config_path.display(), "loaded settings");
        Ok(settings)
    }

    /// Full path of the default vault file.
    pub fn vault_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.vault_path)
    }

    /// Convert into the runtime config handed to engine calls.
    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig {
            kdf_memory_kib: self.argon2_memory_kib,
            kdf_iterations: self.argon2_iterations,
            kdf_parallelism: self.argon2_parallelism,
            kdf_policy: KdfPolicy {
                min_memory_kib: self.min_memory_kib,
                min_iterations: self.min_iterations,
                max_memory_kib: self.max_memory_kib,
                max_iterations: self.max_iterations,
                max_parallelism: self.max_parallelism,
            },
            guard: GuardConfig {
                max_failures: self.max_failed_attempts,
                cooldown: Duration::from_secs(self.cooldown_secs),
            },
            auto_lock: (self.auto_lock_secs > 0).then(|| Duration::from_secs(self.auto_lock_secs)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
