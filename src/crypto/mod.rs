//! Cryptographic primitives for CredVault.
//!
//! This module provides:
//! - Argon2id passphrase-based key derivation (`kdf`)
//! - HKDF payload key derivation and the zeroizing `MasterKey` (`keys`)
//! - AES-256-GCM sealing with nonce-reuse detection (`cipher`)
//! - Key files as a second factor (`keyfile`)
//! - Random secrets for new entries (`generator`)

pub mod cipher;
pub mod generator;
pub mod kdf;
pub mod keyfile;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{derive, seal, open, ...};
pub use cipher::{generate_nonce, open, seal, VaultCipher, NONCE_LEN, TAG_LEN};
pub use generator::{generate_secret, Charset, SecretPolicy};
pub use kdf::{derive, derive_on_worker, generate_salt, KdfParams, KdfPolicy, SALT_LEN};
pub use keyfile::{generate_keyfile, load_keyfile};
pub use keys::{MasterKey, KEY_LEN};
