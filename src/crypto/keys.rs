//! Master key handling and HKDF-SHA256 sub-key derivation.
//!
//! The Argon2id output is never used directly as a cipher key.  HKDF
//! (RFC 5869) expands it with a context string (`info`) into purpose-bound
//! sub-keys, so the same master key can safely serve more than one use.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{Result, VaultError};

/// Length of the master key and derived sub-keys (256 bits).
pub const KEY_LEN: usize = 32;

/// HKDF context for the key that seals the vault payload.
const PAYLOAD_KEY_INFO: &[u8] = b"credvault-payload-key";

/// Derive the payload encryption key from the master key.
pub fn derive_payload_key(master_key: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    hkdf_derive(master_key, PAYLOAD_KEY_INFO)
}

/// Internal helper: run HKDF-SHA256 expand with the given `info`.
///
/// The master key already has full entropy (it came from Argon2id), so no
/// salt is mixed in at this stage.
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info, okm.as_mut_slice())
        .map_err(|e| VaultError::KeyDerivation(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// A wrapper around a 32-byte master key that automatically zeroes
/// its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Derive the payload encryption key from this master key.
    pub fn derive_payload_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        derive_payload_key(&self.bytes)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_key_is_deterministic_and_distinct_from_master() {
        let master = MasterKey::new([0x42; KEY_LEN]);
        let a = master.derive_payload_key().unwrap();
        let b = master.derive_payload_key().unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, *master.as_bytes());
    }

    #[test]
    fn debug_output_is_redacted() {
        let master = MasterKey::new([0x42; KEY_LEN]);
        assert_eq!(format!("{master:?}"), "MasterKey(<redacted>)");
    }
}
