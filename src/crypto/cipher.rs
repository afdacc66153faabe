//! AES-256-GCM authenticated encryption of the vault payload.
//!
//! Output layout of [`seal`]:
//!   [ ciphertext | 16-byte auth tag ]
//!
//! The nonce is *not* prepended here; it lives in the vault header, which
//! is passed back in as associated data so header tampering breaks the tag.

use std::collections::HashSet;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::keys::KEY_LEN;
use crate::errors::{Result, VaultError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt and authenticate `plaintext`, binding `associated_data`.
pub fn seal(
    plaintext: &[u8],
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    associated_data: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Encryption(format!("invalid key length: {e}")))?;

    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad: associated_data,
            },
        )
        .map_err(|e| VaultError::Encryption(format!("encryption error: {e}")))
}

/// Verify and decrypt data produced by [`seal`].
///
/// Every failure (bad key, flipped bit, wrong nonce, altered associated
/// data, truncated input) surfaces as `Auth`.
pub fn open(
    sealed: &[u8],
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    associated_data: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < TAG_LEN {
        return Err(VaultError::Auth);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::Auth)?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: sealed,
                aad: associated_data,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| VaultError::Auth)
}

/// Generate a random 12-byte nonce.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// A payload key together with every nonce it has been used with.
///
/// Sealing twice with the same nonce under one key breaks GCM outright,
/// so the second attempt is refused before anything is encrypted.
pub struct VaultCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
    used_nonces: HashSet<[u8; NONCE_LEN]>,
}

impl VaultCipher {
    /// Wrap a payload key with an empty nonce history.
    pub fn new(key: Zeroizing<[u8; KEY_LEN]>) -> Self {
        Self {
            key,
            used_nonces: HashSet::new(),
        }
    }

    /// Record a nonce that was already used with this key elsewhere
    /// (for example, the one found in a file that was just opened).
    pub fn mark_used(&mut self, nonce: [u8; NONCE_LEN]) {
        self.used_nonces.insert(nonce);
    }

    /// Returns `true` if `nonce` has been used with this key.
    pub fn is_used(&self, nonce: &[u8; NONCE_LEN]) -> bool {
        self.used_nonces.contains(nonce)
    }

    /// Seal under this key, failing with `NonceReuse` for a repeated nonce.
    pub fn seal(
        &mut self,
        plaintext: &[u8],
        nonce: &[u8; NONCE_LEN],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        if self.used_nonces.contains(nonce) {
            tracing::error!("refusing to seal with a previously used nonce");
            return Err(VaultError::NonceReuse);
        }
        let sealed = seal(plaintext, self.key.as_slice(), nonce, associated_data)?;
        self.used_nonces.insert(*nonce);
        Ok(sealed)
    }

    /// Open data sealed under this key.
    pub fn open(
        &self,
        sealed: &[u8],
        nonce: &[u8; NONCE_LEN],
        associated_data: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        open(sealed, self.key.as_slice(), nonce, associated_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cipher_refuses_repeated_nonce() {
        let mut cipher = VaultCipher::new(Zeroizing::new([7u8; KEY_LEN]));
        let nonce = [1u8; NONCE_LEN];

        cipher.seal(b"first", &nonce, b"ad").unwrap();
        let err = cipher.seal(b"second", &nonce, b"ad").unwrap_err();
        assert!(matches!(err, VaultError::NonceReuse));
    }

    #[test]
    fn marked_nonce_counts_as_used() {
        let mut cipher = VaultCipher::new(Zeroizing::new([7u8; KEY_LEN]));
        let nonce = [2u8; NONCE_LEN];
        cipher.mark_used(nonce);
        assert!(cipher.is_used(&nonce));
        assert!(cipher.seal(b"data", &nonce, b"").is_err());
    }

    #[test]
    fn failed_seal_does_not_consume_nonce() {
        let mut cipher = VaultCipher::new(Zeroizing::new([7u8; KEY_LEN]));
        let nonce = [3u8; NONCE_LEN];
        assert!(!cipher.is_used(&nonce));
        let sealed = cipher.seal(b"data", &nonce, b"").unwrap();
        assert_eq!(&*cipher.open(&sealed, &nonce, b"").unwrap(), b"data");
    }

    #[test]
    fn open_rejects_short_input() {
        let key = [0u8; KEY_LEN];
        let result = open(&[0u8; TAG_LEN - 1], &key, &[0u8; NONCE_LEN], b"");
        assert!(matches!(result, Err(VaultError::Auth)));
    }
}
