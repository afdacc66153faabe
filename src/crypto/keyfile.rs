//! Key files as a second unlock factor.
//!
//! A key file is 32 random bytes kept outside the vault.  When a vault is
//! created with one, the passphrase fed to Argon2id becomes
//! `HMAC-SHA256(keyfile_bytes, passphrase)`, so both are needed to open it.
//!
//! The vault header only records *that* a key file is required.  A wrong
//! key file derives a wrong key and fails as an ordinary `Auth` error.

use std::fs;
use std::path::Path;

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::errors::{Result, VaultError};

/// Expected length of a keyfile in bytes (256 bits).
pub const KEYFILE_LEN: usize = 32;

/// Generate a new random keyfile and write it to `path`.
///
/// The file is written with owner-only permissions on Unix.
/// Returns the raw keyfile bytes so the caller can use them immediately.
pub fn generate_keyfile(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    if path.exists() {
        return Err(VaultError::Keyfile(format!(
            "keyfile already exists at {}",
            path.display()
        )));
    }

    let mut keyfile = Zeroizing::new(vec![0u8; KEYFILE_LEN]);
    OsRng.fill_bytes(keyfile.as_mut_slice());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                VaultError::Keyfile(format!("cannot create keyfile directory: {e}"))
            })?;
        }
    }

    fs::write(path, keyfile.as_slice())
        .map_err(|e| VaultError::Keyfile(format!("failed to write keyfile: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms).map_err(|e| {
            VaultError::Keyfile(format!("failed to set keyfile permissions: {e}"))
        })?;
    }

    tracing::debug!(path = %path.display(), "generated keyfile");
    Ok(keyfile)
}

/// Load a keyfile from disk and validate its length.
pub fn load_keyfile(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    if !path.exists() {
        return Err(VaultError::Keyfile(format!(
            "keyfile not found at {}",
            path.display()
        )));
    }

    let data = Zeroizing::new(
        fs::read(path).map_err(|e| VaultError::Keyfile(format!("failed to read keyfile: {e}")))?,
    );

    if data.len() != KEYFILE_LEN {
        return Err(VaultError::Keyfile(format!(
            "keyfile must be exactly {} bytes, got {}",
            KEYFILE_LEN,
            data.len()
        )));
    }

    Ok(data)
}

/// Combine a passphrase and keyfile into a single effective passphrase.
pub fn combine_passphrase_keyfile(
    passphrase: &[u8],
    keyfile_bytes: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(keyfile_bytes)
        .map_err(|e| VaultError::Keyfile(format!("HMAC init failed: {e}")))?;

    mac.update(passphrase);

    Ok(Zeroizing::new(mac.finalize().into_bytes().to_vec()))
}

/// The bytes actually handed to the KDF: the bare passphrase, or its
/// combination with the keyfile when one is supplied.
pub fn effective_passphrase(
    passphrase: &[u8],
    keyfile_bytes: Option<&[u8]>,
) -> Result<Zeroizing<Vec<u8>>> {
    match keyfile_bytes {
        Some(kf) => combine_passphrase_keyfile(passphrase, kf),
        None => Ok(Zeroizing::new(passphrase.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generate_and_load_keyfile_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.key");

        let generated = generate_keyfile(&path).unwrap();
        assert_eq!(generated.len(), KEYFILE_LEN);

        let loaded = load_keyfile(&path).unwrap();
        assert_eq!(*generated, *loaded);
    }

    #[test]
    fn generate_keyfile_fails_if_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.key");

        generate_keyfile(&path).unwrap();
        assert!(generate_keyfile(&path).is_err());
    }

    #[test]
    fn load_keyfile_fails_if_missing() {
        let dir = TempDir::new().unwrap();
        let result = load_keyfile(&dir.path().join("nonexistent.key"));
        assert!(matches!(result, Err(VaultError::Keyfile(_))));
    }

    #[test]
    fn load_keyfile_fails_on_wrong_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.key");
        fs::write(&path, [0u8; 16]).unwrap();

        assert!(load_keyfile(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn keyfile_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.key");
        generate_keyfile(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn combine_is_deterministic_and_keyfile_sensitive() {
        let a = combine_passphrase_keyfile(b"pw", &[0xAB; 32]).unwrap();
        let b = combine_passphrase_keyfile(b"pw", &[0xAB; 32]).unwrap();
        let c = combine_passphrase_keyfile(b"pw", &[0xCD; 32]).unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn effective_passphrase_without_keyfile_is_passthrough() {
        let pw = effective_passphrase(b"plain", None).unwrap();
        assert_eq!(pw.as_slice(), b"plain");
    }
}
