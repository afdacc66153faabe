//! On-disk vault envelope and atomic file IO.
//!
//! A `.cvault` file has this layout:
//!
//! ```text
//! [CVLT: 4 bytes][header block][AES-256-GCM(payload) + 16-byte tag]
//! ```
//!
//! - **Magic** (`CVLT`): identifies the file as a CredVault vault.
//! - **Header block**: format version, Argon2 parameters, salt, nonce,
//!   keyfile flag and creation time (see `codec::encode_header`).  It is
//!   stored in the clear because it is needed before the key exists.
//! - **Sealed payload**: the codec encoding of the whole vault.  Magic and
//!   header block together are the AEAD associated data, so editing any
//!   header byte makes decryption fail.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};

use super::codec::{self, Reader};
use crate::crypto::{KdfParams, NONCE_LEN, TAG_LEN};
use crate::errors::{Result, VaultError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes at the start of every vault file.
pub const MAGIC: &[u8; 4] = b"CVLT";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// VaultHeader
// ---------------------------------------------------------------------------

/// Metadata stored in the clear at the beginning of a vault file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultHeader {
    /// Format version.
    pub format_version: u8,

    /// Argon2id parameters and salt.  Only replaced when the vault is
    /// created or its passphrase changes.
    pub kdf: KdfParams,

    /// Nonce of the most recent seal.  Replaced on every save.
    pub nonce: [u8; NONCE_LEN],

    /// Whether a keyfile must be combined with the passphrase.
    pub keyfile_required: bool,

    /// When this vault was first created.
    pub created_at: DateTime<Utc>,
}

impl VaultHeader {
    /// A fresh header for a new vault.  The nonce is filled in at seal time.
    pub fn new(kdf: KdfParams, keyfile_required: bool) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            kdf,
            nonce: [0u8; NONCE_LEN],
            keyfile_required,
            created_at: Utc::now(),
        }
    }

    /// The bytes that precede the ciphertext: magic followed by the header
    /// block.  This is also the AEAD associated data.
    pub fn prefix_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(96);
        buf.extend_from_slice(MAGIC);
        codec::encode_header(self, &mut buf);
        buf
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A vault file split into its parts, before any decryption.
#[derive(Debug)]
pub struct SealedVault<'a> {
    pub header: VaultHeader,
    /// Magic + header block exactly as read, used as associated data.
    pub associated_data: &'a [u8],
    /// Ciphertext followed by the auth tag.
    pub ciphertext: &'a [u8],
}

/// Split raw vault bytes into header and ciphertext.
///
/// Only structure is checked here; authenticity is established later by
/// the AEAD tag.
pub fn parse(bytes: &[u8]) -> Result<SealedVault<'_>> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(VaultError::malformed("missing CVLT magic bytes"));
    }

    let mut reader = Reader::new(&bytes[MAGIC.len()..]);
    let header = codec::decode_header(&mut reader)?;
    let prefix_len = MAGIC.len() + reader.position();

    let ciphertext = &bytes[prefix_len..];
    if ciphertext.len() < TAG_LEN {
        return Err(VaultError::malformed(
            "file too small to contain an authentication tag",
        ));
    }

    Ok(SealedVault {
        header,
        associated_data: &bytes[..prefix_len],
        ciphertext,
    })
}

/// Assemble the file bytes from a header and the sealed payload.
pub fn assemble(header: &VaultHeader, ciphertext: &[u8]) -> Vec<u8> {
    let mut buf = header.prefix_bytes();
    buf.extend_from_slice(ciphertext);
    buf
}

// ---------------------------------------------------------------------------
// File IO
// ---------------------------------------------------------------------------

/// Write vault bytes to disk **atomically**.
///
/// The bytes go to a temp file in the same directory which is then renamed
/// over the target, so readers never see a half-written vault.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&tmp_path, path)?;
    tracing::debug!(path = %path.display(), len = bytes.len(), "vault file written");
    Ok(())
}

/// Read raw vault bytes from disk.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(VaultError::VaultNotFound(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}
