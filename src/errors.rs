use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// All errors that can occur in CredVault.
///
/// Messages never carry passphrases, derived keys or entry secrets.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Crypto errors ---
    #[error("Key derivation parameters rejected by policy: {0}")]
    WeakParameter(String),

    /// Wrong passphrase and tampered data are deliberately the same error.
    #[error("Authentication failed — wrong passphrase or corrupted vault")]
    Auth,

    #[error("Nonce was already used with this key")]
    NonceReuse,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    // --- Vault errors ---
    #[error("Malformed vault record: {0}")]
    MalformedRecord(String),

    #[error("Entry '{0}' not found")]
    NotFound(String),

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Too many failed attempts — try again in {}s", remaining.as_secs().max(1))]
    Cooldown { remaining: Duration },

    #[error("Vault is locked — open it again to continue")]
    Locked,

    #[error("Vault already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("Vault not found at {0}")]
    VaultNotFound(PathBuf),

    // --- Keyfile errors ---
    #[error("Keyfile error: {0}")]
    Keyfile(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("Audit error: {0}")]
    Audit(String),
}

/// Coarse classification of a [`VaultError`], stable for callers that
/// branch on the failure category rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    WeakParameter,
    Auth,
    NonceReuse,
    MalformedRecord,
    NotFound,
    InvalidEntry,
    Cooldown,
    Locked,
    Io,
    Keyfile,
    Config,
    Other,
}

impl VaultError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WeakParameter(_) => ErrorKind::WeakParameter,
            Self::Auth => ErrorKind::Auth,
            Self::NonceReuse => ErrorKind::NonceReuse,
            Self::MalformedRecord(_) => ErrorKind::MalformedRecord,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidEntry(_) => ErrorKind::InvalidEntry,
            Self::Cooldown { .. } => ErrorKind::Cooldown,
            Self::Locked => ErrorKind::Locked,
            Self::Io(_) | Self::VaultNotFound(_) | Self::AlreadyExists(_) => ErrorKind::Io,
            Self::Keyfile(_) => ErrorKind::Keyfile,
            Self::Config(_) => ErrorKind::Config,
            Self::Encryption(_)
            | Self::KeyDerivation(_)
            | Self::Serialization(_)
            | Self::CommandFailed(_)
            | Self::UserCancelled
            | Self::Audit(_) => ErrorKind::Other,
        }
    }

    /// Shorthand for building a `MalformedRecord` error.
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }
}

/// Convenience type alias for CredVault results.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_message_does_not_distinguish_causes() {
        let msg = VaultError::Auth.to_string();
        assert!(msg.contains("wrong passphrase or corrupted"));
    }

    #[test]
    fn cooldown_message_rounds_up_to_one_second() {
        let err = VaultError::Cooldown {
            remaining: Duration::from_millis(200),
        };
        assert!(err.to_string().contains("1s"));
        assert_eq!(err.kind(), ErrorKind::Cooldown);
    }

    #[test]
    fn io_related_errors_share_a_kind() {
        assert_eq!(
            VaultError::VaultNotFound(PathBuf::from("x")).kind(),
            ErrorKind::Io
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(VaultError::from(io).kind(), ErrorKind::Io);
    }
}
