pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod logging;
pub mod vault;

#[cfg(feature = "audit-log")]
pub mod audit;

pub use config::{Settings, VaultConfig};
pub use errors::{ErrorKind, Result, VaultError};
pub use vault::{Entry, EntryDraft, EntryId, EntryPatch, Query, VaultSession, VaultStore};
