//! Vault module: encrypted credential storage.
//!
//! This module provides:
//! - `Entry`, `EntryDraft` and `EntryPatch` (`entry`)
//! - The plaintext binary encoding of a vault (`codec`)
//! - The sealed file envelope and atomic file I/O (`format`)
//! - `VaultStore`, the in-memory working copy (`store`)
//! - Snapshot searches (`search`)
//! - Failed-unlock throttling (`guard`)
//! - `VaultSession`, the open/save/close lifecycle (`session`)

pub mod codec;
pub mod entry;
pub mod format;
pub mod guard;
pub mod search;
pub mod session;
pub mod store;

// Re-export the most commonly used items.
pub use codec::Vault;
pub use entry::{CustomField, Entry, EntryDraft, EntryId, EntryPatch};
pub use format::VaultHeader;
pub use guard::{
    Clock, GuardConfig, GuardRecord, GuardState, IntegrityGuard, ManualClock, SystemClock,
};
pub use search::{Query, SearchResults};
pub use session::VaultSession;
pub use store::VaultStore;
