//! The collaborator-facing vault API.
//!
//! A `VaultSession` owns at most one open `VaultStore` together with the
//! file it came from.  Every unlock goes through the session's
//! `IntegrityGuard`.  When auto-lock is configured, an operation arriving
//! after the idle timeout closes the vault and fails with `Locked`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::VaultConfig;
use crate::errors::{Result, VaultError};

use super::entry::{Entry, EntryDraft, EntryId, EntryPatch};
use super::format;
use super::guard::{Clock, IntegrityGuard, SystemClock};
use super::search::SearchResults;
use super::store::VaultStore;

struct OpenVault {
    path: PathBuf,
    store: VaultStore,
}

/// Open/close lifecycle plus entry operations over one vault file.
pub struct VaultSession {
    config: VaultConfig,
    clock: Arc<dyn Clock>,
    guard: IntegrityGuard,
    open: Option<OpenVault>,
    last_activity: Instant,
}

impl VaultSession {
    pub fn new(config: VaultConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Session whose guard and idle timer read `clock`.
    pub fn with_clock(config: VaultConfig, clock: Arc<dyn Clock>) -> Self {
        let guard = IntegrityGuard::new(config.guard, Arc::clone(&clock));
        let last_activity = clock.now();
        Self {
            config,
            clock,
            guard,
            open: None,
            last_activity,
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn guard(&self) -> &IntegrityGuard {
        &self.guard
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Path of the open vault, if any.
    pub fn path(&self) -> Option<&Path> {
        self.open.as_ref().map(|o| o.path.as_path())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Read and unlock the vault at `path`, replacing any open vault.
    ///
    /// Refused with `Cooldown` while the guard is locked.  Wrong
    /// passphrases and tampered files count towards the guard threshold.
    pub fn open_vault(
        &mut self,
        path: &Path,
        passphrase: &[u8],
        keyfile_bytes: Option<&[u8]>,
    ) -> Result<()> {
        let config = self.config;
        let store = self.guard.attempt(|| {
            let bytes = format::read_file(path)?;
            VaultStore::open(&bytes, passphrase, keyfile_bytes, &config)
        })?;

        self.install(path, store);
        tracing::debug!(path = %path.display(), "session opened vault");
        Ok(())
    }

    /// Create a new empty vault at `path` and write it immediately.
    ///
    /// Fails with `AlreadyExists` rather than overwriting a file.
    pub fn create_vault(
        &mut self,
        path: &Path,
        passphrase: &[u8],
        keyfile_bytes: Option<&[u8]>,
    ) -> Result<()> {
        if path.exists() {
            return Err(VaultError::AlreadyExists(path.to_path_buf()));
        }

        let store = VaultStore::create(passphrase, keyfile_bytes, &self.config)?;
        format::write_file(path, &store.seal()?)?;

        self.install(path, store);
        tracing::debug!(path = %path.display(), "session created vault");
        Ok(())
    }

    /// Seal the open vault and write it back to its file.
    pub fn save_vault(&mut self) -> Result<()> {
        let open = self.active()?;
        let bytes = open.store.seal()?;
        format::write_file(&open.path, &bytes)
    }

    /// Drop the open vault without saving.  Closing twice is a no-op.
    pub fn close_vault(&mut self) {
        if let Some(open) = self.open.take() {
            open.store.close();
        }
    }

    fn install(&mut self, path: &Path, store: VaultStore) {
        self.close_vault();
        self.open = Some(OpenVault {
            path: path.to_path_buf(),
            store,
        });
        self.last_activity = self.clock.now();
    }

    /// The open vault, after applying the idle timeout.
    fn active(&mut self) -> Result<&OpenVault> {
        let now = self.clock.now();
        if let Some(limit) = self.config.auto_lock {
            if self.open.is_some() && now.saturating_duration_since(self.last_activity) >= limit {
                tracing::debug!(idle_secs = limit.as_secs(), "auto-locking idle vault");
                self.close_vault();
            }
        }
        self.last_activity = now;
        self.open.as_ref().ok_or(VaultError::Locked)
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    pub fn list_entries(&mut self) -> Result<Vec<Entry>> {
        Ok(self.active()?.store.list_entries())
    }

    pub fn lookup(&mut self, id: EntryId) -> Result<Entry> {
        self.active()?
            .store
            .lookup(id)
            .ok_or_else(|| VaultError::NotFound(id.to_string()))
    }

    /// Resolve a full id or unique id prefix against the open vault.
    pub fn resolve_id(&mut self, text: &str) -> Result<EntryId> {
        self.active()?.store.resolve_id(text)
    }

    pub fn search<P>(&mut self, predicate: P) -> Result<SearchResults<P>>
    where
        P: Fn(&Entry) -> bool,
    {
        Ok(self.active()?.store.search(predicate))
    }

    pub fn add_entry(&mut self, draft: EntryDraft) -> Result<EntryId> {
        self.active()?.store.add_entry(draft)
    }

    pub fn update_entry(&mut self, id: EntryId, patch: EntryPatch) -> Result<()> {
        self.active()?.store.update_entry(id, patch)
    }

    pub fn remove_entry(&mut self, id: EntryId) -> Result<()> {
        self.active()?.store.remove_entry(id)
    }

    /// Re-key the open vault.  Takes effect on disk at the next save.
    pub fn change_passphrase(
        &mut self,
        new_passphrase: &[u8],
        keyfile_bytes: Option<&[u8]>,
    ) -> Result<()> {
        let config = self.config;
        self.active()?
            .store
            .change_passphrase(new_passphrase, keyfile_bytes, &config)
    }

    pub fn modification_counter(&mut self) -> Result<u64> {
        Ok(self.active()?.store.modification_counter())
    }

    /// Borrow the open store directly.
    pub fn store(&mut self) -> Result<&VaultStore> {
        Ok(&self.active()?.store)
    }
}

impl Drop for VaultSession {
    fn drop(&mut self) {
        self.close_vault();
    }
}
