//! The authoritative in-memory working copy of an open vault.
//!
//! `VaultStore` ties the layers together: key derivation and payload
//! decryption on open, the entry index and counter while the vault is
//! in use, and encoding + sealing when bytes are needed again.
//!
//! Mutations and `seal` take the write lock, so they never interleave.
//! Reads hold the read lock only long enough to clone an `Arc` of the
//! entry list; the next mutation copies the list (`Arc::make_mut`) if any
//! reader still holds it, which keeps every earlier snapshot intact.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use subtle::ConstantTimeEq;

use crate::config::VaultConfig;
use crate::crypto::keyfile::effective_passphrase;
use crate::crypto::{derive, generate_nonce, VaultCipher, NONCE_LEN};
use crate::errors::{Result, VaultError};

use super::codec::{self, Vault};
use super::entry::{Entry, EntryDraft, EntryId, EntryPatch};
use super::format::{self, VaultHeader};
use super::search::SearchResults;

struct State {
    header: VaultHeader,
    entries: Arc<Vec<Entry>>,
    index: HashMap<EntryId, usize>,
    modification_counter: u64,
    cipher: VaultCipher,
}

impl State {
    fn position(&self, id: EntryId) -> Result<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or_else(|| VaultError::NotFound(id.to_string()))
    }

    fn bump(&mut self) {
        self.modification_counter = self.modification_counter.saturating_add(1);
    }
}

/// An open, decrypted vault.  Create one with `VaultStore::create` or
/// `VaultStore::open`.
pub struct VaultStore {
    state: RwLock<State>,
}

impl VaultStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Key a brand-new, empty vault.
    ///
    /// A fresh salt is generated and the configured KDF costs are checked
    /// against the configured policy.  Nothing is written anywhere; call
    /// `seal` to obtain the bytes.
    pub fn create(
        passphrase: &[u8],
        keyfile_bytes: Option<&[u8]>,
        config: &VaultConfig,
    ) -> Result<Self> {
        let kdf = config.new_kdf_params();
        let effective = effective_passphrase(passphrase, keyfile_bytes)?;
        let master_key = derive(&effective, &kdf, &config.kdf_policy)?;
        let cipher = VaultCipher::new(master_key.derive_payload_key()?);

        let header = VaultHeader::new(kdf, keyfile_bytes.is_some());
        tracing::debug!(
            memory_kib = kdf.memory_kib,
            iterations = kdf.iterations,
            keyfile = keyfile_bytes.is_some(),
            "created vault"
        );
        Ok(Self::from_parts(header, Vec::new(), 0, cipher))
    }

    /// Decrypt and decode vault bytes.
    ///
    /// Runs envelope parsing, key derivation, AEAD open and decoding in
    /// that order.  Any failure is returned as-is and no store exists
    /// afterwards.  If the vault was created without a keyfile, a supplied
    /// keyfile is ignored.
    pub fn open(
        bytes: &[u8],
        passphrase: &[u8],
        keyfile_bytes: Option<&[u8]>,
        config: &VaultConfig,
    ) -> Result<Self> {
        let sealed = format::parse(bytes)?;
        let header = &sealed.header;

        let keyfile_bytes = if header.keyfile_required {
            Some(keyfile_bytes.ok_or_else(|| {
                VaultError::Keyfile("this vault requires a keyfile — use --keyfile <path>".into())
            })?)
        } else {
            None
        };

        // Refuse cheap parameters before spending any CPU on them.
        config.kdf_policy.check(&header.kdf)?;

        let effective = effective_passphrase(passphrase, keyfile_bytes)?;
        let master_key = derive(&effective, &header.kdf, &config.kdf_policy)?;
        let mut cipher = VaultCipher::new(master_key.derive_payload_key()?);

        let plaintext = cipher.open(sealed.ciphertext, &header.nonce, sealed.associated_data)?;
        let vault = codec::decode(&plaintext)?;

        // The sealed copy of the header must agree with the clear one.
        let mut outer = Vec::new();
        codec::encode_header(header, &mut outer);
        let mut inner = Vec::new();
        codec::encode_header(&vault.header, &mut inner);
        if !bool::from(outer.ct_eq(&inner)) {
            return Err(VaultError::malformed(
                "sealed header does not match the file header",
            ));
        }

        cipher.mark_used(header.nonce);

        let Vault {
            header,
            entries,
            modification_counter,
        } = vault;

        tracing::debug!(
            entries = entries.len(),
            modification_counter,
            "opened vault"
        );
        Ok(Self::from_parts(header, entries, modification_counter, cipher))
    }

    fn from_parts(
        header: VaultHeader,
        entries: Vec<Entry>,
        modification_counter: u64,
        cipher: VaultCipher,
    ) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();
        Self {
            state: RwLock::new(State {
                header,
                entries: Arc::new(entries),
                index,
                modification_counter,
                cipher,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Validate and append a new entry, returning its fresh id.
    pub fn add_entry(&self, draft: EntryDraft) -> Result<EntryId> {
        let mut entry = Entry::from_draft(EntryId::generate(), draft, Utc::now());
        entry.validate()?;

        let mut guard = self.state.write();
        let state = &mut *guard;
        while state.index.contains_key(&entry.id) {
            entry.id = EntryId::generate();
        }

        let id = entry.id;
        let entries = Arc::make_mut(&mut state.entries);
        entries.push(entry);
        state.index.insert(id, entries.len() - 1);
        state.bump();

        tracing::debug!(%id, "entry added");
        Ok(id)
    }

    /// Replace an entry with its patched version.
    ///
    /// Validation happens on the patched copy; on any error the stored
    /// entry and the counter are unchanged.
    pub fn update_entry(&self, id: EntryId, mut patch: EntryPatch) -> Result<()> {
        let now = Utc::now();
        let mut guard = self.state.write();
        let state = &mut *guard;

        let pos = state.position(id)?;
        let next = patch.apply_to(&state.entries[pos], now);
        next.validate()?;

        Arc::make_mut(&mut state.entries)[pos] = next;
        state.bump();

        tracing::debug!(%id, "entry updated");
        Ok(())
    }

    /// Remove an entry.
    pub fn remove_entry(&self, id: EntryId) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let pos = state.position(id)?;
        let entries = Arc::make_mut(&mut state.entries);
        entries.remove(pos);
        state.index.remove(&id);
        for (i, entry) in entries.iter().enumerate().skip(pos) {
            state.index.insert(entry.id, i);
        }
        state.bump();

        tracing::debug!(%id, "entry removed");
        Ok(())
    }

    /// Re-key the vault under a new passphrase (and optional keyfile).
    ///
    /// A new salt is drawn and the *currently configured* KDF costs are
    /// used, so this is also how an old vault picks up stronger settings.
    /// The derivation runs before the write lock is taken.
    pub fn change_passphrase(
        &self,
        new_passphrase: &[u8],
        keyfile_bytes: Option<&[u8]>,
        config: &VaultConfig,
    ) -> Result<()> {
        let kdf = config.new_kdf_params();
        let effective = effective_passphrase(new_passphrase, keyfile_bytes)?;
        let master_key = derive(&effective, &kdf, &config.kdf_policy)?;
        let cipher = VaultCipher::new(master_key.derive_payload_key()?);

        let mut state = self.state.write();
        state.header.kdf = kdf;
        state.header.keyfile_required = keyfile_bytes.is_some();
        state.header.nonce = [0u8; NONCE_LEN];
        state.cipher = cipher;
        state.bump();

        tracing::debug!("vault passphrase changed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Clone of the entry with `id`, if present.
    pub fn lookup(&self, id: EntryId) -> Option<Entry> {
        let state = self.state.read();
        state.index.get(&id).map(|&pos| state.entries[pos].clone())
    }

    /// Clones of all entries in insertion order.
    pub fn list_entries(&self) -> Vec<Entry> {
        self.snapshot().as_ref().clone()
    }

    /// The current entry list, shared.  Later mutations do not affect it.
    pub fn snapshot(&self) -> Arc<Vec<Entry>> {
        Arc::clone(&self.state.read().entries)
    }

    /// Entries matching `predicate`, evaluated lazily over a snapshot
    /// taken now.
    pub fn search<P>(&self, predicate: P) -> SearchResults<P>
    where
        P: Fn(&Entry) -> bool,
    {
        SearchResults::new(self.snapshot(), predicate)
    }

    /// Resolve a full id or a unique hex prefix of one.
    pub fn resolve_id(&self, text: &str) -> Result<EntryId> {
        let needle = text.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(VaultError::InvalidEntry("entry id cannot be empty".into()));
        }

        let state = self.state.read();
        let mut matches = state
            .entries
            .iter()
            .map(|e| e.id)
            .filter(|id| id.to_string().starts_with(&needle));

        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id),
            (None, _) => Err(VaultError::NotFound(text.to_string())),
            (Some(_), Some(_)) => Err(VaultError::InvalidEntry(format!(
                "id prefix '{text}' matches more than one entry"
            ))),
        }
    }

    pub fn modification_counter(&self) -> u64 {
        self.state.read().modification_counter
    }

    pub fn header(&self) -> VaultHeader {
        self.state.read().header.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Encode and seal the vault under a freshly generated nonce.
    pub fn seal(&self) -> Result<Vec<u8>> {
        self.seal_with_nonce(generate_nonce())
    }

    /// Encode and seal under a caller-chosen nonce.
    ///
    /// Output is byte-for-byte reproducible for identical contents, key and
    /// nonce.  A nonce this store has already sealed with (or opened from)
    /// is refused with `NonceReuse` before anything is encoded.
    pub fn seal_with_nonce(&self, nonce: [u8; NONCE_LEN]) -> Result<Vec<u8>> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        if state.cipher.is_used(&nonce) {
            tracing::error!("refusing to seal with a previously used nonce");
            return Err(VaultError::NonceReuse);
        }

        let mut header = state.header.clone();
        header.nonce = nonce;

        let plaintext =
            codec::encode_parts(&header, &state.entries, state.modification_counter);
        let associated_data = header.prefix_bytes();
        let ciphertext = state.cipher.seal(&plaintext, &nonce, &associated_data)?;

        state.header = header;
        tracing::debug!(
            entries = state.entries.len(),
            modification_counter = state.modification_counter,
            "vault sealed"
        );
        Ok(format::assemble(&state.header, &ciphertext))
    }

    /// Drop the store, wiping the key and every entry it still owns.
    ///
    /// Snapshots handed out earlier keep their own copies alive until they
    /// are dropped.
    pub fn close(self) {
        tracing::debug!("vault closed");
    }
}
