//! Credential entries and the inputs used to create and edit them.
//!
//! Text fields of every type here are wiped when the value is dropped.
//! `Debug` output never shows the secret or custom field values.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use serde::{Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{Result, VaultError};

/// Maximum length in bytes of any single text field.
pub const MAX_FIELD_LEN: usize = 64 * 1024;

/// Maximum number of tags on one entry.
pub const MAX_TAGS: usize = 4096;

/// Maximum number of custom fields on one entry.
pub const MAX_CUSTOM_FIELDS: usize = 256;

// ---------------------------------------------------------------------------
// EntryId
// ---------------------------------------------------------------------------

/// Random 128-bit identifier, stable across edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u128);

impl EntryId {
    /// Draw a fresh random id from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }

    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(VaultError::InvalidEntry(format!(
                "'{s}' is not a valid entry id (expected 32 hex digits)"
            )));
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| VaultError::InvalidEntry(format!("invalid entry id: {e}")))
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A single credential record stored in the vault.
#[derive(Clone, PartialEq, Eq, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct Entry {
    #[zeroize(skip)]
    pub id: EntryId,
    pub title: String,
    pub username: String,
    pub secret: String,
    pub url: String,
    pub notes: String,
    /// Slash-separated folder path, empty for the top level.
    pub group: String,
    #[zeroize(skip)]
    pub created_at: DateTime<Utc>,
    #[zeroize(skip)]
    pub modified_at: DateTime<Utc>,
    /// Sorted and deduplicated.
    pub tags: Vec<String>,
    /// When the credential stops being valid, if ever.
    #[zeroize(skip)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Extra named values, sorted by name with unique names.
    pub custom_fields: Vec<CustomField>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("url", &self.url)
            .field("group", &self.group)
            .field("created_at", &self.created_at)
            .field("modified_at", &self.modified_at)
            .field("tags", &self.tags)
            .field("expires_at", &self.expires_at)
            .field("custom_fields", &self.custom_fields)
            .finish_non_exhaustive()
    }
}

impl Entry {
    /// Build a new entry from a draft, stamping both timestamps with `now`.
    pub(crate) fn from_draft(id: EntryId, mut draft: EntryDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: std::mem::take(&mut draft.title),
            username: std::mem::take(&mut draft.username),
            secret: std::mem::take(&mut draft.secret),
            url: std::mem::take(&mut draft.url),
            notes: std::mem::take(&mut draft.notes),
            group: normalize_group(&draft.group),
            created_at: now,
            modified_at: now,
            tags: normalize_tags(std::mem::take(&mut draft.tags)),
            expires_at: draft.expires_at,
            custom_fields: normalize_fields(std::mem::take(&mut draft.custom_fields)),
        }
    }

    /// Returns `true` if the entry carries `tag` (case-insensitive).
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Returns `true` if the entry sits in `group` or one of its subgroups.
    pub fn in_group(&self, group: &str) -> bool {
        let group = normalize_group(group);
        group.is_empty()
            || self.group == group
            || self
                .group
                .strip_prefix(group.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Returns `true` once the expiry time has been reached.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Value of the custom field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.custom_fields
            .binary_search_by(|f| f.name.as_str().cmp(name))
            .ok()
            .map(|i| self.custom_fields[i].value.as_str())
    }

    /// Check field limits and formats.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(VaultError::InvalidEntry("title cannot be empty".into()));
        }

        for (name, value) in [
            ("title", &self.title),
            ("username", &self.username),
            ("secret", &self.secret),
            ("url", &self.url),
            ("notes", &self.notes),
            ("group", &self.group),
        ] {
            if value.len() > MAX_FIELD_LEN {
                return Err(VaultError::InvalidEntry(format!(
                    "{name} cannot exceed {MAX_FIELD_LEN} bytes"
                )));
            }
        }

        if !self.url.is_empty() && !url_is_valid(&self.url) {
            return Err(VaultError::InvalidEntry(format!(
                "url '{}' must start with http:// or https:// and contain no spaces",
                self.url
            )));
        }

        if self.tags.len() > MAX_TAGS {
            return Err(VaultError::InvalidEntry(format!(
                "an entry cannot carry more than {MAX_TAGS} tags"
            )));
        }
        if let Some(tag) = self.tags.iter().find(|t| t.len() > MAX_FIELD_LEN) {
            return Err(VaultError::InvalidEntry(format!(
                "tag starting with '{}' is too long",
                tag.chars().take(16).collect::<String>()
            )));
        }

        if self.custom_fields.len() > MAX_CUSTOM_FIELDS {
            return Err(VaultError::InvalidEntry(format!(
                "an entry cannot carry more than {MAX_CUSTOM_FIELDS} custom fields"
            )));
        }
        for field in &self.custom_fields {
            if field.name.trim().is_empty() {
                return Err(VaultError::InvalidEntry(
                    "custom field names cannot be empty".into(),
                ));
            }
            if field.name.len() > MAX_FIELD_LEN || field.value.len() > MAX_FIELD_LEN {
                return Err(VaultError::InvalidEntry(format!(
                    "custom field '{}' cannot exceed {MAX_FIELD_LEN} bytes",
                    field.name.chars().take(16).collect::<String>()
                )));
            }
        }
        if self
            .custom_fields
            .windows(2)
            .any(|pair| pair[0].name >= pair[1].name)
        {
            return Err(VaultError::InvalidEntry(
                "custom field names must be unique".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CustomField
// ---------------------------------------------------------------------------

/// A named extra value on an entry, such as a PIN or a recovery code.
#[derive(Clone, PartialEq, Eq, Serialize, Zeroize)]
pub struct CustomField {
    pub name: String,
    pub value: String,
}

impl CustomField {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

impl fmt::Debug for CustomField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomField")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

impl FromStr for CustomField {
    type Err = VaultError;

    /// Parse `name=value`.  The value may itself contain `=`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => Ok(Self::new(name.trim(), value)),
            _ => Err(VaultError::InvalidEntry(format!(
                "custom field '{}' must look like name=value",
                s.split('=').next().unwrap_or_default()
            ))),
        }
    }
}

/// Trim names, drop unnamed fields, sort by name.  A later field replaces
/// an earlier one with the same name.
pub fn normalize_fields(fields: Vec<CustomField>) -> Vec<CustomField> {
    let mut by_name = BTreeMap::new();
    for mut field in fields {
        let name = field.name.trim().to_string();
        if !name.is_empty() {
            by_name.insert(name, std::mem::take(&mut field.value));
        }
    }
    by_name
        .into_iter()
        .map(|(name, value)| CustomField { name, value })
        .collect()
}

/// Trim every path segment and drop empty ones: `" /Web//Mail/ "` becomes
/// `"Web/Mail"`.
pub fn normalize_group(group: &str) -> String {
    group
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn url_is_valid(url: &str) -> bool {
    static URL: OnceLock<Option<Regex>> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r"(?i)^(http|https)://\S*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(url))
}

/// Trim, drop empties, sort and deduplicate.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

// ---------------------------------------------------------------------------
// EntryDraft / EntryPatch
// ---------------------------------------------------------------------------

/// The caller-supplied fields of a new entry.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct EntryDraft {
    pub title: String,
    pub username: String,
    pub secret: String,
    pub url: String,
    pub notes: String,
    pub group: String,
    pub tags: Vec<String>,
    #[zeroize(skip)]
    pub expires_at: Option<DateTime<Utc>>,
    pub custom_fields: Vec<CustomField>,
}

impl EntryDraft {
    /// Draft with a title, username and secret; the rest left empty.
    pub fn new(title: &str, username: &str, secret: &str) -> Self {
        Self {
            title: title.to_string(),
            username: username.to_string(),
            secret: secret.to_string(),
            url: String::new(),
            notes: String::new(),
            group: String::new(),
            tags: Vec::new(),
            expires_at: None,
            custom_fields: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = notes.to_string();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = group.to_string();
        self
    }

    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.custom_fields.push(CustomField::new(name, value));
        self
    }
}

/// Replacement values for an existing entry; `None` keeps the field.
///
/// Custom fields are edited one by one: names in `remove_fields` are
/// dropped first, then `set_fields` are added or overwritten.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub group: Option<String>,
    pub tags: Option<Vec<String>>,
    /// `Some(None)` clears the expiry.
    #[zeroize(skip)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub set_fields: Vec<CustomField>,
    pub remove_fields: Vec<String>,
}

impl EntryPatch {
    /// Returns `true` if the patch would leave every field unchanged.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.username.is_none()
            && self.secret.is_none()
            && self.url.is_none()
            && self.notes.is_none()
            && self.group.is_none()
            && self.tags.is_none()
            && self.expires_at.is_none()
            && self.set_fields.is_empty()
            && self.remove_fields.is_empty()
    }

    /// Produce the patched copy of `entry` with `modified_at` set to `now`.
    ///
    /// `entry` itself is left untouched so a failed validation never leaves
    /// a half-applied edit behind.
    pub(crate) fn apply_to(&mut self, entry: &Entry, now: DateTime<Utc>) -> Entry {
        let mut next = entry.clone();
        if let Some(v) = self.title.take() {
            next.title = v;
        }
        if let Some(v) = self.username.take() {
            next.username = v;
        }
        if let Some(v) = self.secret.take() {
            next.secret = v;
        }
        if let Some(v) = self.url.take() {
            next.url = v;
        }
        if let Some(v) = self.notes.take() {
            next.notes = v;
        }
        if let Some(v) = self.group.take() {
            next.group = normalize_group(&v);
        }
        if let Some(v) = self.tags.take() {
            next.tags = normalize_tags(v);
        }
        if let Some(v) = self.expires_at.take() {
            next.expires_at = v;
        }
        if !self.remove_fields.is_empty() || !self.set_fields.is_empty() {
            let mut fields = std::mem::take(&mut next.custom_fields);
            fields.retain(|f| !self.remove_fields.iter().any(|name| name.trim() == f.name));
            fields.append(&mut self.set_fields);
            next.custom_fields = normalize_fields(fields);
        }
        next.modified_at = now;
        next
    }
}
