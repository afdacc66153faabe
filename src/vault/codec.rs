//! Canonical binary layout of a decrypted vault.
//!
//! ```text
//! [codec_version: u8][header][modification_counter: u64][entry_count: u32][entry]*
//!
//! header = [format_version: u8][memory_kib: u32][iterations: u32][parallelism: u32]
//!          [salt_len: u32][salt][nonce: 12][keyfile_required: u8][created_at]
//! entry  = [id: 16][title][username][secret][url][notes][group]
//!          [created_at][modified_at][tag_count: u32][tag]*
//!          [has_expiry: u8][expires_at]?[field_count: u32]([name][value])*
//! text   = [len: u32][utf-8 bytes]
//! time   = [unix_seconds: i64][subsec_nanos: u32]
//! ```
//!
//! All integers are little-endian.  The codec version is read first and
//! picks the decode path.  Version 1 entries end after the tag list and have
//! no group; they still decode, and are written back as version 2.  Every length prefix is bounds-checked against
//! both the remaining input and a per-field maximum before anything is
//! allocated, and decoding either yields a whole `Vault` or fails.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use super::entry::{CustomField, Entry, EntryId, MAX_CUSTOM_FIELDS, MAX_FIELD_LEN, MAX_TAGS};
use super::format::{VaultHeader, FORMAT_VERSION};
use crate::crypto::{KdfParams, NONCE_LEN, SALT_LEN};
use crate::errors::{Result, VaultError};

/// Current payload codec version.
pub const CODEC_VERSION: u8 = 2;

/// Maximum number of entries accepted in one vault.
pub const MAX_ENTRIES: usize = 1_000_000;

/// Smallest possible encoded entry: id, empty texts, two timestamps and an
/// empty tag list.  Version 2 adds the group, the expiry flag and an empty
/// field list.
const fn min_entry_len(version: u8) -> usize {
    let base = 16 + 5 * 4 + 2 * 12 + 4;
    if version >= 2 {
        base + 4 + 1 + 4
    } else {
        base
    }
}

/// A decrypted vault: header, entries in insertion order, and the
/// modification counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    pub header: VaultHeader,
    pub entries: Vec<Entry>,
    pub modification_counter: u64,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialize a vault into its canonical byte layout.
///
/// The returned buffer holds entry secrets and is wiped on drop.
pub fn encode(vault: &Vault) -> Zeroizing<Vec<u8>> {
    encode_parts(&vault.header, &vault.entries, vault.modification_counter)
}

/// Same layout as [`encode`], from borrowed parts.
pub fn encode_parts(
    header: &VaultHeader,
    entries: &[Entry],
    modification_counter: u64,
) -> Zeroizing<Vec<u8>> {
    let mut buf = Zeroizing::new(Vec::with_capacity(256 + entries.len() * 128));

    buf.push(CODEC_VERSION);
    encode_header(header, &mut buf);
    buf.extend_from_slice(&modification_counter.to_le_bytes());
    put_len(&mut buf, entries.len());

    for entry in entries {
        encode_entry(entry, &mut buf);
    }

    buf
}

/// Append the header block.  Also used verbatim as the file prefix.
pub fn encode_header(header: &VaultHeader, buf: &mut Vec<u8>) {
    buf.push(header.format_version);
    buf.extend_from_slice(&header.kdf.memory_kib.to_le_bytes());
    buf.extend_from_slice(&header.kdf.iterations.to_le_bytes());
    buf.extend_from_slice(&header.kdf.parallelism.to_le_bytes());
    put_len(buf, header.kdf.salt.len());
    buf.extend_from_slice(&header.kdf.salt);
    buf.extend_from_slice(&header.nonce);
    buf.push(u8::from(header.keyfile_required));
    put_time(buf, &header.created_at);
}

fn encode_entry(entry: &Entry, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&entry.id.to_bytes());
    put_text(buf, &entry.title);
    put_text(buf, &entry.username);
    put_text(buf, &entry.secret);
    put_text(buf, &entry.url);
    put_text(buf, &entry.notes);
    put_text(buf, &entry.group);
    put_time(buf, &entry.created_at);
    put_time(buf, &entry.modified_at);
    put_len(buf, entry.tags.len());
    for tag in &entry.tags {
        put_text(buf, tag);
    }
    match &entry.expires_at {
        Some(at) => {
            buf.push(1);
            put_time(buf, at);
        }
        None => buf.push(0),
    }
    put_len(buf, entry.custom_fields.len());
    for field in &entry.custom_fields {
        put_text(buf, &field.name);
        put_text(buf, &field.value);
    }
}

/// Lengths are bounded by `MAX_FIELD_LEN` / `MAX_ENTRIES` at validation
/// time, far below `u32::MAX`.
fn put_len(buf: &mut Vec<u8>, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    buf.extend_from_slice(&len.to_le_bytes());
}

fn put_text(buf: &mut Vec<u8>, text: &str) {
    put_len(buf, text.len());
    buf.extend_from_slice(text.as_bytes());
}

fn put_time(buf: &mut Vec<u8>, time: &DateTime<Utc>) {
    buf.extend_from_slice(&time.timestamp().to_le_bytes());
    buf.extend_from_slice(&time.timestamp_subsec_nanos().to_le_bytes());
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Parse the canonical byte layout back into a `Vault`.
pub fn decode(bytes: &[u8]) -> Result<Vault> {
    let mut reader = Reader::new(bytes);
    match reader.u8("codec version")? {
        version @ (1 | CODEC_VERSION) => decode_payload(&mut reader, version),
        other => Err(VaultError::malformed(format!(
            "unknown codec version {other}, expected {CODEC_VERSION}"
        ))),
    }
}

fn decode_payload(reader: &mut Reader<'_>, version: u8) -> Result<Vault> {
    let header = decode_header(reader)?;
    let modification_counter = reader.u64("modification counter")?;

    let count = reader.len("entry count", MAX_ENTRIES)?;
    if count.saturating_mul(min_entry_len(version)) > reader.remaining() {
        return Err(VaultError::malformed(format!(
            "entry count {count} exceeds the remaining input"
        )));
    }

    let mut entries = Vec::with_capacity(count);
    let mut seen = HashSet::with_capacity(count);
    for index in 0..count {
        let entry = decode_entry(reader, version)?;
        if !seen.insert(entry.id) {
            return Err(VaultError::malformed(format!(
                "duplicate entry id at position {index}"
            )));
        }
        entries.push(entry);
    }

    reader.finish()?;

    Ok(Vault {
        header,
        entries,
        modification_counter,
    })
}

/// Read a header block from the front of `reader`.
pub(crate) fn decode_header(reader: &mut Reader<'_>) -> Result<VaultHeader> {
    let format_version = reader.u8("format version")?;
    if format_version != FORMAT_VERSION {
        return Err(VaultError::malformed(format!(
            "unsupported format version {format_version}, expected {FORMAT_VERSION}"
        )));
    }

    let memory_kib = reader.u32("memory cost")?;
    let iterations = reader.u32("iteration count")?;
    let parallelism = reader.u32("parallelism")?;

    let salt_len = reader.len("salt length", SALT_LEN)?;
    if salt_len != SALT_LEN {
        return Err(VaultError::malformed(format!(
            "salt must be {SALT_LEN} bytes, got {salt_len}"
        )));
    }
    let salt = reader.array::<SALT_LEN>("salt")?;
    let nonce = reader.array::<NONCE_LEN>("nonce")?;
    let keyfile_required = reader.bool("keyfile flag")?;
    let created_at = reader.time("vault creation time")?;

    Ok(VaultHeader {
        format_version,
        kdf: KdfParams {
            memory_kib,
            iterations,
            parallelism,
            salt,
        },
        nonce,
        keyfile_required,
        created_at,
    })
}

fn decode_entry(reader: &mut Reader<'_>, version: u8) -> Result<Entry> {
    let id = EntryId::from_bytes(reader.array::<16>("entry id")?);
    let title = reader.text("title")?;
    let username = reader.text("username")?;
    let secret = reader.text("secret")?;
    let url = reader.text("url")?;
    let notes = reader.text("notes")?;
    let group = if version >= 2 {
        reader.text("group")?
    } else {
        String::new()
    };
    let created_at = reader.time("entry creation time")?;
    let modified_at = reader.time("entry modification time")?;

    let tag_count = reader.len("tag count", MAX_TAGS)?;
    let mut tags = Vec::with_capacity(tag_count.min(reader.remaining() / 4));
    for _ in 0..tag_count {
        tags.push(reader.text("tag")?);
    }

    let (expires_at, custom_fields) = if version >= 2 {
        let expires_at = if reader.bool("expiry flag")? {
            Some(reader.time("entry expiry time")?)
        } else {
            None
        };
        (expires_at, decode_fields(reader)?)
    } else {
        (None, Vec::new())
    };

    Ok(Entry {
        id,
        title,
        username,
        secret,
        url,
        notes,
        group,
        created_at,
        modified_at,
        tags,
        expires_at,
        custom_fields,
    })
}

/// Field names must be strictly ascending, which also rules out duplicates.
fn decode_fields(reader: &mut Reader<'_>) -> Result<Vec<CustomField>> {
    let count = reader.len("field count", MAX_CUSTOM_FIELDS)?;
    let mut fields: Vec<CustomField> = Vec::with_capacity(count.min(reader.remaining() / 8));
    for _ in 0..count {
        let name = reader.text("field name")?;
        let value = reader.text("field value")?;
        if fields.last().is_some_and(|prev| prev.name >= name) {
            return Err(VaultError::malformed(format!(
                "custom field '{}' is out of order or repeated",
                name.chars().take(16).collect::<String>()
            )));
        }
        fields.push(CustomField { name, value });
    }
    Ok(fields)
}

/// Bounds-checked cursor over untrusted input.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(VaultError::malformed(format!(
                "truncated input while reading {what}"
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array(what)?))
    }

    fn i64(&mut self, what: &str) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array(what)?))
    }

    fn bool(&mut self, what: &str) -> Result<bool> {
        match self.u8(what)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(VaultError::malformed(format!(
                "invalid {what} byte {other:#04x}"
            ))),
        }
    }

    /// A `u32` length prefix that must not exceed `max`.
    fn len(&mut self, what: &str, max: usize) -> Result<usize> {
        let raw = self.u32(what)?;
        let len = usize::try_from(raw)
            .map_err(|_| VaultError::malformed(format!("{what} {raw} is out of range")))?;
        if len > max {
            return Err(VaultError::malformed(format!(
                "{what} {len} exceeds the maximum of {max}"
            )));
        }
        Ok(len)
    }

    fn text(&mut self, what: &str) -> Result<String> {
        let len = self.len(what, MAX_FIELD_LEN)?;
        let bytes = self.take(len, what)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| VaultError::malformed(format!("{what} is not valid UTF-8")))
    }

    fn time(&mut self, what: &str) -> Result<DateTime<Utc>> {
        let secs = self.i64(what)?;
        let nanos = self.u32(what)?;
        DateTime::from_timestamp(secs, nanos)
            .ok_or_else(|| VaultError::malformed(format!("{what} is out of range")))
    }

    fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(VaultError::malformed(format!(
                "{} trailing bytes after the last entry",
                self.remaining()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::entry::EntryDraft;

    fn header() -> VaultHeader {
        VaultHeader {
            format_version: FORMAT_VERSION,
            kdf: KdfParams {
                memory_kib: 8_192,
                iterations: 1,
                parallelism: 1,
                salt: [5; SALT_LEN],
            },
            nonce: [6; NONCE_LEN],
            keyfile_required: false,
            created_at: Utc::now(),
        }
    }

    fn vault_with(n: usize) -> Vault {
        let entries = (0..n)
            .map(|i| {
                Entry::from_draft(
                    EntryId::generate(),
                    EntryDraft::new(&format!("site-{i}"), "user", "pw")
                        .with_tags(["web", "personal"])
                        .with_group("Internet/Web")
                        .with_field("pin", &i.to_string()),
                    Utc::now(),
                )
            })
            .collect();
        Vault {
            header: header(),
            entries,
            modification_counter: n as u64,
        }
    }

    #[test]
    fn empty_vault_roundtrip() {
        let vault = vault_with(0);
        assert_eq!(decode(&encode(&vault)).unwrap(), vault);
    }

    #[test]
    fn roundtrip_preserves_order_and_nanoseconds() {
        let vault = vault_with(5);
        let decoded = decode(&encode(&vault)).unwrap();
        assert_eq!(decoded, vault);
        let titles: Vec<_> = decoded.entries.iter().map(|e| e.title.clone()).collect();
        assert_eq!(titles, ["site-0", "site-1", "site-2", "site-3", "site-4"]);
    }

    #[test]
    fn unknown_codec_version_is_rejected() {
        let mut bytes = encode(&vault_with(1));
        bytes[0] = 9;
        assert!(matches!(decode(&bytes), Err(VaultError::MalformedRecord(_))));
    }

    #[test]
    fn every_truncation_is_rejected() {
        let bytes = encode(&vault_with(2));
        for cut in 0..bytes.len() {
            assert!(
                matches!(decode(&bytes[..cut]), Err(VaultError::MalformedRecord(_))),
                "prefix of length {cut} decoded"
            );
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode(&vault_with(1)).to_vec();
        bytes.push(0);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn oversized_text_prefix_is_rejected() {
        let vault = vault_with(1);
        let mut bytes = encode(&vault).to_vec();
        // The title length prefix follows codec version, header, counter,
        // entry count and the 16-byte id.
        let mut header_len = Vec::new();
        encode_header(&vault.header, &mut header_len);
        let title_at = 1 + header_len.len() + 8 + 4 + 16;
        bytes[title_at..title_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum"));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let vault = vault_with(1);
        let mut bytes = encode(&vault).to_vec();
        let mut header_len = Vec::new();
        encode_header(&vault.header, &mut header_len);
        // First byte of the title text ("site-0").
        let title_byte = 1 + header_len.len() + 8 + 4 + 16 + 4;
        bytes[title_byte] = 0xFF;
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut vault = vault_with(2);
        let first = vault.entries[0].id;
        vault.entries[1].id = first;
        let err = decode(&encode(&vault)).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn inflated_entry_count_is_rejected_before_allocation() {
        let vault = vault_with(0);
        let mut bytes = encode(&vault).to_vec();
        let count_at = bytes.len() - 4;
        bytes[count_at..].copy_from_slice(&500_000u32.to_le_bytes());
        assert!(decode(&bytes).is_err());
    }

    /// The version 1 layout, kept here to check that old payloads still open.
    fn encode_v1(vault: &Vault) -> Vec<u8> {
        let mut buf = vec![1];
        encode_header(&vault.header, &mut buf);
        buf.extend_from_slice(&vault.modification_counter.to_le_bytes());
        put_len(&mut buf, vault.entries.len());
        for entry in &vault.entries {
            buf.extend_from_slice(&entry.id.to_bytes());
            for text in [&entry.title, &entry.username, &entry.secret, &entry.url, &entry.notes] {
                put_text(&mut buf, text);
            }
            put_time(&mut buf, &entry.created_at);
            put_time(&mut buf, &entry.modified_at);
            put_len(&mut buf, entry.tags.len());
            for tag in &entry.tags {
                put_text(&mut buf, tag);
            }
        }
        buf
    }

    #[test]
    fn version_one_payloads_still_decode() {
        let mut vault = vault_with(3);
        for entry in &mut vault.entries {
            entry.group.clear();
            entry.custom_fields.clear();
        }
        let decoded = decode(&encode_v1(&vault)).unwrap();
        assert_eq!(decoded, vault);
        assert_eq!(encode(&decoded)[0], CODEC_VERSION);
    }

    #[test]
    fn expiry_and_fields_roundtrip() {
        let mut vault = vault_with(1);
        vault.entries[0].expires_at = DateTime::from_timestamp(1_900_000_000, 42);
        vault.entries[0].custom_fields = vec![
            CustomField::new("account", "DE00 1234"),
            CustomField::new("pin", ""),
        ];
        let decoded = decode(&encode(&vault)).unwrap();
        assert_eq!(decoded, vault);
        assert_eq!(decoded.entries[0].field("account"), Some("DE00 1234"));
    }

    #[test]
    fn unordered_or_repeated_field_names_are_rejected() {
        for names in [["pin", "account"], ["pin", "pin"]] {
            let mut vault = vault_with(1);
            vault.entries[0].custom_fields =
                names.iter().map(|n| CustomField::new(n, "x")).collect();
            let err = decode(&encode(&vault)).unwrap_err();
            assert!(err.to_string().contains("out of order"), "{names:?}");
        }
    }

    #[test]
    fn invalid_expiry_flag_is_rejected() {
        let vault = vault_with(1);
        let mut bytes = encode(&vault).to_vec();
        // Flag byte sits right before the field count and the single
        // "pin" field (4 + 3 + 4 + 1 bytes).
        let flag_at = bytes.len() - (4 + 4 + 3 + 4 + 1) - 1;
        assert_eq!(bytes[flag_at], 0);
        bytes[flag_at] = 2;
        assert!(decode(&bytes).unwrap_err().to_string().contains("expiry flag"));
    }
}
