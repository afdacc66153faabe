//! Integration tests for the plaintext vault codec.

use chrono::{TimeZone, Utc};
use credvault::crypto::KdfParams;
use credvault::errors::{ErrorKind, VaultError};
use credvault::vault::codec::{decode, encode, Vault};
use credvault::vault::{CustomField, Entry, EntryId, VaultHeader};
use proptest::prelude::*;

fn header() -> VaultHeader {
    let mut header = VaultHeader::new(KdfParams::with_costs(8_192, 1, 1), false);
    header.nonce = [3u8; 12];
    header
}

fn entry(n: u8, title: &str, secret: &str, tags: &[&str]) -> Entry {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    Entry {
        id: EntryId::from_bytes([n; 16]),
        title: title.to_string(),
        username: "alice".to_string(),
        secret: secret.to_string(),
        url: "https://example.com".to_string(),
        notes: String::new(),
        group: "Internet".to_string(),
        created_at: at,
        modified_at: at,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        expires_at: None,
        custom_fields: Vec::new(),
    }
}

#[test]
fn bank_vault_roundtrips() {
    let vault = Vault {
        header: header(),
        entries: vec![
            entry(1, "bank", "s", &["finance"]),
            entry(2, "mail ✉", "pässwörd", &[]),
        ],
        modification_counter: 2,
    };

    let bytes = encode(&vault);
    assert_eq!(decode(&bytes).unwrap(), vault);
}

#[test]
fn expiring_entry_with_fields_roundtrips() {
    let mut bank = entry(1, "bank", "s", &["finance"]);
    bank.expires_at = Some(Utc.with_ymd_and_hms(2027, 1, 31, 0, 0, 0).unwrap());
    bank.custom_fields = vec![
        CustomField::new("iban", "DE89 3704 0044 0532 0130 00"),
        CustomField::new("pin", "4711"),
    ];
    let vault = Vault {
        header: header(),
        entries: vec![bank],
        modification_counter: 1,
    };

    let decoded = decode(&encode(&vault)).unwrap();
    assert_eq!(decoded.entries[0].field("pin"), Some("4711"));
    assert_eq!(decoded, vault);
}

#[test]
fn empty_vault_roundtrips() {
    let vault = Vault {
        header: header(),
        entries: Vec::new(),
        modification_counter: 0,
    };
    assert_eq!(decode(&encode(&vault)).unwrap(), vault);
}

#[test]
fn encoding_is_deterministic() {
    let vault = Vault {
        header: header(),
        entries: vec![entry(1, "a", "b", &["x"])],
        modification_counter: 1,
    };
    assert_eq!(*encode(&vault), *encode(&vault.clone()));
}

#[test]
fn garbage_is_malformed_not_a_panic() {
    for input in [&b""[..], b"\x00", b"\x01", b"\xff\xff\xff\xff", &[1u8; 200]] {
        let err = decode(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedRecord, "input {input:?}");
    }
}

#[test]
fn truncated_payload_is_malformed() {
    let vault = Vault {
        header: header(),
        entries: vec![entry(1, "bank", "s", &["t"])],
        modification_counter: 1,
    };
    let bytes = encode(&vault);
    let cut = &bytes[..bytes.len() - 1];
    assert!(matches!(decode(cut), Err(VaultError::MalformedRecord(_))));
}

fn arb_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-zA-Z0-9 äß✉:/._-]{0,24}").unwrap()
}

fn arb_entry() -> impl Strategy<Value = Entry> {
    (
        any::<[u8; 16]>(),
        (arb_text(), arb_text(), arb_text(), arb_text(), arb_text()),
        (0i64..4_000_000_000, 0u32..1_000_000_000),
        proptest::collection::btree_set("[a-z]{1,8}", 0..4),
        (
            "[A-Za-z]{0,8}(/[A-Za-z]{1,8}){0,2}",
            proptest::option::of(0i64..4_000_000_000),
            proptest::collection::btree_map("[a-z]{1,8}", arb_text(), 0..4),
        ),
    )
        .prop_map(
            |(id, (title, username, secret, url, notes), (secs, nanos), tags, (group, expiry, fields))| {
                let at = Utc.timestamp_opt(secs, nanos).unwrap();
                Entry {
                    id: EntryId::from_bytes(id),
                    title,
                    username,
                    secret,
                    url,
                    notes,
                    group,
                    created_at: at,
                    modified_at: at,
                    tags: tags.into_iter().collect(),
                    expires_at: expiry.map(|secs| Utc.timestamp_opt(secs, 0).unwrap()),
                    custom_fields: fields
                        .into_iter()
                        .map(|(name, value)| CustomField::new(&name, &value))
                        .collect(),
                }
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn decode_inverts_encode(
        entries in proptest::collection::vec(arb_entry(), 0..6),
        counter in any::<u64>(),
    ) {
        // Ids must be unique within a vault.
        let mut seen = std::collections::HashSet::new();
        let entries: Vec<Entry> = entries.into_iter().filter(|e| seen.insert(e.id)).collect();

        let vault = Vault { header: header(), entries, modification_counter: counter };
        let bytes = encode(&vault);
        prop_assert_eq!(decode(&bytes).unwrap(), vault);
    }
}
