//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table};
use console::style;
use serde::Serialize;

use crate::errors::{Result, VaultError};
use crate::vault::{Entry, EntryId};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// First eight hex digits of an id, enough to address it in most vaults.
pub fn short_id(id: EntryId) -> String {
    let mut s = id.to_string();
    s.truncate(8);
    s
}

/// Print a table of entries (Id, Title, Username, Group, Tags, Expires,
/// Modified).  Secrets are never shown; expired entries are marked red.
pub fn print_entries_table(entries: &[Entry]) {
    if entries.is_empty() {
        info("No matching entries.");
        tip("Run `credvault add <TITLE>` to add an entry.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Id", "Title", "Username", "Group", "Tags", "Expires", "Modified",
    ]);

    let now = Utc::now();
    for e in entries {
        table.add_row(vec![
            short_id(e.id),
            e.title.clone(),
            e.username.clone(),
            e.group.clone(),
            e.tags.join(", "),
            expiry_cell(e, now),
            e.modified_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");
}

fn expiry_cell(entry: &Entry, now: DateTime<Utc>) -> String {
    match entry.expires_at {
        None => String::new(),
        Some(at) if entry.is_expired(now) => {
            style(format!("{} (expired)", at.format("%Y-%m-%d"))).red().to_string()
        }
        Some(at) => at.format("%Y-%m-%d").to_string(),
    }
}

/// Print every field of one entry, secret and custom values included.
pub fn print_entry(entry: &Entry) {
    let mut rows = vec![
        ("Id".to_string(), entry.id.to_string()),
        ("Title".into(), entry.title.clone()),
        ("Username".into(), entry.username.clone()),
        ("Secret".into(), entry.secret.clone()),
        ("URL".into(), entry.url.clone()),
        ("Notes".into(), entry.notes.clone()),
        ("Group".into(), entry.group.clone()),
        ("Tags".into(), entry.tags.join(", ")),
        ("Expires".into(), expiry_cell(entry, Utc::now())),
        ("Created".into(), entry.created_at.to_rfc3339()),
        ("Modified".into(), entry.modified_at.to_rfc3339()),
    ];
    rows.extend(
        entry
            .custom_fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone())),
    );
    for (label, value) in rows {
        println!("{:>9}  {}", style(label).bold(), value);
    }
}

/// Entry fields safe to print in listings.
#[derive(Serialize)]
pub struct EntrySummary<'a> {
    pub id: EntryId,
    pub title: &'a str,
    pub username: &'a str,
    pub url: &'a str,
    pub group: &'a str,
    pub tags: &'a [String],
    pub expires_at: Option<DateTime<Utc>>,
    /// Names only; field values can be as sensitive as the secret.
    pub fields: Vec<&'a str>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl<'a> From<&'a Entry> for EntrySummary<'a> {
    fn from(e: &'a Entry) -> Self {
        Self {
            id: e.id,
            title: &e.title,
            username: &e.username,
            url: &e.url,
            group: &e.group,
            tags: &e.tags,
            expires_at: e.expires_at,
            fields: e.custom_fields.iter().map(|f| f.name.as_str()).collect(),
            created_at: e.created_at,
            modified_at: e.modified_at,
        }
    }
}

/// Pretty JSON array of entry summaries (no secrets).
pub fn entries_json(entries: &[Entry]) -> Result<String> {
    let summaries: Vec<EntrySummary<'_>> = entries.iter().map(EntrySummary::from).collect();
    serde_json::to_string_pretty(&summaries)
        .map_err(|e| VaultError::Serialization(format!("JSON listing: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{EntryDraft, VaultStore};
    use crate::VaultConfig;

    fn entries() -> Vec<Entry> {
        let store = VaultStore::create(
            b"pw",
            None,
            &VaultConfig::default().with_kdf_costs(8_192, 1, 1),
        )
        .unwrap();
        store
            .add_entry(
                EntryDraft::new("Bank", "alice", "hunter2")
                    .with_tags(["finance"])
                    .with_group("Money")
                    .with_field("pin", "4711"),
            )
            .unwrap();
        store.list_entries()
    }

    #[test]
    fn json_listing_omits_secret() {
        let json = entries_json(&entries()).unwrap();
        assert!(json.contains("\"title\": \"Bank\""));
        assert!(json.contains("finance"));
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("secret"));
        assert!(json.contains("\"group\": \"Money\""));
        assert!(json.contains("\"pin\""));
        assert!(!json.contains("4711"));
    }

    #[test]
    fn expiry_cell_marks_past_dates() {
        let mut entry = entries().remove(0);
        let now = Utc::now();
        assert_eq!(expiry_cell(&entry, now), "");
        entry.expires_at = Some(now - chrono::Duration::days(1));
        assert!(expiry_cell(&entry, now).contains("(expired)"));
        entry.expires_at = Some(now + chrono::Duration::days(1));
        assert!(!expiry_cell(&entry, now).contains("expired"));
    }

    #[test]
    fn short_id_is_eight_hex_digits() {
        let id = entries()[0].id;
        let short = short_id(id);
        assert_eq!(short.len(), 8);
        assert!(id.to_string().starts_with(&short));
    }
}
