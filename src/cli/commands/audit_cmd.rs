//! `credvault audit`: show the recorded history of the selected vault.
//!
//! Usage:
//!   credvault audit                       # last 50 events of this vault
//!   credvault audit --entry 0a1b2c3d      # history of one entry
//!   credvault audit --op unlock-failed    # failed unlocks only
//!   credvault audit --since 7d            # events of the last week
//!   credvault audit --all-vaults          # every vault in the directory
//!
//! Reading the log does not unlock the vault, so the entry filter matches
//! id prefixes rather than resolving them against the entries.

use chrono::{DateTime, Utc};
use console::style;

use crate::audit::{audit_dir, vault_name, AuditEntry, AuditFilter, AuditLog};
use crate::cli::output;
use crate::cli::{parse_span, vault_path, Cli};
use crate::errors::{Result, VaultError};

/// Options of the `audit` command.
pub struct AuditArgs<'a> {
    pub last: usize,
    pub since: Option<&'a str>,
    pub entry: Option<&'a str>,
    pub operation: Option<&'a str>,
    pub all_vaults: bool,
}

/// Execute the `audit` command.
pub fn execute(cli: &Cli, args: &AuditArgs<'_>) -> Result<()> {
    let path = vault_path(cli)?;
    let audit = AuditLog::open(&audit_dir(&path))
        .ok_or_else(|| VaultError::Audit("failed to open audit database".into()))?;

    let filter = build_filter(args, &vault_name(&path))?;
    let entries = audit.query(&filter)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries, args.all_vaults);
    let failures = entries
        .iter()
        .filter(|e| e.operation == "unlock-failed")
        .count();
    if failures > 0 {
        output::warning(&format!("{failures} failed unlock attempt(s) in this listing."));
    }
    Ok(())
}

fn build_filter(args: &AuditArgs<'_>, vault: &str) -> Result<AuditFilter> {
    let entry_prefix = match args.entry {
        Some(prefix) => Some(entry_prefix(prefix)?),
        None => None,
    };
    Ok(AuditFilter {
        limit: args.last,
        since: args.since.map(parse_since).transpose()?,
        vault: (!args.all_vaults).then(|| vault.to_string()),
        entry_prefix,
        operation: args.operation.map(str::to_string),
    })
}

/// Entry ids are recorded as 32 lowercase hex digits.
fn entry_prefix(input: &str) -> Result<String> {
    let prefix = input.trim().to_ascii_lowercase();
    if prefix.is_empty() || prefix.len() > 32 || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(VaultError::CommandFailed(format!(
            "'{input}' is not an entry id or id prefix"
        )));
    }
    Ok(prefix)
}

/// Parse `--since`: a span back from now ("90m", "24h", "7d", "2w") or an
/// RFC 3339 timestamp.
fn parse_since(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }

    let invalid = || {
        VaultError::CommandFailed(format!(
            "invalid --since '{input}': use 30m, 24h, 7d, 2w or an RFC 3339 time"
        ))
    };

    let span = parse_span(input).ok_or_else(invalid)?;
    Utc::now().checked_sub_signed(span).ok_or_else(invalid)
}

/// Print audit rows; the vault column only when several vaults are shown.
fn print_audit_table(entries: &[AuditEntry], with_vault: bool) {
    use comfy_table::{ContentArrangement, Table};

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let mut header = vec!["Time", "Operation", "Entry", "Details"];
    if with_vault {
        header.insert(1, "Vault");
    }
    table.set_header(header);

    for entry in entries {
        let mut row = vec![
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            colorize_operation(&entry.operation),
            entry
                .entry_id
                .as_deref()
                .map_or("-", |id| id.get(..8).unwrap_or(id))
                .to_string(),
            entry.details.clone().unwrap_or_else(|| "-".into()),
        ];
        if with_vault {
            row.insert(1, entry.vault.clone());
        }
        table.add_row(row);
    }

    println!("{}", style(format!("{} audit entries:", entries.len())).bold());
    println!("{table}");
}

fn colorize_operation(op: &str) -> String {
    match op {
        "init" => style(op).green().to_string(),
        "add" | "edit" => style(op).blue().to_string(),
        "remove" => style(op).red().to_string(),
        "unlock-failed" | "unlock-refused" => style(op).red().bold().to_string(),
        "rotate-key" => style(op).yellow().to_string(),
        "export" => style(op).cyan().to_string(),
        _ => op.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> AuditArgs<'static> {
        AuditArgs {
            last: 50,
            since: None,
            entry: None,
            operation: None,
            all_vaults: false,
        }
    }

    #[test]
    fn filter_is_scoped_to_the_vault_unless_asked() {
        let filter = build_filter(&args(), "work.vault").unwrap();
        assert_eq!(filter.vault.as_deref(), Some("work.vault"));

        let all = AuditArgs {
            all_vaults: true,
            ..args()
        };
        assert!(build_filter(&all, "work.vault").unwrap().vault.is_none());
    }

    #[test]
    fn entry_filter_takes_hex_prefixes_only() {
        let by_entry = AuditArgs {
            entry: Some("0A1B"),
            ..args()
        };
        let filter = build_filter(&by_entry, "work.vault").unwrap();
        assert_eq!(filter.entry_prefix.as_deref(), Some("0a1b"));

        let too_long = "a".repeat(33);
        for bad in ["", "xyz", "0a1b%", too_long.as_str()] {
            assert!(entry_prefix(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn since_accepts_spans() {
        let cases = [("2w", 14 * 24 * 60), ("7d", 7 * 24 * 60), ("24h", 24 * 60), ("30m", 30)];
        for (input, minutes) in cases {
            let diff = Utc::now() - parse_since(input).unwrap();
            assert!((diff.num_minutes() - minutes).abs() <= 1, "{input}");
        }
    }

    #[test]
    fn since_accepts_timestamps() {
        let at = parse_since("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(at.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn since_rejects_garbage() {
        for bad in ["abc", "7x", "d", "-3d", ""] {
            assert!(parse_since(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn filter_runs_against_a_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        audit.log("add", "work.vault", Some("0a1b2c3d"), Some("Bank"));
        audit.log("unlock-failed", "work.vault", None, None);
        audit.log("add", "home.vault", Some("0a1b2c3d"), None);

        let failed = AuditArgs {
            operation: Some("unlock-failed"),
            since: Some("1h"),
            ..args()
        };
        let filter = build_filter(&failed, "work.vault").unwrap();
        assert_eq!(audit.query(&filter).unwrap().len(), 1);
    }
}
