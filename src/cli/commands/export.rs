//! `credvault export`: write every entry, secrets included, as JSON.
//!
//! The output is plaintext.  It goes to stdout unless `--output` is given,
//! in which case the file is created with owner-only permissions.

use std::fs;
use std::io::Write;
use std::path::Path;

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{log_audit, open_session, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::Entry;

/// Execute the `export` command.
pub fn execute(cli: &Cli, output_path: Option<&Path>) -> Result<()> {
    let (mut session, path) = open_session(cli)?;

    if let Some(dest) = output_path {
        // Safety: refuse to overwrite the vault itself.
        if dest == path.as_path() {
            return Err(VaultError::CommandFailed(
                "refusing to export over the vault file".into(),
            ));
        }
    }

    let entries = session.list_entries()?;
    session.close_vault();
    let content = format_as_json(&entries)?;

    log_audit(
        &path,
        "export",
        None,
        Some(&format!("{} entries", entries.len())),
    );

    match output_path {
        Some(dest) => {
            write_private(dest, content.as_bytes()).map_err(|e| {
                VaultError::CommandFailed(format!("failed to write export file: {e}"))
            })?;
            output::success(&format!(
                "Exported {} entries to {}",
                entries.len(),
                dest.display()
            ));
            output::warning("The export is not encrypted. Delete it when you are done.");
        }
        None => {
            // Write to stdout (no success message, just raw output).
            println!("{}", content.as_str());
        }
    }

    Ok(())
}

/// Format entries as a pretty JSON array.
fn format_as_json(entries: &[Entry]) -> Result<Zeroizing<String>> {
    serde_json::to_string_pretty(entries)
        .map(Zeroizing::new)
        .map_err(|e| VaultError::Serialization(format!("JSON export: {e}")))
}

/// Create (or truncate) `dest` as an owner-only file before any plaintext
/// reaches it.
fn write_private(dest: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(dest)?;
    // `mode` only applies to new files.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{EntryDraft, VaultStore};
    use crate::VaultConfig;

    #[test]
    fn json_export_includes_secrets() {
        let store = VaultStore::create(
            b"pw",
            None,
            &VaultConfig::default().with_kdf_costs(8_192, 1, 1),
        )
        .unwrap();
        store
            .add_entry(EntryDraft::new("Bank", "alice", "hunter2").with_url("https://bank.example"))
            .unwrap();

        let json = format_as_json(&store.list_entries()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["title"], "Bank");
        assert_eq!(parsed[0]["secret"], "hunter2");
        assert_eq!(parsed[0]["url"], "https://bank.example");
        assert_eq!(parsed[0]["id"].as_str().unwrap().len(), 32);
    }

    #[cfg(unix)]
    #[test]
    fn export_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("export.json");
        write_private(&dest, b"[]").unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn export_tightens_an_existing_file_before_writing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("export.json");
        fs::write(&dest, "old contents that are longer").unwrap();
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o644)).unwrap();

        write_private(&dest, b"[]").unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read(&dest).unwrap(), b"[]");
    }
}
