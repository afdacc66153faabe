//! `credvault init`: create a new, empty vault.

use crate::cli::output;
use crate::cli::{load_keyfile, log_audit, prompt_new_passphrase, vault_config, vault_path, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::VaultSession;

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let path = vault_path(cli)?;

    // Refuse early so the user isn't asked for a passphrase for nothing.
    if path.exists() {
        output::tip("Use `credvault add` to add entries to the existing vault.");
        return Err(VaultError::AlreadyExists(path));
    }

    let passphrase = prompt_new_passphrase()?;
    let keyfile = load_keyfile(cli)?;

    let mut session = VaultSession::new(vault_config()?);
    session.create_vault(&path, passphrase.as_bytes(), keyfile.as_deref().map(|k| &k[..]))?;
    session.close_vault();

    if keyfile.is_some() {
        output::info("Vault created with keyfile — you must pass --keyfile on every command.");
    }
    output::success(&format!("Vault created at {}", path.display()));

    log_audit(&path, "init", None, Some("vault created"));

    output::tip("Run `credvault add <TITLE>` to add an entry.");
    output::tip("Run `credvault list` to see all entries.");

    Ok(())
}
