//! `credvault rotate-key`: change the vault passphrase.
//!
//! Opens the vault with the current passphrase, re-keys it under the new
//! one with a fresh salt and the KDF costs from the current settings, and
//! writes it back atomically.  The keyfile requirement is kept as is:
//! whatever `--keyfile` was used to open is used for the new key.

use crate::cli::output;
use crate::cli::{load_keyfile, log_audit, open_session, prompt_new_passphrase, Cli};
use crate::errors::Result;

/// Execute the `rotate-key` command.
pub fn execute(cli: &Cli) -> Result<()> {
    output::info("Enter your current vault passphrase.");
    let (mut session, path) = open_session(cli)?;

    output::info("Choose your new vault passphrase.");
    let new_passphrase = prompt_new_passphrase()?;
    let keyfile = load_keyfile(cli)?;

    session.change_passphrase(new_passphrase.as_bytes(), keyfile.as_deref().map(|k| &k[..]))?;
    session.save_vault()?;
    let count = session.list_entries()?.len();
    session.close_vault();

    log_audit(
        &path,
        "rotate-key",
        None,
        Some(&format!("{count} entries re-encrypted")),
    );
    output::success(&format!(
        "Passphrase rotated for {} ({count} entries re-encrypted)",
        path.display()
    ));

    Ok(())
}
