//! `credvault remove`: delete an entry from the vault.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{log_audit, open_session, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `remove` command.
pub fn execute(cli: &Cli, id: &str, force: bool) -> Result<()> {
    let (mut session, path) = open_session(cli)?;
    let id = session.resolve_id(id)?;
    let title = session.lookup(id)?.title.clone();

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove entry '{title}'?"))
            .default(false)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    session.remove_entry(id)?;
    session.save_vault()?;
    session.close_vault();

    log_audit(&path, "remove", Some(&id.to_string()), None);
    output::success(&format!("Removed '{title}'"));

    Ok(())
}
