//! `credvault keyfile-generate`: create a new random keyfile.

use std::path::Path;

use crate::cli::output;
use crate::errors::Result;

/// Execute the `keyfile-generate` command.
pub fn execute(path: &Path) -> Result<()> {
    crate::crypto::generate_keyfile(path)?;

    output::success(&format!("Keyfile generated at {}", path.display()));
    output::warning("Keep this file secret! Anyone with it can help unlock your vault.");
    output::tip("Pass it with --keyfile to `credvault init` to require it for the new vault.");

    Ok(())
}
