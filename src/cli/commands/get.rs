//! `credvault get`: print an entry's secret, or every field with `--all`.

use crate::cli::output;
use crate::cli::{open_session, Cli};
use crate::errors::Result;

/// Execute the `get` command.
pub fn execute(cli: &Cli, id: &str, all: bool) -> Result<()> {
    let (mut session, _path) = open_session(cli)?;
    let id = session.resolve_id(id)?;
    let entry = session.lookup(id)?;
    session.close_vault();

    if all {
        output::print_entry(&entry);
    } else {
        println!("{}", entry.secret);
    }

    Ok(())
}
