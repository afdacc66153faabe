//! `credvault list`: display all entries, or those of one group.

use chrono::Utc;

use crate::cli::output;
use crate::cli::{open_session, Cli};
use crate::errors::Result;
use crate::vault::Query;

/// Execute the `list` command.
pub fn execute(cli: &Cli, json: bool, group: Option<&str>, expired: bool) -> Result<()> {
    let (mut session, path) = open_session(cli)?;
    let entries = if group.is_none() && !expired {
        session.list_entries()?
    } else {
        let mut query = Query::new().group(group.unwrap_or_default());
        if expired {
            query = query.expired(Utc::now());
        }
        session.search(query.into_predicate())?.collect_entries()
    };
    session.close_vault();

    if json {
        println!("{}", output::entries_json(&entries)?);
        return Ok(());
    }

    output::info(&format!("{} — {} entries", path.display(), entries.len()));
    output::print_entries_table(&entries);

    Ok(())
}
