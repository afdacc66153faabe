//! `credvault search`: find entries by text, tags and group.

use chrono::Utc;

use crate::cli::output;
use crate::cli::{open_session, Cli};
use crate::errors::Result;
use crate::vault::Query;

/// Search criteria from the command line.
pub struct SearchArgs<'a> {
    pub text: &'a str,
    pub tags: &'a [String],
    pub group: Option<&'a str>,
    pub expired: bool,
    pub json: bool,
}

/// Execute the `search` command.
pub fn execute(cli: &Cli, args: &SearchArgs<'_>) -> Result<()> {
    let mut query = args
        .tags
        .iter()
        .fold(Query::new().text(args.text), |q, t| q.tag(t))
        .group(args.group.unwrap_or_default());
    if args.expired {
        query = query.expired(Utc::now());
    }

    let (mut session, _path) = open_session(cli)?;
    let results = session.search(query.into_predicate())?;
    let matches = results.collect_entries();
    session.close_vault();

    if args.json {
        println!("{}", output::entries_json(&matches)?);
    } else {
        output::print_entries_table(&matches);
    }

    Ok(())
}
