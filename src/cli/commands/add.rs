//! `credvault add`: add a credential entry.

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{log_audit, open_session, parse_expiry, parse_fields, read_secret, Cli};
use crate::crypto::{generate_secret, SecretPolicy};
use crate::errors::Result;
use crate::vault::EntryDraft;

/// Field values for a new entry, as given on the command line.
pub struct AddArgs<'a> {
    pub title: &'a str,
    pub username: &'a str,
    pub secret: Option<&'a str>,
    pub url: &'a str,
    pub notes: &'a str,
    pub tags: &'a [String],
    pub group: &'a str,
    pub expires: Option<&'a str>,
    pub fields: &'a [String],
    /// Draw the secret from this policy instead of reading it.
    pub generate: Option<SecretPolicy>,
}

/// Execute the `add` command.
pub fn execute(cli: &Cli, args: &AddArgs<'_>) -> Result<()> {
    let expires_at = args.expires.map(parse_expiry).transpose()?;
    let fields = parse_fields(args.fields)?;

    let secret = match (args.secret, &args.generate) {
        (Some(v), _) => {
            output::warning("Secret provided on command line — it may appear in shell history.");
            Zeroizing::new(v.to_string())
        }
        (None, Some(policy)) => generate_secret(policy)?,
        (None, None) => read_secret(&format!("Secret for {}", args.title))?,
    };

    let mut draft = EntryDraft::new(args.title, args.username, &secret)
        .with_url(args.url)
        .with_notes(args.notes)
        .with_tags(args.tags.iter().cloned())
        .with_group(args.group);
    draft.expires_at = expires_at;
    draft.custom_fields = fields;

    let (mut session, path) = open_session(cli)?;
    let id = session.add_entry(draft)?;
    session.save_vault()?;
    let total = session.list_entries()?.len();
    session.close_vault();

    log_audit(&path, "add", Some(&id.to_string()), None);
    output::success(&format!(
        "Added '{}' as {} ({total} total)",
        args.title,
        output::short_id(id)
    ));
    if args.generate.is_some() {
        output::tip(&format!("Run `credvault get {}` to see the generated secret.", output::short_id(id)));
    }

    Ok(())
}
