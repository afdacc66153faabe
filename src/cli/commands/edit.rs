//! `credvault edit`: change fields of an existing entry.
//!
//! Only the fields passed on the command line change.  `--tag` replaces
//! the whole tag set, while `--field` and `--unset-field` touch single
//! custom fields.  `--secret` reads the new secret from stdin or a prompt
//! so it never appears in shell history.

use crate::cli::output;
use crate::cli::{log_audit, open_session, parse_expiry, parse_fields, read_secret, Cli};
use crate::crypto::{generate_secret, SecretPolicy};
use crate::errors::{Result, VaultError};
use crate::vault::EntryPatch;

/// Replacement values given on the command line.
pub struct EditArgs<'a> {
    pub title: Option<&'a str>,
    pub username: Option<&'a str>,
    pub url: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub tags: Option<&'a [String]>,
    pub group: Option<&'a str>,
    pub expires: Option<&'a str>,
    pub no_expiry: bool,
    pub fields: &'a [String],
    pub unset_fields: &'a [String],
    pub secret: bool,
    pub generate: Option<SecretPolicy>,
}

/// Turn the command line into a patch.  Nothing here needs the vault.
fn build_patch(args: &EditArgs<'_>) -> Result<EntryPatch> {
    let mut patch = EntryPatch::default();
    patch.title = args.title.map(str::to_string);
    patch.username = args.username.map(str::to_string);
    patch.url = args.url.map(str::to_string);
    patch.notes = args.notes.map(str::to_string);
    patch.tags = args.tags.map(<[String]>::to_vec);
    patch.group = args.group.map(str::to_string);
    if args.no_expiry {
        patch.expires_at = Some(None);
    } else if let Some(when) = args.expires {
        patch.expires_at = Some(Some(parse_expiry(when)?));
    }
    patch.set_fields = parse_fields(args.fields)?;
    patch.remove_fields = args.unset_fields.to_vec();
    if let Some(policy) = &args.generate {
        patch.secret = Some(generate_secret(policy)?.to_string());
    }
    Ok(patch)
}

/// Execute the `edit` command.
pub fn execute(cli: &Cli, id: &str, args: &EditArgs<'_>) -> Result<()> {
    let mut patch = build_patch(args)?;
    if args.secret {
        patch.secret = Some(read_secret("New secret")?.to_string());
    }

    if patch.is_empty() {
        return Err(VaultError::CommandFailed(
            "nothing to change — pass at least one field option such as --title, --field or --secret".into(),
        ));
    }

    let (mut session, path) = open_session(cli)?;
    let id = session.resolve_id(id)?;
    session.update_entry(id, patch)?;
    session.save_vault()?;
    let title = session.lookup(id)?.title.clone();
    session.close_vault();

    log_audit(&path, "edit", Some(&id.to_string()), None);
    output::success(&format!("Updated '{title}' ({})", output::short_id(id)));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> EditArgs<'static> {
        EditArgs {
            title: None,
            username: None,
            url: None,
            notes: None,
            tags: None,
            group: None,
            expires: None,
            no_expiry: false,
            fields: &[],
            unset_fields: &[],
            secret: false,
            generate: None,
        }
    }

    #[test]
    fn no_options_is_an_empty_patch() {
        assert!(build_patch(&args()).unwrap().is_empty());
    }

    #[test]
    fn no_expiry_clears_it() {
        let clear = EditArgs {
            no_expiry: true,
            ..args()
        };
        assert_eq!(build_patch(&clear).unwrap().expires_at, Some(None));

        let set = EditArgs {
            expires: Some("2027-01-31"),
            ..args()
        };
        assert!(matches!(build_patch(&set).unwrap().expires_at, Some(Some(_))));
    }

    #[test]
    fn generate_fills_the_secret() {
        let generated = EditArgs {
            generate: Some(SecretPolicy::default()),
            ..args()
        };
        let patch = build_patch(&generated).unwrap();
        assert_eq!(patch.secret.as_ref().map(String::len), Some(24));
    }

    #[test]
    fn bad_field_is_an_error() {
        let fields = ["pin".to_string()];
        let bad = EditArgs {
            fields: &fields,
            ..args()
        };
        assert!(build_patch(&bad).is_err());
    }
}
