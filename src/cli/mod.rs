//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use zeroize::Zeroizing;

use crate::config::{Settings, VaultConfig};
use crate::crypto::{Charset, SecretPolicy};
use crate::errors::{ErrorKind, Result, VaultError};
use crate::vault::{guard, VaultSession};

/// Minimum passphrase length accepted for new vaults and key rotation.
const MIN_PASSPHRASE_LEN: usize = 8;

/// Interactive unlock attempts per command before giving up.
const MAX_PROMPT_ATTEMPTS: u32 = 3;

/// Environment variable consulted before prompting for a passphrase.
pub const PASSPHRASE_ENV: &str = "CREDVAULT_PASSPHRASE";

/// credvault CLI: local encrypted credential vault.
#[derive(Parser)]
#[command(
    name = "credvault",
    about = "Local encrypted credential vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault file (default: `vault_path` from .credvault.toml, else credvault.vault)
    #[arg(long, global = true, env = "CREDVAULT_VAULT")]
    pub vault: Option<PathBuf>,

    /// Path to a keyfile for two-factor vault access
    #[arg(long, global = true)]
    pub keyfile: Option<PathBuf>,

    /// Print debug diagnostics to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Character set choices for generated secrets.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharsetArg {
    /// Letters and digits
    Alnum,
    /// Letters, digits and punctuation
    Symbols,
    /// Lowercase hexadecimal
    Hex,
}

/// Options shaping a generated secret.
#[derive(clap::Args, Debug, Clone)]
pub struct GenerateOpts {
    /// Length of the generated secret
    #[arg(long, default_value_t = 24)]
    pub length: usize,
    /// Character set of the generated secret
    #[arg(long, value_enum, default_value_t = CharsetArg::Symbols)]
    pub charset: CharsetArg,
}

impl GenerateOpts {
    /// Every class the chosen character set has is required.
    pub fn policy(&self) -> SecretPolicy {
        let charset = match self.charset {
            CharsetArg::Alnum => Charset::Alphanumeric,
            CharsetArg::Symbols => Charset::Symbols,
            CharsetArg::Hex => Charset::Hex,
        };
        SecretPolicy {
            length: self.length,
            charset,
            require_uppercase: charset != Charset::Hex,
            require_digit: charset != Charset::Hex,
            require_symbol: charset == Charset::Symbols,
        }
    }
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new, empty vault
    Init,

    /// Add a credential entry
    Add {
        /// Entry title (e.g. "Bank")
        title: String,
        /// Login name
        #[arg(short, long, default_value = "")]
        username: String,
        /// Secret value (omit for interactive prompt or piped stdin)
        #[arg(long)]
        secret: Option<String>,
        /// Site address (http:// or https://)
        #[arg(long, default_value = "")]
        url: String,
        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Folder path such as "Internet/Email"
        #[arg(short, long, default_value = "")]
        group: String,
        /// Expiry: a date (2027-01-31), an RFC 3339 time or a span ahead (90d, 12w)
        #[arg(long)]
        expires: Option<String>,
        /// Extra field as NAME=VALUE (repeatable)
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
        /// Generate a random secret instead of reading one
        #[arg(long, conflicts_with = "secret")]
        generate: bool,
        #[command(flatten)]
        generator: GenerateOpts,
    },

    /// Print an entry's secret (or all fields with --all)
    Get {
        /// Entry id or unique id prefix
        id: String,
        /// Show every field instead of only the secret
        #[arg(long)]
        all: bool,
    },

    /// List all entries
    List {
        /// Emit JSON instead of a table (secrets omitted)
        #[arg(long)]
        json: bool,
        /// Only entries in this group or below it
        #[arg(short, long)]
        group: Option<String>,
        /// Only entries whose expiry has passed
        #[arg(long)]
        expired: bool,
    },

    /// Search entries by text and tags
    Search {
        /// Text matched against title, username, url, notes, group and field names
        #[arg(default_value = "")]
        text: String,
        /// Required tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Only entries in this group or below it
        #[arg(short, long)]
        group: Option<String>,
        /// Only entries whose expiry has passed
        #[arg(long)]
        expired: bool,
        /// Emit JSON instead of a table (secrets omitted)
        #[arg(long)]
        json: bool,
    },

    /// Change fields of an entry
    Edit {
        /// Entry id or unique id prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        username: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Replace the tag set (repeatable)
        #[arg(short, long = "tag")]
        tags: Option<Vec<String>>,
        /// Move the entry to this group ("" for the top level)
        #[arg(short, long)]
        group: Option<String>,
        /// New expiry: a date, an RFC 3339 time or a span ahead
        #[arg(long)]
        expires: Option<String>,
        /// Remove the expiry
        #[arg(long, conflicts_with = "expires")]
        no_expiry: bool,
        /// Add or overwrite a field as NAME=VALUE (repeatable)
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
        /// Remove the field with this name (repeatable)
        #[arg(long = "unset-field", value_name = "NAME")]
        unset_fields: Vec<String>,
        /// Prompt for (or read from stdin) a new secret
        #[arg(long)]
        secret: bool,
        /// Replace the secret with a generated one
        #[arg(long, conflicts_with = "secret")]
        generate: bool,
        #[command(flatten)]
        generator: GenerateOpts,
    },

    /// Remove an entry
    Remove {
        /// Entry id or unique id prefix
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Change the vault passphrase (and re-key with current KDF settings)
    RotateKey,

    /// Export all entries, secrets included, as JSON
    Export {
        /// Output file path (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a random secret without touching any vault
    Generate {
        #[command(flatten)]
        generator: GenerateOpts,
    },

    /// Generate a new random keyfile
    KeyfileGenerate {
        /// Path for the keyfile
        path: PathBuf,
    },

    /// Show the recorded history of this vault
    Audit {
        /// Number of events to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Only events since a span ago (30m, 24h, 7d, 2w) or an RFC 3339 time
        #[arg(long)]
        since: Option<String>,
        /// Only events of the entry with this id or id prefix
        #[arg(long)]
        entry: Option<String>,
        /// Only events of this operation (e.g. add, unlock-failed)
        #[arg(long = "op")]
        operation: Option<String>,
        /// Include every vault sharing the audit database
        #[arg(long)]
        all_vaults: bool,
    },

    /// Show version information
    Version,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Read the passphrase from `CREDVAULT_PASSPHRASE`, if set and non-empty.
fn passphrase_from_env() -> Option<Zeroizing<String>> {
    match std::env::var(PASSPHRASE_ENV) {
        Ok(pw) if !pw.is_empty() => Some(Zeroizing::new(pw)),
        _ => None,
    }
}

/// Get the vault passphrase from the environment or an interactive prompt.
///
/// Returns `Zeroizing<String>` so the passphrase is wiped from memory on drop.
pub fn prompt_passphrase() -> Result<Zeroizing<String>> {
    if let Some(pw) = passphrase_from_env() {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter vault passphrase")
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("passphrase prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new passphrase with confirmation (used by `init` and
/// `rotate-key`).
///
/// Also respects `CREDVAULT_PASSPHRASE` for scripted/CI usage.
/// Enforces a minimum length.
pub fn prompt_new_passphrase() -> Result<Zeroizing<String>> {
    if let Some(pw) = passphrase_from_env() {
        if pw.len() < MIN_PASSPHRASE_LEN {
            return Err(VaultError::CommandFailed(format!(
                "passphrase must be at least {MIN_PASSPHRASE_LEN} characters"
            )));
        }
        return Ok(pw);
    }

    loop {
        let pw = dialoguer::Password::new()
            .with_prompt("Choose vault passphrase")
            .with_confirmation(
                "Confirm vault passphrase",
                "Passphrases do not match, try again",
            )
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("passphrase prompt: {e}")))?;

        if pw.len() < MIN_PASSPHRASE_LEN {
            output::warning(&format!(
                "Passphrase must be at least {MIN_PASSPHRASE_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(pw));
    }
}

/// Resolve the vault file: `--vault`, else the configured default.
pub fn vault_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.vault {
        Some(path) => Ok(path.clone()),
        None => {
            let cwd = std::env::current_dir()?;
            Ok(Settings::load(&cwd)?.vault_path(&cwd))
        }
    }
}

/// Runtime config from `.credvault.toml` in the working directory.
pub fn vault_config() -> Result<VaultConfig> {
    let cwd = std::env::current_dir()?;
    Ok(Settings::load(&cwd)?.vault_config())
}

/// Parse a span such as `90m`, `24h`, `7d` or `2w`.
pub fn parse_span(input: &str) -> Option<chrono::Duration> {
    let input = input.trim();
    let split = input.len().checked_sub(1)?;
    let num: i64 = input.get(..split)?.parse().ok()?;
    if num < 0 {
        return None;
    }
    match input.get(split..)? {
        "w" => chrono::Duration::try_weeks(num),
        "d" => chrono::Duration::try_days(num),
        "h" => chrono::Duration::try_hours(num),
        "m" => chrono::Duration::try_minutes(num),
        _ => None,
    }
}

/// Parse an expiry given on the command line: an RFC 3339 time, a date
/// (midnight UTC), or a span ahead of now.
pub fn parse_expiry(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Some(midnight) = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }
    parse_span(input)
        .and_then(|span| Utc::now().checked_add_signed(span))
        .ok_or_else(|| {
            VaultError::CommandFailed(format!(
                "invalid expiry '{input}': use 2027-01-31, an RFC 3339 time or a span like 90d"
            ))
        })
}

/// Parse repeated `NAME=VALUE` arguments.
pub fn parse_fields(args: &[String]) -> Result<Vec<crate::vault::CustomField>> {
    args.iter().map(|arg| arg.parse()).collect()
}

/// Load the keyfile bytes from `--keyfile`, if provided.
pub fn load_keyfile(cli: &Cli) -> Result<Option<Zeroizing<Vec<u8>>>> {
    cli.keyfile
        .as_deref()
        .map(crate::crypto::load_keyfile)
        .transpose()
}

/// Open the vault for a command.
///
/// With `CREDVAULT_PASSPHRASE` set there is exactly one attempt.  Otherwise
/// the user is re-prompted after a wrong passphrase.  Every attempt is
/// counted by the session's guard, whose state is restored from and saved
/// next to the vault so failures add up across invocations.
pub fn open_session(cli: &Cli) -> Result<(VaultSession, PathBuf)> {
    let path = vault_path(cli)?;
    let keyfile = load_keyfile(cli)?;
    let mut session = VaultSession::new(vault_config()?);
    session.guard().restore(&guard::load_record(&path)?);

    let interactive = passphrase_from_env().is_none();
    let mut attempts = 0;
    loop {
        attempts += 1;
        let passphrase = prompt_passphrase()?;
        let result =
            session.open_vault(&path, passphrase.as_bytes(), keyfile.as_deref().map(|k| &k[..]));
        guard::save_record(&path, &session.guard().to_record())?;

        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::Auth => log_audit(&path, "unlock-failed", None, None),
                ErrorKind::Cooldown => log_audit(&path, "unlock-refused", None, Some(&e.to_string())),
                _ => {}
            }
        }

        match result {
            Ok(()) => return Ok((session, path)),
            Err(e) if interactive && e.kind() == ErrorKind::Auth && attempts < MAX_PROMPT_ATTEMPTS => {
                output::warning(&e.to_string());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read a secret value from piped stdin, or prompt for it.
pub fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    use std::io::{self, IsTerminal, Read};

    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim_end_matches(['\r', '\n']).len();
        buf.truncate(trimmed);
        return Ok(buf);
    }

    let value = dialoguer::Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("input prompt: {e}")))?;
    Ok(Zeroizing::new(value))
}

/// Record an audit event for `vault`.  A no-op without the `audit-log`
/// feature.
pub fn log_audit(vault: &Path, op: &str, entry_id: Option<&str>, details: Option<&str>) {
    #[cfg(feature = "audit-log")]
    crate::audit::log_event(vault, op, entry_id, details);

    #[cfg(not(feature = "audit-log"))]
    let _ = (vault, op, entry_id, details);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["credvault", "list", "--vault", "x.vault", "-v"]);
        assert_eq!(cli.vault.as_deref(), Some(Path::new("x.vault")));
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::List {
                json: false,
                expired: false,
                ..
            }
        ));
    }

    #[test]
    fn add_collects_repeated_tags() {
        let cli = Cli::parse_from(["credvault", "add", "Bank", "-t", "finance", "--tag", "home"]);
        match cli.command {
            Commands::Add { title, tags, .. } => {
                assert_eq!(title, "Bank");
                assert_eq!(tags, ["finance", "home"]);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn edit_without_tags_leaves_them_alone() {
        let cli = Cli::parse_from(["credvault", "edit", "abcd", "--title", "New"]);
        match cli.command {
            Commands::Edit { tags, title, .. } => {
                assert!(tags.is_none());
                assert_eq!(title.as_deref(), Some("New"));
            }
            _ => panic!("expected edit"),
        }
    }

    #[test]
    fn explicit_vault_path_wins() {
        let cli = Cli::parse_from(["credvault", "--vault", "/tmp/a.vault", "init"]);
        assert_eq!(vault_path(&cli).unwrap(), PathBuf::from("/tmp/a.vault"));
    }

    #[test]
    fn missing_keyfile_flag_loads_nothing() {
        let cli = Cli::parse_from(["credvault", "init"]);
        assert!(load_keyfile(&cli).unwrap().is_none());
    }

    #[test]
    fn add_takes_group_expiry_and_fields() {
        let cli = Cli::parse_from([
            "credvault", "add", "Bank", "-g", "Finance", "--expires", "2027-01-31",
            "--field", "pin=4711", "--field", "iban=DE00", "--generate", "--charset", "alnum",
        ]);
        match cli.command {
            Commands::Add {
                group,
                expires,
                fields,
                generate,
                generator,
                ..
            } => {
                assert_eq!(group, "Finance");
                assert_eq!(expires.as_deref(), Some("2027-01-31"));
                assert_eq!(fields, ["pin=4711", "iban=DE00"]);
                assert!(generate);
                assert_eq!(generator.charset, CharsetArg::Alnum);
                assert_eq!(generator.length, 24);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn generate_conflicts_with_a_given_secret() {
        let parsed =
            Cli::try_parse_from(["credvault", "add", "Bank", "--secret", "x", "--generate"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn generator_policy_follows_the_charset() {
        let opts = GenerateOpts {
            length: 32,
            charset: CharsetArg::Hex,
        };
        let policy = opts.policy();
        assert_eq!(policy.charset, Charset::Hex);
        assert!(!policy.require_uppercase && !policy.require_symbol);
        assert!(crate::crypto::generate_secret(&policy).is_ok());
    }

    #[test]
    fn spans_and_expiry_dates_parse() {
        assert_eq!(parse_span("7d"), chrono::Duration::try_days(7));
        assert_eq!(parse_span("90m"), chrono::Duration::try_minutes(90));
        for bad in ["", "d", "7x", "-1d", "abc"] {
            assert!(parse_span(bad).is_none(), "{bad:?}");
        }

        let date = parse_expiry("2027-01-31").unwrap();
        assert_eq!(date.to_rfc3339(), "2027-01-31T00:00:00+00:00");
        let stamp = parse_expiry("2027-01-31T12:00:00+01:00").unwrap();
        assert_eq!(stamp.to_rfc3339(), "2027-01-31T11:00:00+00:00");
        let ahead = parse_expiry("30d").unwrap() - Utc::now();
        assert!((ahead.num_days() - 30).abs() <= 1);
        assert!(parse_expiry("someday").is_err());
    }

    #[test]
    fn field_arguments_need_a_name() {
        let fields = parse_fields(&["pin=1".into(), "note=a=b".into()]).unwrap();
        assert_eq!(fields[1].value, "a=b");
        assert!(parse_fields(&["oops".into()]).is_err());
    }
}
