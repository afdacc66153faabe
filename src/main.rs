use clap::Parser;
use credvault::cli::commands::{add::AddArgs, edit::EditArgs, search::SearchArgs};
use credvault::cli::{Cli, Commands};
use credvault::errors::Result;

fn main() {
    let cli = Cli::parse();
    credvault::logging::init(cli.verbose);

    if let Err(e) = run(&cli) {
        tracing::debug!(kind = ?e.kind(), "command failed");
        credvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    use credvault::cli::commands;

    match &cli.command {
        Commands::Init => commands::init::execute(cli),
        Commands::Add {
            title,
            username,
            secret,
            url,
            notes,
            tags,
            group,
            expires,
            fields,
            generate,
            generator,
        } => commands::add::execute(
            cli,
            &AddArgs {
                title,
                username,
                secret: secret.as_deref(),
                url,
                notes,
                tags,
                group,
                expires: expires.as_deref(),
                fields,
                generate: generate.then(|| generator.policy()),
            },
        ),
        Commands::Get { id, all } => commands::get::execute(cli, id, *all),
        Commands::List {
            json,
            group,
            expired,
        } => commands::list::execute(cli, *json, group.as_deref(), *expired),
        Commands::Search {
            text,
            tags,
            group,
            expired,
            json,
        } => commands::search::execute(
            cli,
            &SearchArgs {
                text,
                tags,
                group: group.as_deref(),
                expired: *expired,
                json: *json,
            },
        ),
        Commands::Edit {
            id,
            title,
            username,
            url,
            notes,
            tags,
            group,
            expires,
            no_expiry,
            fields,
            unset_fields,
            secret,
            generate,
            generator,
        } => commands::edit::execute(
            cli,
            id,
            &EditArgs {
                title: title.as_deref(),
                username: username.as_deref(),
                url: url.as_deref(),
                notes: notes.as_deref(),
                tags: tags.as_deref(),
                group: group.as_deref(),
                expires: expires.as_deref(),
                no_expiry: *no_expiry,
                fields,
                unset_fields,
                secret: *secret,
                generate: generate.then(|| generator.policy()),
            },
        ),
        Commands::Remove { id, force } => commands::remove::execute(cli, id, *force),
        Commands::RotateKey => commands::rotate::execute(cli),
        Commands::Export { output } => commands::export::execute(cli, output.as_deref()),
        Commands::Generate { generator } => commands::generate::execute(generator),
        Commands::KeyfileGenerate { path } => commands::keyfile::execute(path),
        Commands::Audit {
            last,
            since,
            entry,
            operation,
            all_vaults,
        } => audit(
            cli,
            AuditOptions {
                last: *last,
                since: since.as_deref(),
                entry: entry.as_deref(),
                operation: operation.as_deref(),
                all_vaults: *all_vaults,
            },
        ),
        Commands::Version => commands::version::execute(),
    }
}

/// `audit` flags, independent of whether audit support is compiled in.
struct AuditOptions<'a> {
    last: usize,
    since: Option<&'a str>,
    entry: Option<&'a str>,
    operation: Option<&'a str>,
    all_vaults: bool,
}

#[cfg(feature = "audit-log")]
fn audit(cli: &Cli, opts: AuditOptions<'_>) -> Result<()> {
    use credvault::cli::commands::audit_cmd::{self, AuditArgs};

    audit_cmd::execute(
        cli,
        &AuditArgs {
            last: opts.last,
            since: opts.since,
            entry: opts.entry,
            operation: opts.operation,
            all_vaults: opts.all_vaults,
        },
    )
}

#[cfg(not(feature = "audit-log"))]
fn audit(_cli: &Cli, _opts: AuditOptions<'_>) -> Result<()> {
    Err(credvault::errors::VaultError::Audit(
        "audit log support not compiled — rebuild with `--features audit-log`".into(),
    ))
}
