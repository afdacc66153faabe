//! `credvault generate`: print a random secret.
//!
//! No vault is opened.  The secret goes to stdout alone so it can be piped
//! into `credvault add` or another tool.

use crate::cli::GenerateOpts;
use crate::crypto::generate_secret;
use crate::errors::Result;

/// Execute the `generate` command.
pub fn execute(opts: &GenerateOpts) -> Result<()> {
    let secret = generate_secret(&opts.policy())?;
    println!("{}", secret.as_str());
    Ok(())
}
