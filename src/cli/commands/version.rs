//! `credvault version`: display version and vault format information.

use console::style;

use crate::errors::Result;
use crate::vault::codec::CODEC_VERSION;
use crate::vault::format::FORMAT_VERSION;

/// Execute the `version` command.
pub fn execute() -> Result<()> {
    let current = env!("CARGO_PKG_VERSION");
    println!("credvault {current}");
    println!(
        "{}",
        style(format!(
            "vault format v{FORMAT_VERSION}, payload codec v{CODEC_VERSION}, Argon2id + AES-256-GCM"
        ))
        .dim()
    );
    Ok(())
}
