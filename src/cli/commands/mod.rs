//! One module per `credvault` subcommand.

pub mod add;
#[cfg(feature = "audit-log")]
pub mod audit_cmd;
pub mod edit;
pub mod export;
pub mod generate;
pub mod get;
pub mod init;
pub mod keyfile;
pub mod list;
pub mod remove;
pub mod rotate;
pub mod search;
pub mod version;
