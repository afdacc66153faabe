//! Diagnostic logging for the `credvault` binary.
//!
//! Logs go to stderr so command output on stdout stays pipeable.  `RUST_LOG`
//! wins when set; otherwise the level is `warn`, or `debug` for `--verbose`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.  Calling it twice is harmless.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("credvault={default_level}")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
