//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` is used as the filter.
/// Logs go to stderr so stdout stays clean for reports and JSON.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // try_init: a second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Log level for the CLI: `debug` with `--verbose`, else the configured one.
pub fn effective_level(configured: &str, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        configured.to_string()
    }
}
