//! Utilities: logging setup (verbosity flags -> tracing level filter).
//!
//! Key items:
//!   init_logging / derive_level

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the flag-derived filter
/// (any `EnvFilter` directive, e.g. `shellkit=trace`).
pub const LOG_ENV: &str = "SHELLKIT_LOG";

/// Map `-v` count and `-q` to a level filter. `-q` wins over `-v`.
pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. Logs go to stderr so stdout only carries
/// command output. Calling this twice is harmless (second call is ignored).
pub fn init_logging(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
