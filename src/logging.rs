//! Diagnostic logging to stderr
//!
//! Event lines own stdout, so everything routed through the `log` facade
//! goes to stderr. `RUST_LOG` takes precedence over `-v` flags.

use anyhow::{anyhow, Result};
use log::LevelFilter;

/// Level selected by the number of `-v` flags
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the process-wide logger
pub fn init_logger(verbosity: u8) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level_for(verbosity))
        .target(env_logger::Target::Stderr)
        .format_timestamp_millis()
        .parse_default_env();

    builder
        .try_init()
        .map_err(|e| anyhow!("Failed to set logger: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(7), LevelFilter::Trace);
    }
}
