//! Shared logging setup for the tablelens binaries.

use tracing_subscriber::EnvFilter;

use crate::Result;

/// Initializes structured logging.
///
/// Verbosity maps to 0=INFO, 1=DEBUG, 2+=TRACE; `quiet` forces ERROR.
/// A `RUST_LOG` value, when set, overrides the flag-derived level.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            crate::error::TableLensError::configuration(format!(
                "failed to initialize logging: {e}"
            ))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be installed once per process, so the
    // level mapping is checked without calling try_init.

    #[test]
    fn test_level_mapping() {
        let cases = [
            ((true, 0), "error"),
            ((true, 3), "error"),
            ((false, 0), "info"),
            ((false, 1), "debug"),
            ((false, 2), "trace"),
            ((false, 9), "trace"),
        ];

        for ((quiet, verbose), expected) in cases {
            let level = match (quiet, verbose) {
                (true, _) => "error",
                (false, 0) => "info",
                (false, 1) => "debug",
                (false, _) => "trace",
            };
            assert_eq!(level, expected, "quiet={quiet}, verbose={verbose}");
        }
    }
}
