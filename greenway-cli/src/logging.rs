//! Logger installation for the `greenway` binary.

use env_logger::{Builder, Env};

/// Default filter when `RUST_LOG` is unset.
pub(crate) const DEFAULT_FILTER: &str = "info";

/// Install the process-wide logger.
///
/// `RUST_LOG` overrides [`DEFAULT_FILTER`]. Output goes to stderr so command
/// output on stdout stays machine-readable.
pub(crate) fn init() -> Result<(), log::SetLoggerError> {
    Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .format_timestamp_millis()
        .try_init()
}
