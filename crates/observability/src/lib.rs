//! Process-wide tracing setup for hosts embedding the supply-chain engine.
//!
//! The engine itself only emits `tracing` spans and events; installing a
//! subscriber is the host's call.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Output shape of the installed formatter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    #[default]
    Json,
    /// Human-readable lines, for local runs and tests.
    Pretty,
}

/// Install the JSON subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    init_with(LogFormat::Json);
}

/// Like [`init`] with an explicit format. Returns whether this call installed
/// the subscriber.
pub fn init_with(format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let installed = match format {
        LogFormat::Json => builder.json().with_target(false).try_init().is_ok(),
        LogFormat::Pretty => builder.with_test_writer().try_init().is_ok(),
    };
    if installed {
        tracing::debug!(?format, "tracing subscriber installed");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_a_no_op() {
        init_with(LogFormat::Pretty);
        assert!(!init_with(LogFormat::Json));
        init();
    }
}
