//! Tracing subscriber setup for the CLI.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Environment variable consulted when `--log-filter` is absent.
pub(crate) const LOG_ENV: &str = "STENCIL_LOG";
const DEFAULT_FILTER: &str = "warn";

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub(crate) enum TelemetryError {
    /// Failed to parse the log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs a stderr subscriber on first use; later calls are no-ops.
pub(crate) fn initialise(filter: Option<&str>) -> Result<(), TelemetryError> {
    let directive = filter
        .map(str::to_owned)
        .or_else(|| std::env::var(LOG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned());
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(&directive))
        .map(|_| ())
}

fn install_subscriber(directive: &str) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(directive).map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_filters() {
        let result = install_subscriber("stencil=loudest");
        assert!(matches!(result, Err(TelemetryError::Filter(_))));
    }
}
