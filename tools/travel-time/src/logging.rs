//! Tracing subscriber setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use travel_time_common::{Error, Result};

use crate::settings::{LogFormat, LoggingSettings};

/// Filter from `RUST_LOG` if set, otherwise from the settings
fn filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.filter).map_err(|e| {
            Error::Configuration(format!("Invalid log filter '{}': {e}", settings.filter))
        }),
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable. Fails if a subscriber is already installed.
pub fn init(settings: &LoggingSettings) -> Result<()> {
    let layer = match settings.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter(settings)?)
        .with(layer)
        .try_init()
        .map_err(|e| Error::Configuration(format!("Logging already initialised: {e}")))
}
