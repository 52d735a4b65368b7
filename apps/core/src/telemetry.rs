//! Structured logging setup.
//!
//! Logs go to stderr as bunyan JSON so the console chat on stdout stays readable.

use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const SERVICE_NAME: &str = "solace";

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` filter.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let formatting = BunyanFormattingLayer::new(SERVICE_NAME.to_string(), std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(JsonStorageLayer)
        .with(formatting)
        .try_init();
}
