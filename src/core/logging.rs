//! Native logging setup.
//!
//! The library itself only emits through `log` and `tracing`; hosts decide
//! where records go. Browser hosts forward `log` to the console. Native hosts
//! (the CLI, headless runners) call [`init`] once.

use std::io;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output style for [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per line, for piping into other tools.
    Json,
}

/// Initialize the logging system.
///
/// This sets up:
/// 1. A stderr layer filtered by `RUST_LOG`, falling back to `default_filter`.
/// 2. Redirects standard `log` crate events to `tracing`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_filter: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let layer = match format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .compact()
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .json()
            .with_target(true)
            .with_filter(env_filter)
            .boxed(),
    };

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        return;
    }

    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to initialize LogTracer: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init("warn", LogFormat::Pretty);
        init("debug", LogFormat::Json);
        log::debug!("still fine");
    }
}
