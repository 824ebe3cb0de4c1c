use std::env;

use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// stderr logging; stdout stays free for the report.
///
/// `PURGER_LOG` wins over `RUST_LOG`; both fall back to `default_level`.
pub fn init_logger(default_level: &str) {
    let filter = env::var("PURGER_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());
    let filter_layer = EnvFilter::new(filter);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .compact(),
        )
        .with(filter_layer)
        .init();

    debug!("logging configured");
}
