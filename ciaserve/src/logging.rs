//! Tracing setup for the binary.

use ciaserve_core::error::{Result, ShareError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `verbosity`: 0=info, 1=debug, 2+=trace. `RUST_LOG` overrides it.
pub fn init_logging(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ciaserve={level},ciaserve_core={level},ciaserve_http={level},tower_http={}",
            if verbosity >= 1 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbosity >= 1)
                .with_file(verbosity >= 2)
                .with_line_number(verbosity >= 2),
        )
        .try_init()
        .map_err(|e| ShareError::Config(format!("logging: {e}")))
}
