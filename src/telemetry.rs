//! Tracing setup for binaries.
//!
//! Filter comes from `RUST_LOG` when set, `info` otherwise. Output goes to
//! stderr so stdout stays free for the interview transcript.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::FeatureFlags;

/// Installs the global subscriber according to the feature flags.
///
/// Does nothing when tracing is disabled or a subscriber is already set.
pub fn init_tracing(flags: &FeatureFlags) {
    if !flags.enable_tracing {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if flags.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
}
