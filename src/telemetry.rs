//! Diagnostic Tracing Setup
//!
//! Opt-in `tracing` subscriber for hosts that embed the pipeline without
//! their own subscriber. The audit log is the durable record; this stream
//! is for operators watching the process.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a formatted subscriber at the given default level.
///
/// `RUST_LOG` takes precedence when set. Safe to call more than once; later
/// calls are no-ops if a global subscriber is already installed.
pub fn init(default_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
