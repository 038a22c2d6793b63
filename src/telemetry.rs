//! Tracing initialization for hosts that embed the gate.
//!
//! The gate itself only emits `tracing` events; installing a subscriber is
//! the host's choice. [`init`] wires up the conventional env-filtered
//! formatter (`RUST_LOG` controls verbosity, default `info`).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs an env-filtered formatting subscriber. Safe to call more than
/// once; later calls are no-ops.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .try_init();
}
