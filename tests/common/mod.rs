//! Shared helpers for the black-box tests.

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use vix::{ConnectOptions, Host, SimBackend, Vix};

static TRACING: Once = Once::new();

/// Install a test-friendly subscriber once. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A simulated context with a connected host.
pub fn connected() -> (Vix, SimBackend, Host) {
    init_tracing();
    let (vix, sim) = Vix::simulated();
    let host = Host::connect(&vix, ConnectOptions::default()).expect("connect should succeed");
    (vix, sim, host)
}
