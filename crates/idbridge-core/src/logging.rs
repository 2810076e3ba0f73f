//! Log setup and line prefixes.
//!
//! Library code only emits `tracing` events. Native tools and test binaries
//! install a subscriber with [`init`]; in the browser the host decides.

#[cfg(not(target_arch = "wasm32"))]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a compact subscriber filtered by `RUST_LOG`.
///
/// Without `RUST_LOG` the filter is `info`, or `idbridge_core=debug` when
/// `debug` is set so the client's per-operation traces show up. Output goes
/// through the test writer so `cargo test` captures it. Returns `false` if a
/// global subscriber was already installed.
#[cfg(not(target_arch = "wasm32"))]
pub fn init(debug: bool) -> bool {
    let default_filter = if debug {
        "info,idbridge_core=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_test_writer())
        .try_init()
        .is_ok()
}

/// Segment prefixes for log lines.
pub mod prefix {
    /// Record operations
    pub const DB: &str = "⊔";
    /// Connection opened
    pub const OPEN: &str = "✿";
    /// Connection closed
    pub const CLOSE: &str = "❀";
}
