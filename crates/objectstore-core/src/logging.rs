//! Log setup and the glyphs that tag object store log lines.
//!
//! The library itself only emits `tracing` events. Installing a subscriber is
//! left to the application; [`init`] covers native binaries and tests.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "objectstore_core=info,objectstore_indexeddb=info";

/// Install a compact terminal subscriber honouring `RUST_LOG`.
///
/// Returns `false` when a global subscriber was already installed, which
/// is expected when several tests call this.
pub fn init() -> bool {
    init_with_filter(DEFAULT_FILTER)
}

/// Like [`init`], with `default_filter` used when `RUST_LOG` is unset or invalid.
pub fn init_with_filter(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false))
        .try_init()
        .is_ok()
}

/// Segment glyphs prefixed to log lines.
pub mod prefix {
    /// Store and record operations
    pub const DB: &str = "⊔";
    /// Connection opened
    pub const DB_OPEN: &str = "✿";
    /// Connection closed
    pub const DB_CLOSE: &str = "❀";
    /// Schema version change
    pub const UPGRADE: &str = "⇡";
}
