//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Filter used when neither `MRUN_LOG` nor the config sets one
pub const DEFAULT_FILTER: &str = "warn";

/// Initialize logging on stderr with `directives` (e.g. `mrun_runner=debug`).
///
/// Invalid directives fall back to [`DEFAULT_FILTER`]. Later calls are no-ops.
pub fn init_logging(directives: Option<&str>) {
    INIT.call_once(|| {
        let filter = directives
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}
