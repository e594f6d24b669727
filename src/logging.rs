//! Tracing initialization.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "RAGREPO_LOG";

static INIT: Once = Once::new();

/// Install the global tracing subscriber.
///
/// Reads `RAGREPO_LOG` (e.g. `RAGREPO_LOG=ragrepo=debug,tower_http=debug`).
/// Falls back to `ragrepo=info,tower_http=info`, or debug level when `debug`
/// is set. Logs go to stderr so `search --json` output stays clean.
/// Calling it more than once is a no-op.
pub fn init(debug: bool) {
    INIT.call_once(|| {
        let fallback = if debug {
            "ragrepo=debug,tower_http=debug"
        } else {
            "ragrepo=info,tower_http=info"
        };
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

        // try_init: a test harness may already have installed a subscriber
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
    });
}
