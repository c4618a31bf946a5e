//! Logging initialization.
//!
//! Controlled by two environment variables:
//! - `REBRANCH_LOG`: an `EnvFilter` directive (`debug`, `rebranch=trace`, ...).
//!   Defaults to `warn`.
//! - `REBRANCH_LOG_FORMAT`: `json` for one JSON object per event; anything
//!   else gives the human-readable format.
//!
//! Everything goes to stderr. Stdout is reserved for progress output.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter variable.
pub const LOG_ENV: &str = "REBRANCH_LOG";

/// Format variable.
pub const LOG_FORMAT_ENV: &str = "REBRANCH_LOG_FORMAT";

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("warning: logging not initialized: {e}");
    }
}
