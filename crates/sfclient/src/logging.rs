//! Process-wide log output.
//!
//! The library only emits `tracing` events. Applications that have no
//! subscriber of their own can call [`init`] once at startup.

use tracing_subscriber::{EnvFilter, fmt};

/// Install a formatting subscriber.
///
/// `RUST_LOG` wins when set. Otherwise everything down to `trace` is shown
/// with `debug`, and `info` and above without. Returns `false` if a global
/// subscriber was already installed, which leaves that one in place.
pub fn init(debug: bool) -> bool {
    let default_level = if debug { "trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
