//! Diagnostic logging.
//!
//! User-facing progress goes to stdout through [`crate::output`]. Diagnostics
//! (rule overlap warnings, per-file resolve/plan traces) go through `tracing`
//! to stderr, so piping the CLI output stays clean.
//!
//! `RUST_LOG` wins when set. Otherwise `-v` enables debug output for this
//! crate and the default is warnings only.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "asset_resolver=debug"
    } else {
        "asset_resolver=warn"
    }
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_selects_debug() {
        assert_eq!(default_directive(true), "asset_resolver=debug");
        assert_eq!(default_directive(false), "asset_resolver=warn");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(false);
        init(true);
    }
}
