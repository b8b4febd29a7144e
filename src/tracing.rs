//! Tracing initialization
//!
//! Console logging with an environment-driven filter. Hot paths attach
//! structured fields (`conversation_id`, `session_id`, round counters) so one
//! conversation can be followed through the agent loop and the sandbox.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,reagent=debug";

/// Initialize the tracing subsystem
///
/// Log levels come from `RUST_LOG` when set, otherwise crate-level debug on
/// top of global info. Safe to call once per process.
pub fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }
}
