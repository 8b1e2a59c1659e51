//! Tracing setup for processes embedding the library

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "guess_who_arena=info";

/// Install a JSON tracing subscriber filtered by `RUST_LOG`. Returns `false`
/// if a global subscriber was already set.
pub fn init() -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .try_init()
        .is_ok()
}
