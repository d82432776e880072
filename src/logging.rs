//! Split-stream logging setup.
//!
//! Records below WARN go to stdout, WARN and above to stderr, so hosted
//! live-log viewers can keep diagnostics and progress output apart.

use tracing::{Level, Metadata};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

fn below_warn(meta: &Metadata<'_>) -> bool {
    // tracing orders levels ERROR < WARN < INFO < DEBUG < TRACE
    *meta.level() > Level::WARN
}

pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_filter(filter_fn(|meta: &Metadata<'_>| below_warn(meta)));

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter_fn(|meta: &Metadata<'_>| !below_warn(meta)));

    // try_init so repeated initialization (tests) is harmless
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(stderr)
        .try_init();
}
