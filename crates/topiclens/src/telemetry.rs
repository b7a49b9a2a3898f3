use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an env-based filter and bridge `log` records.
///
/// - `RUST_LOG` wins when set (e.g. "info", "debug,topiclens=trace").
/// - Otherwise `default_level` (the configured log level) applies.
/// - `log` crate records are forwarded to `tracing` via `LogTracer`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(default_level: &str) {
    let _ = LogTracer::init();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_target(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
