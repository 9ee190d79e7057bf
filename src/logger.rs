use tracing_subscriber::EnvFilter;

/// Installs a stdout subscriber filtered by `RUST_LOG` (default `info`).
///
/// Library code logs through the `log` facade; the subscriber's log bridge
/// forwards those records.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .without_time()
        .init();
}
