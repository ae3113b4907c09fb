use tracing_subscriber::EnvFilter;

/// Initialize structured logging with tracing-subscriber.
///
/// Reads `ROSTERD_LOG`, then `RUST_LOG`, otherwise falls back to `default_level`.
/// Output goes to stderr; stdout is reserved for IPC responses.
pub fn init(default_level: &str) {
    let env_filter = EnvFilter::try_from_env("ROSTERD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
