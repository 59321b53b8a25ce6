use tracing_subscriber::EnvFilter;

/// Install the process-wide log subscriber.
///
/// `RUST_LOG` wins over `level`; with neither set, debug builds log at debug
/// and release builds at info. Records from the `log` facade are captured
/// too. Calling this twice is harmless.
pub fn init_logging(level: Option<&str>) {
    let fallback = level.unwrap_or(if cfg!(debug_assertions) { "debug" } else { "info" });
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        log::debug!("[logging] Subscriber already installed");
    }
}
