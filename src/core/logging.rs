//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// terrastream::core::logging::init();
/// log::info!("Streaming started");
/// ```
pub fn init() {
    init_with_default("info");
}

/// Initialize logging with a custom default filter such as `"terrastream=debug"`.
///
/// Later calls are ignored once a logger is installed.
pub fn init_with_default(filter: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .try_init();
}
