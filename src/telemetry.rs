use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber writing to stderr. `RUST_LOG` takes precedence over
/// `default_filter` when set. Returns false if a global subscriber was already in place.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
