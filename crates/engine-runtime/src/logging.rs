use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_directive`.
///
/// Fails if a global subscriber is already set.
pub fn init(default_directive: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive))?;

    fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false)
        .try_init()
}
