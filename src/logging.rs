//! Tracing subscriber bootstrap for hosts and tests.
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVE: &str = "vtl_core=info";

/// Installs a fmt subscriber filtered by `filter`, falling back to `RUST_LOG`
/// and then to [`DEFAULT_DIRECTIVE`].
///
/// Returns `false` when a global subscriber was already installed; the call
/// is then a no-op.
pub fn init(filter: Option<&str>) -> bool {
    let filter = match filter {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
