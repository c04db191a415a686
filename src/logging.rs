use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` wins; defaults to
/// info-level for the service and warn for dependencies.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,deskline_messaging=info"));
    fmt().with_env_filter(filter).init();
}
