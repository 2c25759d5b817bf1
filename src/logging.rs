use std::sync::Once;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

static INIT: Once = Once::new();

/// Installs the global fmt subscriber. `RUST_LOG` wins over `fallback`,
/// which wins over `info`. Later calls are no-ops.
pub fn init(fallback: Option<&str>) {
    let filter = resolve_filter(std::env::var("RUST_LOG").ok().as_deref(), fallback);
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

fn resolve_filter(env: Option<&str>, fallback: Option<&str>) -> String {
    [env, fallback]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|filter| !filter.is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}
