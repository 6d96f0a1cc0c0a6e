use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. Safe to call once per process;
/// embedding nodes that bring their own subscriber can skip this.
pub fn init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("init tracing subscriber: {e}"))
}
