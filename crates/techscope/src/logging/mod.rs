use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `RUST_LOG` wins over the CLI level when it is set.
pub fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }

    let directives = [level.to_string(), "rusqlite=warn".to_string()].join(",");
    EnvFilter::try_new(&directives)
        .map_err(|error| anyhow!("invalid tracing filter `{directives}`: {error}"))
}

/// Installs a compact stderr subscriber. stdout stays reserved for command
/// output.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = build_env_filter(level)?;
    let console = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .try_init()
        .context("failed to install tracing subscriber")
}
