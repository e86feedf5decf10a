use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

const DEFAULT_LEVEL: &str = "debug";

/// Installs the global subscriber. Production logs are JSON.
pub fn init(config: &Config) -> anyhow::Result<()> {
    let filter =
        env_filter(config.log_level.as_deref()).add_directive("sqlx::query=warn".parse()?);

    let layer = if config.is_production() {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).compact().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;
    Ok(())
}

/// `LOG_LEVEL` first, then `RUST_LOG`, then [`DEFAULT_LEVEL`].
fn env_filter(log_level: Option<&str>) -> EnvFilter {
    log_level
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_directives_are_used_verbatim() {
        assert_eq!(env_filter(Some("warn")).to_string(), "warn");
        let filter = env_filter(Some("info,user_service=trace")).to_string();
        assert!(filter.contains("user_service=trace"));
        assert!(filter.contains("info"));
    }
}
