//! Console logging setup.
//!
//! `console_verbosity` accepts the classic level names (CRITICAL, ERROR,
//! WARNING, INFO, DEBUG) and sets the level for this crate; `RUST_LOG` still
//! controls everything else.

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Maps a verbosity name to a tracing level.
pub fn level_for(verbosity: &str) -> Result<LevelFilter> {
    let level = match verbosity.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" | "ERROR" => LevelFilter::ERROR,
        "WARNING" | "WARN" => LevelFilter::WARN,
        "INFO" => LevelFilter::INFO,
        "DEBUG" => LevelFilter::DEBUG,
        "TRACE" => LevelFilter::TRACE,
        "OFF" => LevelFilter::OFF,
        other => anyhow::bail!("Unknown console verbosity: {other}"),
    };
    Ok(level)
}

pub fn init(verbosity: &str) -> Result<()> {
    let level = level_for(verbosity)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("fureon={level}").parse()?),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_classic_level_names() {
        assert_eq!(level_for("CRITICAL").unwrap(), LevelFilter::ERROR);
        assert_eq!(level_for("warning").unwrap(), LevelFilter::WARN);
        assert_eq!(level_for(" Info ").unwrap(), LevelFilter::INFO);
        assert_eq!(level_for("DEBUG").unwrap(), LevelFilter::DEBUG);
        assert!(level_for("chatty").is_err());
    }
}
