//! Probe configuration from the environment.
use std::env;
use std::path::PathBuf;

use stats_core::RoundingMode;
use tracing::warn;

/// Settings for a probe run.
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// Directory holding `modifiers.ron` and optionally `config.toml`.
    pub data_dir: PathBuf,
    /// Rounding override; falls back to the data directory's config.
    pub rounding: Option<RoundingMode>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            rounding: None,
        }
    }
}

impl ProbeConfig {
    /// Construct probe configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STATS_DATA_DIR` - Content directory (default: `data`)
    /// - `STATS_ROUNDING` - `floor`, `ceil`, `round` or `truncate` (default: from config.toml)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var("STATS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config.rounding = read_env::<RoundingMode>("STATS_ROUNDING");

        config
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    parse_env_value(key, &env::var(key).ok()?)
}

fn parse_env_value<T>(key: &str, raw: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = raw, "ignoring unparsable environment variable");
            None
        }
    }
}
