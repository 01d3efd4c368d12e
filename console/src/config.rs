use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the certificate service API.
    pub api_url: String,

    /// Seconds between background re-fetches of the certificate collection.
    pub poll_interval_secs: u64,

    /// Seconds to wait after a triggered re-check before re-fetching. The
    /// service performs checks asynchronously with no completion callback,
    /// so this is a best-effort heuristic, not a guarantee.
    pub refresh_refetch_delay_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            api_url: "http://localhost:5000/api".into(),
            poll_interval_secs: 300,
            refresh_refetch_delay_secs: 2,
        }
    }
}

impl ConsoleConfig {
    pub fn from_file(path: PathBuf) -> anyhow::Result<Self> {
        let config_str = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config = toml::from_str(&config_str).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e)
        })?;
        Ok(config)
    }

    /// A missing file falls back to defaults so the console works with no
    /// setup; a file that exists but does not parse is still an error.
    pub fn load(path: PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}
