use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_FEED_URL: &str =
    "https://api.github.com/repos/MCXboxBroadcast/Broadcaster/releases/latest";
pub const DEFAULT_ASSET_NAME: &str = "MCXboxBroadcastStandalone.jar";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Endpoint returning the latest release as JSON
    pub feed_url: String,

    /// Exact (case-sensitive) name of the release asset to track
    pub asset_name: String,

    /// Where the live artifact is kept
    pub artifact_path: PathBuf,

    /// Download target for a candidate build before it is swapped in
    pub staging_path: PathBuf,

    pub poll_interval_secs: u64,

    /// Command prefix used to run the artifact, e.g. ["java", "-jar"].
    /// Empty runs the artifact itself.
    pub launcher: Vec<String>,

    /// How long a stopping child gets before it is killed
    pub shutdown_grace_secs: u64,

    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            asset_name: DEFAULT_ASSET_NAME.to_string(),
            artifact_path: PathBuf::from("1.jar"),
            staging_path: PathBuf::from("2.jar"),
            poll_interval_secs: 6 * 60 * 60,
            launcher: vec!["java".to_string(), "-jar".to_string()],
            shutdown_grace_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load from an explicit path, or from the default location if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = Self::config_path();
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config {}", config_path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relaunch")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed_url.trim().is_empty() {
            bail!("feed_url must not be empty");
        }
        if self.asset_name.trim().is_empty() {
            bail!("asset_name must not be empty");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        if self.artifact_path == self.staging_path {
            bail!(
                "artifact_path and staging_path must differ (both are {})",
                self.artifact_path.display()
            );
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
