use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::console;
use crate::error::RelaunchError;

const USER_AGENT: &str = concat!("relaunch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub tag_name: String,
    pub assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// The one asset the launcher cares about, detached from the feed response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAsset {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub release_tag: String,
}

impl ResolvedAsset {
    /// What identifies the release this asset came from: its tag, or the
    /// asset's URL and size when the release is untagged.
    pub fn release_key(&self) -> String {
        if self.release_tag.is_empty() {
            format!("{}#{}", self.url, self.size)
        } else {
            self.release_tag.clone()
        }
    }
}

/// Shared HTTP client. No overall timeout: artifact downloads can be large,
/// so the feed request sets its own.
pub fn client() -> Result<Client, RelaunchError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(None)
        .build()
        .map_err(RelaunchError::from)
}

/// Fetch the latest release from the feed
pub fn fetch_latest_release(
    client: &Client,
    feed_url: &str,
    timeout: Duration,
) -> Result<Release, RelaunchError> {
    let response = client
        .get(feed_url)
        .header("Accept", "application/vnd.github+json")
        .timeout(timeout)
        .send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(RelaunchError::Network(format!(
            "feed returned {} for {}",
            status, feed_url
        )));
    }

    // decode failures map to RelaunchError::Parse
    Ok(response.json::<Release>()?)
}

/// Find the asset with exactly this name
pub fn find_asset<'a>(release: &'a Release, name: &str) -> Result<&'a Asset, RelaunchError> {
    release
        .assets
        .iter()
        .find(|a| a.name == name)
        .ok_or_else(|| RelaunchError::AssetNotFound(name.to_string()))
}

pub fn resolve(
    client: &Client,
    feed_url: &str,
    asset_name: &str,
    timeout: Duration,
) -> Result<ResolvedAsset, RelaunchError> {
    let release = fetch_latest_release(client, feed_url, timeout)?;
    let asset = find_asset(&release, asset_name)?;
    Ok(ResolvedAsset {
        name: asset.name.clone(),
        url: asset.browser_download_url.clone(),
        size: asset.size,
        release_tag: release.tag_name.clone(),
    })
}

/// Resolve the download URL of `asset_name` in the latest release.
///
/// Every failure is reported on the console and collapses to `None`; the
/// caller retries on its next scheduled run.
pub fn resolve_latest_asset(
    client: &Client,
    feed_url: &str,
    asset_name: &str,
    timeout: Duration,
) -> Option<ResolvedAsset> {
    match resolve(client, feed_url, asset_name, timeout) {
        Ok(asset) => Some(asset),
        Err(e @ RelaunchError::AssetNotFound(_)) => {
            console::info(e);
            None
        }
        Err(e) => {
            console::warn(format!("Release check failed: {}", e));
            None
        }
    }
}
