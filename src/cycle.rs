//! One check-download-swap-restart pass.
//!
//! The canonical path holds the build that is (or should be) running. A new
//! build is downloaded next to it at the staging path, the running child is
//! stopped, and the staging file is renamed over the canonical one. A failed
//! rename leaves the previous build in place and it is started again.

use reqwest::blocking::Client;
use std::fmt;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::console;
use crate::error::RelaunchError;
use crate::feed::{self, version, ResolvedAsset};
use crate::state::{lock, SharedState};
use crate::supervisor::{self, LineSink};

const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    NoArtifact,
    ArtifactPresent,
}

impl ArtifactState {
    pub fn of(path: &Path) -> Self {
        if path.exists() {
            Self::ArtifactPresent
        } else {
            Self::NoArtifact
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First build downloaded and started
    Installed { tag: String },
    /// Newer build swapped in and started
    Updated { tag: String },
    UpToDate,
    /// Same build, started again after the child had exited
    Restarted,
    NoRelease,
    DownloadFailed,
    /// Staging could not replace the canonical file; the previous build runs
    SwapFailed,
    ShuttingDown,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed { tag } => write!(f, "installed {}", display_tag(tag)),
            Self::Updated { tag } => write!(f, "updated to {}", display_tag(tag)),
            Self::UpToDate => write!(f, "already up to date"),
            Self::Restarted => write!(f, "restarted the current build"),
            Self::NoRelease => write!(f, "no release available"),
            Self::DownloadFailed => write!(f, "download failed"),
            Self::SwapFailed => write!(f, "update could not be applied"),
            Self::ShuttingDown => write!(f, "shutting down"),
        }
    }
}

fn display_tag(tag: &str) -> &str {
    if tag.is_empty() {
        "untagged release"
    } else {
        tag
    }
}

pub struct UpdateCycle {
    config: Config,
    client: Client,
    state: SharedState,
    sink: LineSink,
}

impl UpdateCycle {
    pub fn new(config: Config, state: SharedState) -> Result<Self, RelaunchError> {
        Ok(Self {
            config,
            client: feed::client()?,
            state,
            sink: supervisor::console_sink(),
        })
    }

    /// Send child output somewhere other than the console.
    pub fn with_sink(mut self, sink: LineSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Run one cycle.
    ///
    /// Network and filesystem problems are reported and turned into an
    /// outcome; only a failure to start the artifact comes back as an error.
    pub fn run(&self) -> Result<CycleOutcome, RelaunchError> {
        if lock(&self.state).shutting_down {
            return Ok(CycleOutcome::ShuttingDown);
        }

        let canonical = &self.config.artifact_path;
        match ArtifactState::of(canonical) {
            ArtifactState::NoArtifact => {
                console::info(format!(
                    "{} doesn't exist, downloading the latest release...",
                    canonical.display()
                ));
                match self.resolve() {
                    Some(asset) => self.install(asset),
                    None => Ok(CycleOutcome::NoRelease),
                }
            }
            ArtifactState::ArtifactPresent => {
                console::info(format!(
                    "{} exists, checking for updates...",
                    canonical.display()
                ));
                match self.resolve() {
                    Some(asset) => self.update(asset),
                    None => Ok(CycleOutcome::NoRelease),
                }
            }
        }
    }

    fn resolve(&self) -> Option<ResolvedAsset> {
        feed::resolve_latest_asset(
            &self.client,
            &self.config.feed_url,
            &self.config.asset_name,
            self.config.request_timeout(),
        )
    }

    fn fetch(&self, asset: &ResolvedAsset, dest: &Path) -> bool {
        console::info(format!("Downloading from: {}", asset.url));
        match feed::download(&self.client, &asset.url, dest) {
            Ok(bytes) => {
                console::success(format!("{} downloaded ({} bytes)", dest.display(), bytes));
                true
            }
            Err(e) => {
                console::error(format!("Failed to download {}: {}", asset.name, e));
                false
            }
        }
    }

    fn install(&self, asset: ResolvedAsset) -> Result<CycleOutcome, RelaunchError> {
        let canonical = &self.config.artifact_path;
        if !self.fetch(&asset, canonical) {
            return Ok(CycleOutcome::DownloadFailed);
        }
        mark_executable(canonical);

        if !self.start_current(Some(asset.release_key()))? {
            return Ok(CycleOutcome::ShuttingDown);
        }
        Ok(CycleOutcome::Installed {
            tag: asset.release_tag,
        })
    }

    fn update(&self, asset: ResolvedAsset) -> Result<CycleOutcome, RelaunchError> {
        let release = asset.release_key();
        let (is_newer, running) = {
            let mut state = lock(&self.state);
            let is_newer = version::is_newer(&release, state.installed_release.as_deref());
            let running = state.current.as_mut().is_some_and(|p| p.is_running());
            (is_newer, running)
        };

        if !is_newer {
            if running {
                console::success(format!(
                    "Already running the latest release ({})",
                    display_tag(&asset.release_tag)
                ));
                return Ok(CycleOutcome::UpToDate);
            }
            console::warn("Supervised process is not running, starting it again");
            if !self.start_current(None)? {
                return Ok(CycleOutcome::ShuttingDown);
            }
            return Ok(CycleOutcome::Restarted);
        }

        let staging = &self.config.staging_path;
        if !self.fetch(&asset, staging) {
            return Ok(CycleOutcome::DownloadFailed);
        }

        // the old build must be gone before its file is replaced
        self.stop_current();
        if lock(&self.state).shutting_down {
            return Ok(CycleOutcome::ShuttingDown);
        }

        let canonical = &self.config.artifact_path;
        if let Err(e) = fs::rename(staging, canonical) {
            let err = RelaunchError::fs("replace", canonical, e);
            console::error(format!("Error while swapping in the new build: {}", err));
            if let Err(e) = fs::remove_file(staging) {
                console::warn(format!("Failed to delete {}: {}", staging.display(), e));
            }
            console::info(format!("Keeping the previous {}", canonical.display()));
            if !self.start_current(None)? {
                return Ok(CycleOutcome::ShuttingDown);
            }
            return Ok(CycleOutcome::SwapFailed);
        }
        console::success(format!(
            "{} renamed to {}",
            staging.display(),
            canonical.display()
        ));
        mark_executable(canonical);

        if !self.start_current(Some(release))? {
            return Ok(CycleOutcome::ShuttingDown);
        }
        Ok(CycleOutcome::Updated {
            tag: asset.release_tag,
        })
    }

    /// Stop the running child, leaving its handle in the shared state until
    /// it has exited so that a concurrent cleanup can still reach it.
    fn stop_current(&self) {
        let grace = self.config.shutdown_grace();
        let pid = {
            let mut state = lock(&self.state);
            let Some(process) = state.current.as_mut() else {
                return;
            };
            process.request_stop();
            process.id()
        };

        let deadline = Instant::now() + grace;
        loop {
            {
                let mut state = lock(&self.state);
                let Some(process) = state.current.as_mut() else {
                    // cleanup took it over
                    return;
                };
                if process.id() != pid {
                    return;
                }
                if let Some(status) = process.exit_status() {
                    state.current = None;
                    console::info(format!("Stopped process {} ({})", pid, status));
                    return;
                }
                if Instant::now() >= deadline {
                    supervisor::warn_killing(pid, grace);
                    match process.kill() {
                        Some(status) => console::info(format!("Stopped process {} ({})", pid, status)),
                        None => console::warn(format!("Could not confirm process {} exited", pid)),
                    }
                    state.current = None;
                    return;
                }
            }
            thread::sleep(STOP_POLL);
        }
    }

    /// Replace whatever is running with a fresh child of the canonical file.
    ///
    /// `release` is recorded as the installed release when given; `None`
    /// keeps the current record. Returns `false` when shutdown started
    /// meanwhile, in which case nothing is spawned.
    fn start_current(&self, release: Option<String>) -> Result<bool, RelaunchError> {
        self.stop_current();

        let mut state = lock(&self.state);
        if state.shutting_down {
            return Ok(false);
        }

        // spawn and store under one lock
        let process = supervisor::start_with_sink(
            &self.config.artifact_path,
            &self.config.launcher,
            self.sink.clone(),
        )?;
        console::success(format!(
            "Started {} (pid {})",
            process.artifact().display(),
            process.id()
        ));
        let replaced = state.current.replace(process);
        if release.is_some() {
            state.installed_release = release;
        }
        drop(state);

        if let Some(replaced) = replaced {
            // another start slipped in between stop and store
            replaced.terminate(self.config.shutdown_grace());
        }
        Ok(true)
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let result = fs::metadata(path).and_then(|meta| {
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(path, perms)
    });
    if let Err(e) = result {
        console::warn(format!("Could not mark {} executable: {}", path.display(), e));
    }
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_artifact_state_follows_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.jar");
        assert_eq!(ArtifactState::of(&path), ArtifactState::NoArtifact);
        fs::write(&path, "x").unwrap();
        assert_eq!(ArtifactState::of(&path), ArtifactState::ArtifactPresent);
    }

    #[test]
    fn test_outcome_display() {
        let outcome = CycleOutcome::Updated {
            tag: "v2.0.0".to_string(),
        };
        assert_eq!(outcome.to_string(), "updated to v2.0.0");
        let outcome = CycleOutcome::Installed { tag: String::new() };
        assert_eq!(outcome.to_string(), "installed untagged release");
    }

    #[test]
    fn test_no_cycle_after_shutdown() {
        let dir = tempdir().unwrap();
        let config = Config {
            artifact_path: dir.path().join("1.jar"),
            staging_path: dir.path().join("2.jar"),
            feed_url: "http://127.0.0.1:9/unused".to_string(),
            ..Config::default()
        };
        let state = crate::state::shared();
        lock(&state).shutting_down = true;

        let cycle = UpdateCycle::new(config, state).unwrap();
        assert_eq!(cycle.run().unwrap(), CycleOutcome::ShuttingDown);
        assert!(!dir.path().join("1.jar").exists());
    }
}
