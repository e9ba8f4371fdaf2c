use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::Config;
use crate::console;
use crate::feed::download::part_path;
use crate::supervisor::SupervisedProcess;

/// What the scheduler, the command listener and the Ctrl-C handler share.
#[derive(Debug, Default)]
pub struct CycleState {
    pub current: Option<SupervisedProcess>,
    /// Release key of the build started in this session
    pub installed_release: Option<String>,
    /// Set once cleanup begins; a cycle that finishes afterwards must not
    /// leave a child behind.
    pub shutting_down: bool,
}

pub type SharedState = Arc<Mutex<CycleState>>;

pub fn shared() -> SharedState {
    Arc::new(Mutex::new(CycleState::default()))
}

/// Lock the state, carrying on if another thread panicked while holding it.
pub fn lock(state: &SharedState) -> MutexGuard<'_, CycleState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stop the supervised process and remove leftover downloads.
///
/// Safe to call more than once and from any thread. Failures are reported,
/// never returned: this runs on the way out.
pub fn cleanup(state: &SharedState, config: &Config) {
    let current = {
        let mut guard = lock(state);
        guard.shutting_down = true;
        guard.current.take()
    };

    if let Some(process) = current {
        let pid = process.id();
        match process.terminate(config.shutdown_grace()) {
            Some(status) => console::success(format!(
                "Terminated the running process (pid {}, {})",
                pid, status
            )),
            None => console::warn(format!("Could not confirm process {} exited", pid)),
        }
    }

    for leftover in [
        config.staging_path.clone(),
        part_path(&config.staging_path),
        part_path(&config.artifact_path),
    ] {
        match remove_if_exists(&leftover) {
            Ok(true) => console::info(format!("{} deleted", leftover.display())),
            Ok(false) => {}
            Err(e) => console::warn(format!("Failed to delete {}: {}", leftover.display(), e)),
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
