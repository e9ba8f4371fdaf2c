//! Running the artifact as a child process.
//!
//! The module keeps no state of its own: whoever holds the
//! [`SupervisedProcess`] owns the child. Dropping a handle whose child is
//! still alive kills it, so a lost handle never leaves an orphan behind.

pub mod output;
mod signal;

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::console;
use crate::error::RelaunchError;

pub use output::{console_sink, LineSink};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct SupervisedProcess {
    child: Child,
    artifact: PathBuf,
}

/// Start `artifact`, relaying its output to the console.
pub fn start(artifact: &Path, launcher: &[String]) -> Result<SupervisedProcess, RelaunchError> {
    start_with_sink(artifact, launcher, console_sink())
}

/// Start `artifact` through the optional `launcher` prefix.
///
/// The child gets no stdin. Its stdout and stderr are both drained into
/// `sink`, one thread per stream.
pub fn start_with_sink(
    artifact: &Path,
    launcher: &[String],
    sink: LineSink,
) -> Result<SupervisedProcess, RelaunchError> {
    if !artifact.exists() {
        return Err(RelaunchError::ProcessSpawn {
            path: artifact.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "artifact not found"),
        });
    }

    let (mut command, program) = build_command(artifact, launcher);
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RelaunchError::ProcessSpawn {
            path: program,
            source,
        })?;

    if let Some(stdout) = child.stdout.take() {
        output::spawn_relay("child-stdout", stdout, sink.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        output::spawn_relay("child-stderr", stderr, sink);
    }

    Ok(SupervisedProcess {
        child,
        artifact: artifact.to_path_buf(),
    })
}

fn build_command(artifact: &Path, launcher: &[String]) -> (Command, PathBuf) {
    // A bare relative name would be looked up on PATH
    let artifact = if artifact.is_relative() && artifact.parent() == Some(Path::new("")) {
        Path::new(".").join(artifact)
    } else {
        artifact.to_path_buf()
    };

    match launcher.split_first() {
        Some((program, args)) => {
            let mut command = Command::new(program);
            command.args(args).arg(&artifact);
            (command, PathBuf::from(program))
        }
        None => (Command::new(&artifact), artifact),
    }
}

impl SupervisedProcess {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Exit status if the child has already finished.
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Send the polite stop request without waiting for it to take effect.
    pub fn request_stop(&mut self) {
        if self.is_running() {
            signal::request_stop(&mut self.child);
        }
    }

    /// Kill the child outright and reap it.
    pub fn kill(&mut self) -> Option<ExitStatus> {
        if let Some(status) = self.exit_status() {
            return Some(status);
        }
        let _ = self.child.kill();
        self.child.wait().ok()
    }

    /// Stop the child and reap it.
    ///
    /// Asks politely first, waits up to `grace`, then kills. Returns the exit
    /// status when one could be collected.
    pub fn terminate(mut self, grace: Duration) -> Option<ExitStatus> {
        if let Some(status) = self.exit_status() {
            return Some(status);
        }

        self.request_stop();

        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Ok(None) => break,
                Err(e) => {
                    console::warn(format!("Could not poll process {}: {}", self.id(), e));
                    break;
                }
            }
        }

        warn_killing(self.id(), grace);
        self.kill()
    }
}

pub fn warn_killing(pid: u32, grace: Duration) {
    console::warn(format!(
        "Process {} did not stop within {}s, killing it",
        pid,
        grace.as_secs()
    ));
}

impl Drop for SupervisedProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn capture() -> (LineSink, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink: LineSink = Arc::new(move |line: &str| captured.lock().unwrap().push(line.to_string()));
        (sink, seen)
    }

    fn wait_for_lines(seen: &Arc<Mutex<Vec<String>>>, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let lines = seen.lock().unwrap().clone();
            if lines.len() >= count {
                return lines;
            }
            thread::sleep(Duration::from_millis(20));
        }
        seen.lock().unwrap().clone()
    }

    #[test]
    fn test_relays_stdout_and_stderr() {
        let dir = tempdir().unwrap();
        let app = script(dir.path(), "app", "echo out\necho err 1>&2");
        let (sink, seen) = capture();

        let _process = start_with_sink(&app, &[], sink).unwrap();

        let mut lines = wait_for_lines(&seen, 2);
        lines.sort();
        assert_eq!(lines, vec!["err", "out"]);
    }

    #[test]
    fn test_launcher_prefix_receives_artifact() {
        let dir = tempdir().unwrap();
        let app = dir.path().join("app.jar");
        fs::write(&app, "").unwrap();
        let (sink, seen) = capture();
        let launcher = vec!["/bin/echo".to_string(), "-n".to_string()];

        let _process = start_with_sink(&app, &launcher, sink).unwrap();

        let lines = wait_for_lines(&seen, 1);
        assert_eq!(lines, vec![app.display().to_string()]);
    }

    #[test]
    fn test_missing_artifact_is_spawn_error() {
        let dir = tempdir().unwrap();
        let err = start(&dir.path().join("absent"), &[]).unwrap_err();
        assert!(matches!(err, RelaunchError::ProcessSpawn { .. }));
    }

    #[test]
    fn test_missing_launcher_is_spawn_error() {
        let dir = tempdir().unwrap();
        let app = dir.path().join("app.jar");
        fs::write(&app, "").unwrap();
        let launcher = vec!["/nonexistent/launcher".to_string()];
        let err = start(&app, &launcher).unwrap_err();
        assert!(matches!(err, RelaunchError::ProcessSpawn { .. }));
    }

    #[test]
    fn test_terminate_stops_cooperative_child() {
        let dir = tempdir().unwrap();
        let app = script(dir.path(), "app", "exec sleep 30");
        let mut process = start_with_sink(&app, &[], capture().0).unwrap();
        assert!(process.is_running());

        let started = Instant::now();
        let status = process.terminate(Duration::from_secs(5)).unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_terminate_escalates_after_grace() {
        let dir = tempdir().unwrap();
        let app = script(dir.path(), "app", "trap '' TERM\nwhile true; do sleep 1; done");
        let process = start_with_sink(&app, &[], capture().0).unwrap();
        // let the shell install its trap
        thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        let status = process.terminate(Duration::from_millis(300));
        assert!(status.is_some());
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_terminate_after_exit_returns_status() {
        let dir = tempdir().unwrap();
        let app = script(dir.path(), "app", "exit 3");
        let mut process = start_with_sink(&app, &[], capture().0).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while process.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        let status = process.terminate(Duration::from_secs(1)).unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
