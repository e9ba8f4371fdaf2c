use std::process::Child;

/// Ask the child to shut down on its own.
#[cfg(unix)]
pub fn request_stop(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(child.id() as i32);
    if kill(pid, Signal::SIGTERM).is_err() {
        let _ = child.kill();
    }
}

/// No polite stop signal outside Unix; go straight to a kill.
#[cfg(not(unix))]
pub fn request_stop(child: &mut Child) {
    let _ = child.kill();
}
