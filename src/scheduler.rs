use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::console;
use crate::cycle::{CycleOutcome, UpdateCycle};
use crate::state::{self, lock};

const SUPERVISE_POLL: Duration = Duration::from_millis(500);

pub struct Scheduler {
    cycle: UpdateCycle,
    interval: Duration,
}

impl Scheduler {
    pub fn new(cycle: UpdateCycle) -> Self {
        let interval = cycle.config().poll_interval();
        Self { cycle, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one cycle and report how it went.
    pub fn tick(&self) -> Option<CycleOutcome> {
        match self.cycle.run() {
            Ok(outcome) => {
                console::info(format!("Check finished: {}", outcome));
                Some(outcome)
            }
            Err(e) => {
                console::error(e);
                None
            }
        }
    }

    /// Cycle until `stop` receives a message or its sender goes away, then
    /// clean up. Returns the number of cycles run.
    pub fn run(&self, stop: &Receiver<()>) -> usize {
        let mut cycles = 0;
        loop {
            let outcome = self.tick();
            cycles += 1;
            if outcome == Some(CycleOutcome::ShuttingDown) {
                break;
            }

            console::info(format!("Next check in {}", format_interval(self.interval)));
            match stop.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    console::info("Scheduler interrupted");
                    break;
                }
            }
        }

        state::cleanup(self.cycle.state(), self.cycle.config());
        cycles
    }

    /// Run a single cycle, then wait for the child to exit or `stop`.
    pub fn run_once(&self, stop: &Receiver<()>) -> Option<CycleOutcome> {
        let outcome = self.tick();

        loop {
            let exited = {
                let mut guard = lock(self.cycle.state());
                let Some(process) = guard.current.as_mut() else {
                    break;
                };
                process.exit_status()
            };
            if let Some(status) = exited {
                console::info(format!("Supervised process exited ({})", status));
                break;
            }
            match stop.recv_timeout(SUPERVISE_POLL) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        state::cleanup(self.cycle.state(), self.cycle.config());
        outcome
    }
}

pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, 0) => format!("{}m", m),
        (0, m, s) => format!("{}m {}s", m, s),
        (h, 0, _) => format!("{}h", h),
        (h, m, _) => format!("{}h {}m", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_secs(21_600)), "6h");
        assert_eq!(format_interval(Duration::from_secs(5_400)), "1h 30m");
        assert_eq!(format_interval(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_interval(Duration::from_secs(120)), "2m");
        assert_eq!(format_interval(Duration::from_secs(7)), "7s");
    }
}
