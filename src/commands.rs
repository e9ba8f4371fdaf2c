use colored::Colorize;
use std::io::{self, BufRead};
use std::process;
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::console;
use crate::state::{self, SharedState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Close,
    Help,
}

impl OperatorCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "close" => Some(Self::Close),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// Read operator commands until `close` or end of input.
///
/// Returns `true` when `close` was received, after `on_close` has run.
/// Unknown lines are ignored.
pub fn listen<R: BufRead>(input: R, on_close: impl FnOnce()) -> bool {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                console::warn(format!("Stopped reading commands: {}", e));
                return false;
            }
        };

        match OperatorCommand::parse(&line) {
            Some(OperatorCommand::Close) => {
                on_close();
                return true;
            }
            Some(OperatorCommand::Help) => {
                println!("  {}  stop the process and exit", "close".bold());
            }
            None => {}
        }
    }
    false
}

/// Listen on stdin in the background. `close` cleans up and exits with
/// status 0 without waiting for a running cycle.
pub fn spawn_listener(state: SharedState, config: Config) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("command-listener".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let closed = listen(stdin.lock(), || {
                console::info("Closing the application...");
                state::cleanup(&state, &config);
                process::exit(0);
            });
            if !closed {
                console::info("Console input closed; type-in commands are unavailable");
            }
        })
}
