pub mod commands;
pub mod config;
pub mod console;
pub mod cycle;
pub mod error;
pub mod feed;
pub mod scheduler;
pub mod state;
pub mod supervisor;

pub use config::Config;
pub use cycle::{CycleOutcome, UpdateCycle};
pub use error::RelaunchError;
pub use scheduler::Scheduler;
