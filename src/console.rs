//! Console status lines.
//!
//! Everything the launcher says goes through here so that messages carry a
//! timestamp and a marker, and so they stay distinguishable from the relayed
//! child output.

use chrono::Local;
use colored::Colorize;
use std::fmt::Display;

fn stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

pub fn info(msg: impl Display) {
    println!("{} {} {}", stamp().dimmed(), "→".cyan(), msg);
}

pub fn success(msg: impl Display) {
    println!("{} {} {}", stamp().dimmed(), "✓".green(), msg);
}

pub fn warn(msg: impl Display) {
    eprintln!("{} {} {}", stamp().dimmed(), "⚠".yellow(), msg);
}

pub fn error(msg: impl Display) {
    eprintln!("{} {} {}", stamp().dimmed(), "✗".red(), msg);
}

/// Print one line of child output untouched.
pub fn relay(line: &str) {
    println!("{}", line);
}

/// Disable colour for the rest of the process.
pub fn disable_color() {
    colored::control::set_override(false);
}
