//! Named counters whose values reset on calendar-aligned boundaries.
//!
//! Each counter owns a chain of counts. Exactly one count is open at a time;
//! once its boundary passes it is frozen and the next read or write opens a
//! fresh one. Boundaries are computed in the counter's own timezone.

pub mod cli;
pub mod commands;
pub mod error;
pub mod models;
pub mod schedule;

pub use error::{Error, Result};

pub fn run() -> std::process::ExitCode {
    cli::run()
}
