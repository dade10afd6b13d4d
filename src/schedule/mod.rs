//! Calendar-aligned reset schedule.
//!
//! Pure functions only: every computation takes `now` explicitly and never
//! reads the clock, so boundaries can be replayed for any date.

pub mod boundary;
pub mod frequency;

pub use boundary::{next_boundary, resolve_timezone, DEFAULT_TIMEZONE};
pub use frequency::{Frequency, Unit, DEFAULT_FREQUENCY};
