//! Error type shared by the schedule calculator, the store and the commands.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Frequency specifier does not match `<digits><h|d|w>`.
    #[error("invalid frequency format: {0:?} (expected format: Nh, Nd, or Nw)")]
    InvalidFormat(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The computed boundary does not fit in chrono's date range.
    #[error("next boundary for frequency {0:?} is out of range")]
    BoundaryOutOfRange(String),

    #[error("counter {0} not found")]
    CounterNotFound(i64),

    #[error("no counter named {0:?}")]
    UnknownCounterName(String),

    #[error("delta must be non-zero")]
    InvalidDelta,

    #[error("counter name already exists: {0}")]
    DuplicateName(String),

    #[error("counter name must not be empty")]
    EmptyName,

    /// Any failure reported by SQLite, passed through untouched.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
