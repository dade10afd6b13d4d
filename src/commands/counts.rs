//! Count lifecycle: lazy rollover, clamped updates, append-only history.
//!
//! A count is open while `expiry > now` and frozen afterwards. Nothing here
//! runs on a timer; an expired count is noticed on the next read or write,
//! which then appends a fresh zero-valued row.
//!
//! Every read-decide-write runs inside one `IMMEDIATE` transaction, so two
//! writers sharing a database file cannot both roll over the same epoch. If
//! duplicate epochs exist anyway, the latest row by id is the current one.

use crate::commands::db;
use crate::error::{Error, Result};
use crate::models::count::Count;
use crate::schedule::next_boundary;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};

pub fn get_or_create_current(conn: &Connection, counter_id: i64) -> Result<Count> {
    get_or_create_current_at(conn, counter_id, Utc::now())
}

/// Current count as of `now`, appending a new epoch if the latest one has
/// expired or none exists yet.
pub fn get_or_create_current_at(
    conn: &Connection,
    counter_id: i64,
    now: DateTime<Utc>,
) -> Result<Count> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let count = current_count(&tx, counter_id, now)?;
    tx.commit()?;
    Ok(count)
}

pub fn apply_delta(conn: &Connection, counter_id: i64, delta: i64) -> Result<Count> {
    apply_delta_at(conn, counter_id, delta, Utc::now())
}

/// Add `delta` to the current count, clamping at zero.
///
/// The delta always lands on the epoch that is open at `now`; an expired
/// epoch is rolled over first and left untouched.
pub fn apply_delta_at(
    conn: &Connection,
    counter_id: i64,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<Count> {
    if delta == 0 {
        return Err(Error::InvalidDelta);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let mut count = current_count(&tx, counter_id, now)?;
    let value = count.value.saturating_add(delta).max(0);
    db::update_count_value(&tx, count.id, value)?;
    tx.commit()?;

    log::debug!(
        "counter {counter_id}: count {} {} {delta:+} -> {value}",
        count.id,
        count.value
    );
    count.value = value;
    Ok(count)
}

pub fn increment(conn: &Connection, counter_id: i64, by: i64) -> Result<Count> {
    apply_delta(conn, counter_id, by)
}

pub fn decrement(conn: &Connection, counter_id: i64, by: i64) -> Result<Count> {
    apply_delta(conn, counter_id, by.saturating_neg())
}

/// Every count of the counter, newest first. Unknown counters simply have no
/// history.
pub fn history(conn: &Connection, counter_id: i64) -> Result<Vec<Count>> {
    db::load_counts(conn, counter_id)
}

fn current_count(conn: &Connection, counter_id: i64, now: DateTime<Utc>) -> Result<Count> {
    let counter = db::load_counter(conn, counter_id)?.ok_or(Error::CounterNotFound(counter_id))?;

    if let Some(latest) = db::latest_count(conn, counter_id)? {
        if latest.is_open(now) {
            return Ok(latest);
        }
        log::info!(
            "counter {counter_id}: count {} expired at {} with value {}",
            latest.id,
            latest.expiry,
            latest.value
        );
    }

    let expiry = next_boundary(&counter.frequency, now, &counter.timezone)?;
    let count = db::insert_count(conn, counter_id, expiry, now)?;
    log::info!("counter {counter_id}: opened count {} until {expiry}", count.id);
    Ok(count)
}
