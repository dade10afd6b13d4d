use super::frequency::{Frequency, Unit};
use crate::error::{Error, Result};
use chrono::{
    DateTime, Days, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

/// Timezone used when a counter is created without one.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Days from 1970-01-01 (Thursday) to the first Monday, 1970-01-05.
/// Weekly boundaries are Monday local midnights on this lattice.
const WEEK_ANCHOR_OFFSET_DAYS: i64 = 4;

/// Upper bound for probing past a DST gap (largest real gap is a skipped day).
const GAP_PROBE_LIMIT: usize = 48 * 4;

pub fn resolve_timezone(timezone: &str) -> Result<Tz> {
    timezone
        .parse::<Tz>()
        .map_err(|_| Error::InvalidTimezone(timezone.to_string()))
}

/// Next calendar-aligned boundary strictly after `now` for `spec` in
/// `timezone`, returned as a UTC instant.
pub fn next_boundary(spec: &str, now: DateTime<Utc>, timezone: &str) -> Result<DateTime<Utc>> {
    let frequency = Frequency::parse(spec)?;
    let tz = resolve_timezone(timezone)?;
    frequency.next_boundary(now, tz)
}

impl Frequency {
    pub fn next_boundary(&self, now: DateTime<Utc>, tz: Tz) -> Result<DateTime<Utc>> {
        let out_of_range = || Error::BoundaryOutOfRange(self.to_string());
        let local = now.with_timezone(&tz);
        let mut boundary = self
            .boundary_after(local.naive_local(), &tz, now)
            .ok_or_else(out_of_range)?;

        // A fold between `now` and the boundary repeats wall-clock time. Lattice
        // points on the far side only show up when `now` is read under the
        // offset in effect after the fold.
        let later_offset = boundary.with_timezone(&tz).offset().fix();
        if later_offset != local.offset().fix() {
            let shifted = now
                .naive_utc()
                .checked_add_signed(TimeDelta::seconds(i64::from(later_offset.local_minus_utc())));
            if let Some(candidate) = shifted.and_then(|wall| self.boundary_after(wall, &tz, now)) {
                if candidate > now && candidate < boundary {
                    boundary = candidate;
                }
            }
        }

        log::debug!("next boundary for {self} in {tz} after {now}: {boundary}");
        Ok(boundary)
    }

    fn boundary_after(
        &self,
        wall_clock: NaiveDateTime,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let target = self.next_lattice_point(wall_clock)?;
        resolve_local(tz, target, now)
    }

    /// First wall-clock lattice point strictly after `wall_clock`.
    fn next_lattice_point(&self, wall_clock: NaiveDateTime) -> Option<NaiveDateTime> {
        let today = wall_clock.date();
        let n = i64::from(self.multiplier);

        match self.unit {
            Unit::Hour => {
                let hour = i64::from(wall_clock.hour());
                let next = (hour / n + 1) * n;
                if next >= 24 {
                    today.succ_opt().and_then(|d| d.and_hms_opt(0, 0, 0))
                } else {
                    today.and_hms_opt(u32::try_from(next).ok()?, 0, 0)
                }
            }
            Unit::Day => {
                let index = days_since_epoch(today).div_euclid(n) + 1;
                index
                    .checked_mul(n)
                    .and_then(epoch_plus_days)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }
            Unit::Week => {
                let weeks = (days_since_epoch(today) - WEEK_ANCHOR_OFFSET_DAYS).div_euclid(7);
                let index = weeks.div_euclid(n) + 1;
                index
                    .checked_mul(n)
                    .and_then(|w| w.checked_mul(7))
                    .and_then(|d| d.checked_add(WEEK_ANCHOR_OFFSET_DAYS))
                    .and_then(epoch_plus_days)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }
        }
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn days_since_epoch(date: NaiveDate) -> i64 {
    date.signed_duration_since(epoch()).num_days()
}

fn epoch_plus_days(days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        epoch().checked_add_days(Days::new(days as u64))
    } else {
        epoch().checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

/// Map a local wall-clock boundary to UTC.
///
/// A wall-clock time inside a DST gap moves forward to the first valid local
/// instant; an ambiguous one takes its earliest occurrence after `now`.
fn resolve_local(tz: &Tz, wall_clock: NaiveDateTime, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let step = TimeDelta::minutes(15);
    let mut candidate = wall_clock;

    for _ in 0..=GAP_PROBE_LIMIT {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(t) => return Some(t.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, latest) => {
                let earliest = earliest.with_timezone(&Utc);
                return Some(if earliest > now {
                    earliest
                } else {
                    latest.with_timezone(&Utc)
                });
            }
            LocalResult::None => candidate = candidate.checked_add_signed(step)?,
        }
    }

    None
}
