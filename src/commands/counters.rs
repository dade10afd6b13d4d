use crate::commands::db;
use crate::error::{Error, Result};
use crate::models::counter::Counter;
use crate::schedule::{resolve_timezone, Frequency, DEFAULT_FREQUENCY, DEFAULT_TIMEZONE};
use chrono::Utc;
use rusqlite::Connection;

/// Create a counter. Missing frequency/timezone fall back to "1d"/"UTC".
///
/// Both are validated up front so a stored counter can always compute its
/// next boundary.
pub fn create_counter(
    conn: &Connection,
    name: &str,
    frequency: Option<&str>,
    timezone: Option<&str>,
) -> Result<Counter> {
    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    let frequency = frequency.filter(|f| !f.is_empty()).unwrap_or(DEFAULT_FREQUENCY);
    let timezone = timezone.filter(|tz| !tz.is_empty()).unwrap_or(DEFAULT_TIMEZONE);
    Frequency::parse(frequency)?;
    resolve_timezone(timezone)?;

    let counter = db::insert_counter(conn, name, frequency, timezone, Utc::now())?;
    log::info!(
        "created counter {} ({:?}, every {} in {})",
        counter.id,
        counter.name,
        counter.frequency,
        counter.timezone
    );
    Ok(counter)
}

pub fn get_counter(conn: &Connection, id: i64) -> Result<Counter> {
    db::load_counter(conn, id)?.ok_or(Error::CounterNotFound(id))
}

pub fn find_counter_by_name(conn: &Connection, name: &str) -> Result<Option<Counter>> {
    db::load_counter_by_name(conn, name)
}

pub fn list_counters(conn: &Connection) -> Result<Vec<Counter>> {
    db::load_counters(conn)
}

/// Change how often a counter resets. The open count keeps its expiry; the
/// new frequency applies from the next rollover.
pub fn update_frequency(conn: &Connection, id: i64, frequency: &str) -> Result<Counter> {
    Frequency::parse(frequency)?;
    if !db::update_counter_frequency(conn, id, frequency)? {
        return Err(Error::CounterNotFound(id));
    }
    log::info!("counter {id} now resets every {frequency}");
    get_counter(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Connection {
        db::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn defaults_frequency_and_timezone() {
        let conn = store();
        let counter = create_counter(&conn, "default-freq", None, None).expect("create");
        assert_eq!(counter.frequency, "1d");
        assert_eq!(counter.timezone, "UTC");

        let blank = create_counter(&conn, "blank-freq", Some(""), Some("")).expect("create");
        assert_eq!(blank.frequency, "1d");
        assert_eq!(blank.timezone, "UTC");
    }

    #[test]
    fn accepts_each_unit() {
        let conn = store();
        for (i, freq) in ["1h", "2d", "3w"].into_iter().enumerate() {
            let counter = create_counter(&conn, &format!("valid-freq-{i}"), Some(freq), Some("UTC"))
                .expect("create");
            assert_eq!(counter.frequency, freq);
        }
    }

    #[test]
    fn validates_inputs_before_touching_the_store() {
        let conn = store();
        assert!(matches!(create_counter(&conn, "", None, None), Err(Error::EmptyName)));
        assert!(matches!(
            create_counter(&conn, "bad-freq", Some("1m"), None),
            Err(Error::InvalidFormat(_))
        ));
        assert!(matches!(
            create_counter(&conn, "bad-tz", None, Some("Not/AZone")),
            Err(Error::InvalidTimezone(_))
        ));
        assert!(list_counters(&conn).expect("list").is_empty());
    }

    #[test]
    fn duplicate_names_fail_but_case_variants_succeed() {
        let conn = store();
        create_counter(&conn, "duplicate-test", Some("1d"), None).expect("first");
        create_counter(&conn, "Duplicate-Test", Some("1d"), None).expect("case variant");

        let err = create_counter(&conn, "duplicate-test", Some("2h"), None).expect_err("duplicate");
        assert!(matches!(err, Error::DuplicateName(ref name) if name == "duplicate-test"));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn get_counter_reports_missing_ids() {
        let conn = store();
        let created = create_counter(&conn, "get-test", Some("2d"), None).expect("create");

        let retrieved = get_counter(&conn, created.id).expect("get");
        assert_eq!(retrieved, created);
        assert!(matches!(get_counter(&conn, 999_999), Err(Error::CounterNotFound(999_999))));
        assert_eq!(
            find_counter_by_name(&conn, "get-test").expect("find").map(|c| c.id),
            Some(created.id)
        );
        assert!(find_counter_by_name(&conn, "GET-TEST").expect("find").is_none());
    }

    #[test]
    fn update_frequency_validates_and_persists() {
        let conn = store();
        let counter = create_counter(&conn, "freq-update", Some("1d"), None).expect("create");

        let updated = update_frequency(&conn, counter.id, "2h").expect("update");
        assert_eq!(updated.frequency, "2h");
        assert_eq!(updated.created_at, counter.created_at);

        assert!(matches!(
            update_frequency(&conn, counter.id, "2"),
            Err(Error::InvalidFormat(_))
        ));
        assert!(matches!(
            update_frequency(&conn, 424_242, "1w"),
            Err(Error::CounterNotFound(424_242))
        ));
        assert_eq!(get_counter(&conn, counter.id).unwrap().frequency, "2h");
    }

    #[test]
    fn lists_in_creation_order() {
        let conn = store();
        for name in ["b", "a", "c"] {
            create_counter(&conn, name, None, None).expect("create");
        }
        let names: Vec<String> = list_counters(&conn).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
