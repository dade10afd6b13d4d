use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accumulation epoch of a counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    pub id: i64,
    pub counter_id: i64,
    pub value: i64,
    pub expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountState {
    Open,
    Expired,
}

impl Count {
    /// Derived from the expiry on every call; there is no stored status.
    pub fn state(&self, now: DateTime<Utc>) -> CountState {
        if self.expiry > now {
            CountState::Open
        } else {
            CountState::Expired
        }
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == CountState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_instant_itself_is_already_expired() {
        let expiry = Utc.with_ymd_and_hms(2025, 11, 15, 0, 0, 0).unwrap();
        let count = Count {
            id: 1,
            counter_id: 1,
            value: 4,
            expiry,
            created_at: Utc.with_ymd_and_hms(2025, 11, 14, 9, 0, 0).unwrap(),
        };

        assert!(count.is_open(expiry - chrono::TimeDelta::seconds(1)));
        assert_eq!(count.state(expiry), CountState::Expired);
        assert_eq!(count.state(expiry + chrono::TimeDelta::days(3)), CountState::Expired);
    }
}
