use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub id: i64,
    pub name: String,      // case-sensitive, unique
    pub frequency: String, // "Nh" | "Nd" | "Nw"
    pub timezone: String,  // IANA name
    pub created_at: DateTime<Utc>,
}
