use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Frequency used when a counter is created without one.
pub const DEFAULT_FREQUENCY: &str = "1d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Hour,
    Day,
    Week,
}

impl Unit {
    pub fn as_char(self) -> char {
        match self {
            Unit::Hour => 'h',
            Unit::Day => 'd',
            Unit::Week => 'w',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            'h' => Some(Unit::Hour),
            'd' => Some(Unit::Day),
            'w' => Some(Unit::Week),
            _ => None,
        }
    }
}

/// Parsed frequency specifier, e.g. `"2d"` → every 2 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frequency {
    pub multiplier: u32,
    pub unit: Unit,
}

impl Frequency {
    /// Parse `<digits><h|d|w>`. The whole string must match; the multiplier
    /// must be at least 1.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidFormat(text.to_string());

        let mut chars = text.chars();
        let unit = chars.next_back().and_then(Unit::from_char).ok_or_else(invalid)?;
        let digits = chars.as_str();

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let multiplier = digits.parse::<u32>().map_err(|_| invalid())?;
        if multiplier == 0 {
            return Err(invalid());
        }

        Ok(Frequency { multiplier, unit })
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Frequency::parse(s)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.multiplier, self.unit.as_char())
    }
}
