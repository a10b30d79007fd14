use chrono::{Local, NaiveDateTime, Timelike};
use serde::{de::Visitor, Deserialize, Serialize, Serializer};
use std::fmt;

/// Text layout used everywhere a timestamp leaves the process, in
/// logs, the session table and the exported records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Wall clock time truncated to whole seconds. Marks and run start
/// times are only ever compared and printed at this resolution, so
/// the sub second part is dropped on construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Current local time.
    pub fn now() -> Self {
        Self::from(Local::now().naive_local())
    }

    /// Parse a timestamp written with [`TIMESTAMP_FORMAT`].
    ///
    /// * `value`: text such as `2023-07-14 09:30:05`.
    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map(Self)
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(value: NaiveDateTime) -> Self {
        // Nanoseconds are always in range, so this only fails on a leap
        // second representation which is kept as is.
        Self(value.with_nanosecond(0).unwrap_or(value))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(TimestampVisitor {})
    }
}

/// Wrapper type for serde implementation.
struct TimestampVisitor {}

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "a timestamp formatted as {TIMESTAMP_FORMAT}")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Timestamp::parse(v).map_err(|e| E::custom(format!("bad timestamp {v:?}: {e}")))
    }
}
