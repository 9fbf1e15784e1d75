use std::fmt;

use chrono::{DateTime, Utc};

/// Deletion timestamp with microsecond precision.
///
/// Stored as an RFC 3339 string with a `Z` suffix and exactly six
/// fractional digits (see [`Timestamp::to_json`]), so stored values order
/// lexically the same way they order chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(datetime_micros())
    }

    pub fn inner(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a stored marker value. Anything that is not an RFC 3339 string
    /// yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| Timestamp(dt.with_timezone(&Utc)))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(self.to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
        )
    }
}

/// Create a DateTime truncated to microsecond precision (6 decimal places)
fn datetime_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_micros_and_z() {
        let ts = Timestamp(
            DateTime::parse_from_rfc3339("2024-03-01T10:20:30.123456789Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        assert_eq!(ts.to_string(), "2024-03-01T10:20:30.123456Z");
    }

    #[test]
    fn json_round_trip_keeps_micros() {
        let ts = Timestamp::now();
        let parsed = Timestamp::from_json(&ts.to_json()).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn non_string_json_is_not_a_timestamp() {
        assert!(Timestamp::from_json(&serde_json::json!(42)).is_none());
        assert!(Timestamp::from_json(&serde_json::Value::Null).is_none());
    }
}
