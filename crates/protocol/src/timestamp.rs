//! Serde helper for platform timestamps.
//!
//! The API is not consistent about time values: some endpoints send Unix
//! seconds, others an RFC 3339 string, and absent values come back as
//! `null`. Use with `#[serde(default, with = "sbg_protocol::timestamp")]`
//! on an `Option<DateTime<Utc>>` field.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Seconds(i64),
    Text(String),
}

/// Serializes as Unix seconds, or `null` when absent.
pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(dt) => serializer.serialize_i64(dt.timestamp()),
        None => serializer.serialize_none(),
    }
}

/// Accepts Unix seconds, an RFC 3339 string, or `null`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawTimestamp::Seconds(secs)) => DateTime::from_timestamp(secs, 0)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}"))),
        Some(RawTimestamp::Text(text)) if text.is_empty() => Ok(None),
        Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(D::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Stamped {
        #[serde(default, with = "crate::timestamp")]
        at: Option<DateTime<Utc>>,
    }

    #[test]
    fn accepts_unix_seconds() {
        let s: Stamped = serde_json::from_str(r#"{"at":1500000000}"#).unwrap();
        assert_eq!(s.at, Utc.timestamp_opt(1_500_000_000, 0).single());
    }

    #[test]
    fn accepts_rfc3339() {
        let s: Stamped = serde_json::from_str(r#"{"at":"2017-07-14T02:40:00Z"}"#).unwrap();
        assert_eq!(s.at, Utc.timestamp_opt(1_500_000_000, 0).single());
    }

    #[test]
    fn null_and_missing_are_none() {
        let s: Stamped = serde_json::from_str(r#"{"at":null}"#).unwrap();
        assert!(s.at.is_none());
        let s: Stamped = serde_json::from_str("{}").unwrap();
        assert!(s.at.is_none());
    }

    #[test]
    fn rejects_garbage_text() {
        assert!(serde_json::from_str::<Stamped>(r#"{"at":"yesterday"}"#).is_err());
    }

    #[test]
    fn serializes_as_seconds() {
        let s = Stamped {
            at: Utc.timestamp_opt(42, 0).single(),
        };
        assert_eq!(serde_json::to_string(&s).unwrap(), r#"{"at":42}"#);
    }
}
