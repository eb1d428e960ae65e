//! Boundary timestamps: internally `i64` milliseconds since the Unix epoch,
//! serialized as ISO-8601 strings. Deserialization also accepts a raw
//! millisecond number for replay fixtures.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

fn to_iso8601(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ms.to_string(),
    }
}

fn from_iso8601(raw: &str) -> Result<i64, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .map_err(|err| format!("invalid ISO-8601 timestamp {raw:?}: {err}"))
}

pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&to_iso8601(*value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TimeInput {
        String(String),
        Number(i64),
    }

    match TimeInput::deserialize(deserializer)? {
        TimeInput::String(raw) => from_iso8601(&raw).map_err(D::Error::custom),
        TimeInput::Number(ms) => Ok(ms),
    }
}

/// `Option<i64>` variant for nullable boundary timestamps (pause dates).
pub mod opt {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ms) => serializer.serialize_str(&super::to_iso8601(*ms)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum TimeInput {
            String(String),
            Number(i64),
        }

        let raw: Option<TimeInput> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(TimeInput::Number(ms)) => Ok(Some(ms)),
            Some(TimeInput::String(s)) => super::from_iso8601(&s)
                .map(Some)
                .map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Stamp {
        #[serde(with = "super")]
        at: i64,
    }

    #[test]
    fn serializes_epoch_millis_as_iso8601() {
        let encoded = serde_json::to_string(&Stamp { at: 0 }).expect("encode");
        assert_eq!(encoded, r#"{"at":"1970-01-01T00:00:00.000Z"}"#);
    }

    #[test]
    fn round_trips_sub_second_precision() {
        let stamp = Stamp { at: 1_700_000_123_456 };
        let encoded = serde_json::to_string(&stamp).expect("encode");
        let decoded: Stamp = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(stamp, decoded);
    }

    #[test]
    fn accepts_raw_millisecond_numbers() {
        let decoded: Stamp = serde_json::from_str(r#"{"at":42}"#).expect("decode");
        assert_eq!(decoded.at, 42);
    }
}
