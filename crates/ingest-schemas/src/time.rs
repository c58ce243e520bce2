//! Flexible timestamp parsing (spec §4.A): accept ISO-8601, space-separated
//! date-time, and decimal epoch seconds on the way in; always re-emit
//! ISO-8601 on the way out.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serializer};

pub fn parse_flexible_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(secs) = trimmed.parse::<f64>() {
        let whole = secs.trunc() as i64;
        let nanos = ((secs.fract()) * 1_000_000_000.0).round() as u32;
        return DateTime::from_timestamp(whole, nanos)
            .ok_or_else(|| format!("epoch seconds out of range: {trimmed}"));
    }

    Err(format!("unrecognized timestamp format: {trimmed}"))
}

/// A `DateTime<Utc>` that deserializes from any of the formats
/// `parse_flexible_timestamp` accepts, and always serializes as RFC 3339.
pub mod flexible {
    use super::*;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        parse_flexible_timestamp(&s).map_err(de::Error::custom)
    }
}

/// Same as `flexible` but for an `Option<DateTime<Utc>>`.
pub mod flexible_opt {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Deserialize::deserialize(deserializer)?;
        match opt {
            Some(s) => parse_flexible_timestamp(&s)
                .map(Some)
                .map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339() {
        let dt = parse_flexible_timestamp("2024-01-01T10:00:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-01T10:00:00+00:00");
    }

    #[test]
    fn parses_space_separated() {
        let dt = parse_flexible_timestamp("2024-01-01 10:00:00").unwrap();
        assert_eq!(dt.timestamp(), 1_704_103_200);
    }

    #[test]
    fn parses_epoch_seconds() {
        let dt = parse_flexible_timestamp("1704103200").unwrap();
        assert_eq!(dt.timestamp(), 1_704_103_200);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_flexible_timestamp("not a date").is_err());
    }
}
