//! Serde helpers for record timestamps.
//!
//! Records are written with RFC 3339 strings. Older cache files carried either
//! naive ISO-8601 strings (no offset, taken as UTC) or epoch seconds as an
//! integer or float, so reads accept all three.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Int(i64),
    Float(f64),
    Text(String),
}

pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Int(secs) => DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| de::Error::custom(format!("epoch seconds out of range: {secs}"))),
        RawTimestamp::Float(secs) => from_epoch_f64(secs)
            .ok_or_else(|| de::Error::custom(format!("epoch seconds out of range: {secs}"))),
        RawTimestamp::Text(s) => parse(&s)
            .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp '{s}'"))),
    }
}

/// Parse RFC 3339, falling back to a naive ISO-8601 datetime interpreted as UTC.
pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn from_epoch_f64(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() { return None; }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

pub fn now() -> DateTime<Utc> { Utc::now() }
