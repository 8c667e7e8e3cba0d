//! Date and time values for configuration fields.
//!
//! [`Timestamp`] reads epoch milliseconds or an ISO-8601 / RFC 3339 string
//! and writes epoch milliseconds. [`Date`], [`Time`] and [`DateTime`] read
//! both the slash style (`2016/09/16 09:15`) and ISO style, and write the
//! fixed-width slash style.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::de::{self, Deserialize, Deserializer, Unexpected, Visitor};
use serde::ser::{Serialize, Serializer};

const DATE_OUT: &str = "%Y/%m/%d";
const TIME_OUT: &str = "%H:%M:%S";
const DATE_TIME_OUT: &str = "%Y/%m/%d %H:%M:%S";

const DATE_IN: &[&str] = &["%Y/%m/%d", "%Y-%m-%d"];
const TIME_IN: &[&str] = &["%H:%M:%S", "%H:%M", "%H:%M:%S%.f"];
const DATE_TIME_IN: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Unparseable date or time text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalError(String);

impl fmt::Display for TemporalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a recognized date or time", self.0)
    }
}

impl std::error::Error for TemporalError {}

fn first_match<T>(
    raw: &str,
    formats: &[&str],
    parse: fn(&str, &str) -> chrono::ParseResult<T>,
) -> Result<T, TemporalError> {
    let text = raw.trim();
    formats
        .iter()
        .find_map(|fmt| parse(text, fmt).ok())
        .ok_or_else(|| TemporalError(text.to_string()))
}

/// An instant, stored in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub chrono::DateTime<Utc>);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Option<Self> {
        chrono::DateTime::from_timestamp_millis(millis).map(Timestamp)
    }

    pub fn millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl FromStr for Timestamp {
    type Err = TemporalError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let text = raw.trim();
        if let Ok(millis) = text.parse::<i64>() {
            return Timestamp::from_millis(millis).ok_or_else(|| TemporalError(text.to_string()));
        }
        if let Ok(instant) = chrono::DateTime::parse_from_rfc3339(text) {
            return Ok(Timestamp(instant.with_timezone(&Utc)));
        }
        if let Ok(local) = first_match(text, DATE_TIME_IN, NaiveDateTime::parse_from_str) {
            return Ok(Timestamp(local.and_utc()));
        }
        let date = first_match(text, DATE_IN, NaiveDate::parse_from_str)?;
        date.and_hms_opt(0, 0, 0)
            .map(|midnight| Timestamp(midnight.and_utc()))
            .ok_or_else(|| TemporalError(text.to_string()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.millis())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("epoch milliseconds or an ISO-8601 date-time")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Timestamp, E> {
        Timestamp::from_millis(v).ok_or_else(|| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Timestamp, E> {
        i64::try_from(v)
            .ok()
            .and_then(Timestamp::from_millis)
            .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Timestamp, E> {
        self.visit_i64(v.trunc() as i64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
        crate::convert::unquote(v)
            .parse()
            .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }
}

macro_rules! text_temporal {
    ($(#[$doc:meta])* $name:ident($inner:ty), $input:expr, $output:expr, $expecting:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub $inner);

        impl FromStr for $name {
            type Err = TemporalError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                first_match(raw, $input, <$inner>::parse_from_str).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.format($output))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct TextVisitor;

                impl<'de> Visitor<'de> for TextVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str($expecting)
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<$name, E> {
                        crate::convert::unquote(v)
                            .parse()
                            .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
                    }
                }

                deserializer.deserialize_str(TextVisitor)
            }
        }
    };
}

text_temporal!(
    /// A calendar date, written `yyyy/MM/dd`.
    Date(NaiveDate),
    DATE_IN,
    DATE_OUT,
    "a date such as 2016/09/16"
);

text_temporal!(
    /// A time of day, written `HH:mm:ss`.
    Time(NaiveTime),
    TIME_IN,
    TIME_OUT,
    "a time such as 09:15"
);

text_temporal!(
    /// A date and time without zone, written `yyyy/MM/dd HH:mm:ss`.
    DateTime(NaiveDateTime),
    DATE_TIME_IN,
    DATE_TIME_OUT,
    "a date-time such as 2016/09/16 09:15"
);
