//! ISO-8601 converters for xs:dateTime, xs:date and xs:time
//!
//! The patterns match a prefix of the input. Timezone offsets on dateTime
//! values are added to the naive timestamp; date and time offsets are
//! accepted and ignored. Anything that does not match, or names an
//! impossible date, parses to null.

use super::XsConverter;
use crate::error::Result;
use crate::values::Value;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::{Captures, Regex};

const DATETIME_PATTERN: &str = r"^(\d{4})-?(\d{2})-?(\d{2})T(\d{2}):?(\d{2}):?(\d{2})(?:\.(\d{6}))?(?:Z|(?:([+-]\d{2}):?(\d{2})))?";
const DATE_PATTERN: &str = r"^(\d{4})-?(\d{2})-?(\d{2})(?:Z|(?:([+-]\d{2}):?(\d{2})))?";
const TIME_PATTERN: &str = r"^(\d{2}):?(\d{2}):?(\d{2})(?:\.(\d{6}))?(?:Z|(?:([+-]\d{2}):?(\d{2})))?";

lazy_static::lazy_static! {
    static ref DATETIME_REGEX: Regex = Regex::new(DATETIME_PATTERN).unwrap();
    static ref DATE_REGEX: Regex = Regex::new(DATE_PATTERN).unwrap();
    static ref TIME_REGEX: Regex = Regex::new(TIME_PATTERN).unwrap();
}

fn group<T: std::str::FromStr>(caps: &Captures<'_>, i: usize) -> Option<T> {
    caps.get(i).and_then(|m| m.as_str().parse().ok())
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let caps = DATETIME_REGEX.captures(text)?;
    let date = NaiveDate::from_ymd_opt(group(&caps, 1)?, group(&caps, 2)?, group(&caps, 3)?)?;
    let micros: u32 = group(&caps, 7).unwrap_or(0);
    let mut dt = date.and_hms_micro_opt(group(&caps, 4)?, group(&caps, 5)?, group(&caps, 6)?, micros)?;
    if let (Some(hours), Some(minutes)) = (group::<i64>(&caps, 8), group::<i64>(&caps, 9)) {
        let minutes = if caps[8].starts_with('-') { -minutes } else { minutes };
        dt = dt.checked_add_signed(Duration::hours(hours) + Duration::minutes(minutes))?;
    }
    Some(dt)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let caps = DATE_REGEX.captures(text)?;
    NaiveDate::from_ymd_opt(group(&caps, 1)?, group(&caps, 2)?, group(&caps, 3)?)
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let caps = TIME_REGEX.captures(text)?;
    let micros: u32 = group(&caps, 4).unwrap_or(0);
    NaiveTime::from_hms_micro_opt(group(&caps, 1)?, group(&caps, 2)?, group(&caps, 3)?, micros)
}

fn format_micros(nanos: u32) -> String {
    match nanos / 1000 {
        0 => String::new(),
        micros => format!(".{:06}", micros),
    }
}

/// ISO-8601 text of a timestamp, microseconds only when non-zero
pub fn format_datetime(value: &NaiveDateTime) -> String {
    format!(
        "{}{}",
        value.format("%Y-%m-%dT%H:%M:%S"),
        format_micros(value.nanosecond())
    )
}

/// ISO-8601 text of a date
pub fn format_date(value: &NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

/// ISO-8601 text of a time of day, microseconds only when non-zero
pub fn format_time(value: &NaiveTime) -> String {
    format!("{}{}", value.format("%H:%M:%S"), format_micros(value.nanosecond()))
}

/// xs:dateTime
#[derive(Debug, Clone, Copy)]
pub struct DateTimeConverter;

impl XsConverter for DateTimeConverter {
    fn check(&self, value: &Value) -> bool {
        matches!(value, Value::DateTime(_))
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        Ok(parse_datetime(text).map(Value::DateTime).unwrap_or(Value::Null))
    }
}

/// xs:date
#[derive(Debug, Clone, Copy)]
pub struct DateConverter;

impl XsConverter for DateConverter {
    fn check(&self, value: &Value) -> bool {
        matches!(value, Value::Date(_))
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        Ok(parse_date(text).map(Value::Date).unwrap_or(Value::Null))
    }
}

/// xs:time
#[derive(Debug, Clone, Copy)]
pub struct TimeConverter;

impl XsConverter for TimeConverter {
    fn check(&self, value: &Value) -> bool {
        matches!(value, Value::Time(_))
    }

    fn from_text(&self, text: &str) -> Result<Value> {
        Ok(parse_time(text).map(Value::Time).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_format_without_separators() {
        let dt = parse_datetime("20210105T100000").unwrap();
        assert_eq!(format_datetime(&dt), "2021-01-05T10:00:00");
    }

    #[test]
    fn test_positive_offset() {
        let dt = parse_datetime("2021-01-05T10:00:00+0130").unwrap();
        assert_eq!(format_datetime(&dt), "2021-01-05T11:30:00");
    }

    #[test]
    fn test_negative_zero_hour_offset() {
        let dt = parse_datetime("2021-01-05T10:00:00-00:30").unwrap();
        assert_eq!(format_datetime(&dt), "2021-01-05T09:30:00");
    }

    #[test]
    fn test_invalid_components() {
        assert!(parse_datetime("2021-02-30T10:00:00").is_none());
        assert!(parse_time("25:00:00").is_none());
    }
}
