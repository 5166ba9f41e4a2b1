// src/clock.rs
// Wall-clock helpers: HH:MM parsing, block spans with midnight wrap, minute/hour conversion.
use chrono::{NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrorReason;

static HHMM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]?\d|2[0-3])[:.]([0-5]\d)$").expect("static regex"));

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Parses `HH:MM` (also `H:MM` and `HH.MM`). Empty input means "not recorded".
pub fn parse_hhmm(field: &str, raw: &str) -> Result<Option<NaiveTime>, ValidationErrorReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let malformed = || ValidationErrorReason::MalformedTime {
        field: field.to_string(),
        value: raw.to_string(),
    };
    let caps = HHMM.captures(trimmed).ok_or_else(malformed)?;
    let hour: u32 = caps[1].parse().map_err(|_| malformed())?;
    let minute: u32 = caps[2].parse().map_err(|_| malformed())?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .map(Some)
        .ok_or_else(malformed)
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn minute_of_day(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

/// Minutes between start and end; an end before the start wraps past midnight.
pub fn span_minutes(start: NaiveTime, end: NaiveTime) -> i64 {
    let (s, e) = (minute_of_day(start), minute_of_day(end));
    if e >= s {
        e - s
    } else {
        e + MINUTES_PER_DAY - s
    }
}

pub fn minutes_to_hours(minutes: i64) -> Decimal {
    Decimal::from(minutes) / dec!(60)
}

pub fn round_hours(hours: Decimal) -> Decimal {
    hours.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// One contiguous stretch of time on a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeBlock {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn minutes(&self) -> i64 {
        span_minutes(self.start, self.end)
    }

    pub fn hours(&self) -> Decimal {
        minutes_to_hours(self.minutes())
    }

    /// Start/end as minute offsets, end shifted past midnight when wrapping.
    pub fn bounds(&self) -> (i64, i64) {
        let s = minute_of_day(self.start);
        (s, s + self.minutes())
    }

    pub fn overlaps(&self, other: &TimeBlock) -> bool {
        let (a_start, a_end) = self.bounds();
        let (b_start, b_end) = other.bounds();
        a_start < b_end && b_start < a_end
    }
}

// serde helpers for HH:MM fields
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_hhmm(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hhmm("time", &raw)
            .map_err(D::Error::custom)?
            .ok_or_else(|| D::Error::custom("time must not be empty"))
    }
}

pub mod opt_hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_some(&super::format_hhmm(*t)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(value) => super::parse_hhmm("time", &value).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        parse_hhmm("test", s).unwrap().unwrap()
    }

    #[test]
    fn parses_common_forms() {
        assert_eq!(t("08:00"), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(t("8:05"), NaiveTime::from_hms_opt(8, 5, 0).unwrap());
        assert_eq!(t("17.30"), NaiveTime::from_hms_opt(17, 30, 0).unwrap());
        assert_eq!(parse_hhmm("kommt1", "  ").unwrap(), None);
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["24:00", "8", "12:60", "ab:cd", "7:5"] {
            assert!(
                matches!(
                    parse_hhmm("geht1", raw),
                    Err(ValidationErrorReason::MalformedTime { .. })
                ),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn span_wraps_midnight() {
        assert_eq!(span_minutes(t("08:00"), t("16:30")), 510);
        assert_eq!(span_minutes(t("22:00"), t("06:00")), 480);
        assert_eq!(span_minutes(t("09:00"), t("09:00")), 0);
    }

    #[test]
    fn overlapping_blocks() {
        let morning = TimeBlock::new(t("08:00"), t("12:00"));
        let afternoon = TimeBlock::new(t("12:00"), t("16:00"));
        let lunch = TimeBlock::new(t("11:30"), t("13:00"));
        assert!(!morning.overlaps(&afternoon));
        assert!(morning.overlaps(&lunch));
        assert!(lunch.overlaps(&afternoon));
    }
}
