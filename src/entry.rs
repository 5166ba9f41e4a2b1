// src/entry.rs
use chrono::{Duration, NaiveDate, NaiveTime};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clock::{minutes_to_hours, opt_hhmm, parse_hhmm, TimeBlock};
use crate::error::{rule_id, EmployeeId, ValidationError, ValidationErrorReason, ValidationWarning};
use crate::status_code::StatusCode;

/// Longest range accepted in one submission.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Largest gross revenue accepted for one day. Keeps yearly sums far from `Decimal::MAX`.
pub const MAX_DAILY_REVENUE: Decimal = dec!(10000000);

/// Rejects a stored or imported revenue outside `[0, MAX_DAILY_REVENUE]`.
pub fn check_revenue(amount: Decimal) -> Result<(), ValidationErrorReason> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationErrorReason::NegativeRevenue { amount });
    }
    if amount > MAX_DAILY_REVENUE {
        return Err(ValidationErrorReason::RevenueTooLarge {
            amount,
            max: MAX_DAILY_REVENUE,
        });
    }
    Ok(())
}

// --- Field Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PauseInput {
    /// Recorded as "keine"/"none".
    #[default]
    #[serde(rename = "keine")]
    None,
    #[serde(rename = "minutes")]
    Minutes(u32),
}

impl PauseInput {
    pub fn minutes(self) -> u32 {
        match self {
            PauseInput::None => 0,
            PauseInput::Minutes(m) => m,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationErrorReason> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("none")
            || trimmed.eq_ignore_ascii_case("keine")
        {
            return Ok(PauseInput::None);
        }
        trimmed
            .parse::<u32>()
            .map(PauseInput::Minutes)
            .map_err(|_| ValidationErrorReason::MalformedPause {
                value: raw.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MealFlag {
    Ja,
    #[default]
    Nein,
}

impl MealFlag {
    pub fn is_yes(self) -> bool {
        self == MealFlag::Ja
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationErrorReason> {
        match raw.trim().to_lowercase().as_str() {
            "" | "nein" | "no" | "false" | "0" => Ok(MealFlag::Nein),
            "ja" | "yes" | "true" | "1" => Ok(MealFlag::Ja),
            _ => Err(ValidationErrorReason::MalformedMealFlag {
                value: raw.to_string(),
            }),
        }
    }
}

impl fmt::Display for MealFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MealFlag::Ja => f.write_str("Ja"),
            MealFlag::Nein => f.write_str("Nein"),
        }
    }
}

/// Accepts `1234.56`, `1234,56`, `1.234,56` and `1,234.56`.
pub fn parse_amount(raw: &str) -> Result<Option<Decimal>, ValidationErrorReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let malformed = || ValidationErrorReason::MalformedRevenue {
        value: raw.to_string(),
    };
    let normalized = match (trimmed.rfind(','), trimmed.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => trimmed.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => trimmed.replace(',', ""),
        (Some(_), None) => trimmed.replace(',', "."),
        _ => trimmed.to_string(),
    };
    Decimal::from_str(&normalized).map(Some).map_err(|_| malformed())
}

// --- Time Entry ---

/// One recorded day for one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub employee_id: EmployeeId,
    pub day_date: NaiveDate,
    #[serde(default, with = "opt_hhmm")]
    pub kommt1: Option<NaiveTime>,
    #[serde(default, with = "opt_hhmm")]
    pub geht1: Option<NaiveTime>,
    #[serde(default, with = "opt_hhmm")]
    pub kommt2: Option<NaiveTime>,
    #[serde(default, with = "opt_hhmm")]
    pub geht2: Option<NaiveTime>,
    #[serde(default)]
    pub pause: PauseInput,
    pub code: StatusCode,
    #[serde(default)]
    pub brutto: Option<Decimal>,
    #[serde(default)]
    pub bemerkungen: Option<String>,
    #[serde(default)]
    pub mittag: MealFlag,
}

impl TimeEntry {
    pub fn new(employee_id: EmployeeId, day_date: NaiveDate, code: StatusCode) -> Self {
        Self {
            employee_id,
            day_date,
            kommt1: None,
            geht1: None,
            kommt2: None,
            geht2: None,
            pause: PauseInput::None,
            code,
            brutto: None,
            bemerkungen: None,
            mittag: MealFlag::Nein,
        }
    }

    pub fn primary(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.kommt1 = Some(start);
        self.geht1 = Some(end);
        self
    }

    pub fn secondary(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.kommt2 = Some(start);
        self.geht2 = Some(end);
        self
    }

    pub fn pause_minutes(mut self, minutes: u32) -> Self {
        self.pause = PauseInput::Minutes(minutes);
        self
    }

    pub fn meal(mut self, flag: MealFlag) -> Self {
        self.mittag = flag;
        self
    }

    pub fn revenue(mut self, gross: Decimal) -> Self {
        self.brutto = Some(gross);
        self
    }

    pub fn primary_block(&self) -> Option<TimeBlock> {
        match (self.kommt1, self.geht1) {
            (Some(start), Some(end)) => Some(TimeBlock::new(start, end)),
            _ => None,
        }
    }

    pub fn secondary_block(&self) -> Option<TimeBlock> {
        match (self.kommt2, self.geht2) {
            (Some(start), Some(end)) => Some(TimeBlock::new(start, end)),
            _ => None,
        }
    }

    pub fn has_secondary(&self) -> bool {
        self.kommt2.is_some() || self.geht2.is_some()
    }

    pub fn has_any_time(&self) -> bool {
        self.kommt1.is_some() || self.geht1.is_some() || self.has_secondary()
    }

    /// Gross span of all complete blocks, pause not deducted.
    pub fn span_minutes(&self) -> i64 {
        self.primary_block().map(|b| b.minutes()).unwrap_or(0)
            + self.secondary_block().map(|b| b.minutes()).unwrap_or(0)
    }

    pub fn span_hours(&self) -> Decimal {
        minutes_to_hours(self.span_minutes())
    }

    /// Clears everything a full-day zero-time code must not carry.
    pub fn clear_times(&mut self) {
        self.kommt1 = None;
        self.geht1 = None;
        self.kommt2 = None;
        self.geht2 = None;
        self.pause = PauseInput::None;
        self.mittag = MealFlag::Nein;
        self.brutto = None;
    }
}

// --- Inbound Form Payload ---

/// Flat key-value payload as posted by the entry form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryForm {
    pub employee_id: String,
    pub day_date: String,
    pub range_end_date: Option<String>,
    pub kommt1: Option<String>,
    pub geht1: Option<String>,
    pub kommt2: Option<String>,
    pub geht2: Option<String>,
    pub pause: Option<String>,
    pub code: String,
    pub mittag: Option<String>,
    pub brutto: Option<String>,
    pub bemerkungen: Option<String>,
}

/// A parsed form: the entry template and every date it applies to, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSubmission {
    pub entry: TimeEntry,
    pub dates: Vec<NaiveDate>,
    pub warnings: Vec<ValidationWarning>,
}

impl ParsedSubmission {
    pub fn entry_for(&self, date: NaiveDate) -> TimeEntry {
        let mut entry = self.entry.clone();
        entry.day_date = date;
        entry
    }
}

fn parse_iso_date(raw: &str) -> Result<NaiveDate, ValidationErrorReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationErrorReason::MissingDate);
    }
    if trimmed.len() != 10 {
        return Err(ValidationErrorReason::MalformedDate {
            value: raw.to_string(),
        });
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        ValidationErrorReason::MalformedDate {
            value: raw.to_string(),
        }
    })
}

impl EntryForm {
    /// Parses every field; the first malformed field is reported.
    pub fn parse(&self) -> Result<ParsedSubmission, ValidationError> {
        let employee_raw = self.employee_id.trim();
        if employee_raw.is_empty() {
            return Err(ValidationError::new(
                rule_id::R1_EMPLOYEE,
                None,
                ValidationErrorReason::MissingEmployee,
            ));
        }
        let employee_id: EmployeeId = employee_raw.parse().map_err(|_| {
            ValidationError::new(
                rule_id::R1_EMPLOYEE,
                None,
                ValidationErrorReason::MalformedEmployee {
                    value: self.employee_id.clone(),
                },
            )
        })?;

        let start = parse_iso_date(&self.day_date)
            .map_err(|reason| ValidationError::new(rule_id::R1_DATE, None, reason))?;
        let field_error =
            |reason| ValidationError::new(rule_id::R1_FIELD_FORMAT, Some(start), reason);

        let code = StatusCode::parse(&self.code).map_err(field_error)?;

        let mut warnings = Vec::new();
        let range_end = match self.range_end_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let end = parse_iso_date(raw)
                    .map_err(|reason| ValidationError::new(rule_id::R1_DATE, Some(start), reason))?;
                if code.policy().range_eligible {
                    Some(end)
                } else {
                    warnings.push(ValidationWarning::RangeIgnoredForCode { code });
                    None
                }
            }
            _ => None,
        };
        let dates = expand_range(start, range_end)?;

        let time = |field: &str, raw: &Option<String>| -> Result<Option<NaiveTime>, ValidationError> {
            parse_hhmm(field, raw.as_deref().unwrap_or("")).map_err(field_error)
        };
        let entry = TimeEntry {
            employee_id,
            day_date: start,
            kommt1: time("kommt1", &self.kommt1)?,
            geht1: time("geht1", &self.geht1)?,
            kommt2: time("kommt2", &self.kommt2)?,
            geht2: time("geht2", &self.geht2)?,
            pause: PauseInput::parse(self.pause.as_deref().unwrap_or("")).map_err(field_error)?,
            code,
            brutto: parse_amount(self.brutto.as_deref().unwrap_or("")).map_err(field_error)?,
            bemerkungen: self
                .bemerkungen
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            mittag: MealFlag::parse(self.mittag.as_deref().unwrap_or("")).map_err(field_error)?,
        };

        Ok(ParsedSubmission {
            entry,
            dates,
            warnings,
        })
    }
}

fn expand_range(
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<Vec<NaiveDate>, ValidationError> {
    let end = match end {
        Some(end) => end,
        None => return Ok(vec![start]),
    };
    if end < start {
        return Err(ValidationError::new(
            rule_id::R1_RANGE,
            Some(start),
            ValidationErrorReason::RangeEndBeforeStart { start, end },
        ));
    }
    let days = (end - start).num_days() + 1;
    if days > MAX_RANGE_DAYS {
        return Err(ValidationError::new(
            rule_id::R1_RANGE,
            Some(start),
            ValidationErrorReason::RangeTooLong {
                days,
                max_days: MAX_RANGE_DAYS,
            },
        ));
    }
    Ok((0..days).map(|offset| start + Duration::days(offset)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn form(code: &str) -> EntryForm {
        EntryForm {
            employee_id: "7".into(),
            day_date: "2025-01-28".into(),
            code: code.into(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_a_regular_day() {
        let mut f = form("ra");
        f.kommt1 = Some("08:00".into());
        f.geht1 = Some("16:30".into());
        f.pause = Some("30".into());
        f.mittag = Some("Ja".into());
        f.brutto = Some("1.234,50".into());
        f.bemerkungen = Some("  ".into());

        let parsed = f.parse().unwrap();
        assert_eq!(parsed.dates, vec![d("2025-01-28")]);
        let e = parsed.entry;
        assert_eq!(e.employee_id, 7);
        assert_eq!(e.code, StatusCode::Regular);
        assert_eq!(e.span_minutes(), 510);
        assert_eq!(e.pause, PauseInput::Minutes(30));
        assert_eq!(e.mittag, MealFlag::Ja);
        assert_eq!(e.brutto, Some(dec!(1234.50)));
        assert_eq!(e.bemerkungen, None);
    }

    #[test]
    fn pause_literals() {
        assert_eq!(PauseInput::parse("keine").unwrap(), PauseInput::None);
        assert_eq!(PauseInput::parse("NONE").unwrap(), PauseInput::None);
        assert_eq!(PauseInput::parse("45").unwrap(), PauseInput::Minutes(45));
        assert!(PauseInput::parse("-5").is_err());
    }

    #[test]
    fn amounts_accept_both_separators() {
        assert_eq!(parse_amount("1234,56").unwrap(), Some(dec!(1234.56)));
        assert_eq!(parse_amount("1234.56").unwrap(), Some(dec!(1234.56)));
        assert_eq!(parse_amount("1,234.56").unwrap(), Some(dec!(1234.56)));
        assert_eq!(parse_amount("").unwrap(), None);
        assert!(parse_amount("12a").is_err());
    }

    #[test]
    fn revenue_bounds() {
        assert!(check_revenue(dec!(0)).is_ok());
        assert!(check_revenue(dec!(10000000)).is_ok());
        assert!(matches!(
            check_revenue(dec!(10000000.01)),
            Err(ValidationErrorReason::RevenueTooLarge { .. })
        ));
        assert!(matches!(
            check_revenue(Decimal::MAX),
            Err(ValidationErrorReason::RevenueTooLarge { .. })
        ));
        assert!(matches!(
            check_revenue(dec!(-1)),
            Err(ValidationErrorReason::NegativeRevenue { .. })
        ));
    }

    #[test]
    fn malformed_date_is_reported_first() {
        let mut f = form("XX");
        f.day_date = "28.01.2025".into();
        let err = f.parse().unwrap_err();
        assert_eq!(err.rule_id, rule_id::R1_DATE);
        assert!(matches!(err.reason, ValidationErrorReason::MalformedDate { .. }));

        f.day_date = String::new();
        assert_eq!(f.parse().unwrap_err().reason, ValidationErrorReason::MissingDate);
    }

    #[test]
    fn vacation_range_expands_inclusive() {
        let mut f = form("U");
        f.range_end_date = Some("2025-02-02".into());
        let parsed = f.parse().unwrap();
        assert_eq!(parsed.dates.len(), 6);
        assert_eq!(parsed.dates.first(), Some(&d("2025-01-28")));
        assert_eq!(parsed.dates.last(), Some(&d("2025-02-02")));
    }

    #[test]
    fn range_ignored_for_regular_code() {
        let mut f = form("RA");
        f.range_end_date = Some("2025-02-02".into());
        let parsed = f.parse().unwrap();
        assert_eq!(parsed.dates, vec![d("2025-01-28")]);
        assert_eq!(
            parsed.warnings,
            vec![ValidationWarning::RangeIgnoredForCode {
                code: StatusCode::Regular
            }]
        );
    }

    #[test]
    fn reversed_range_is_rejected() {
        let mut f = form("K");
        f.range_end_date = Some("2025-01-20".into());
        let err = f.parse().unwrap_err();
        assert_eq!(err.rule_id, rule_id::R1_RANGE);
    }
}
