// src/holidays.rs
// German public holidays per federal state.
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FederalState {
    BW,
    BY,
    BE,
    BB,
    HB,
    HH,
    HE,
    MV,
    NI,
    NW,
    RP,
    SL,
    SN,
    ST,
    SH,
    TH,
}

impl FederalState {
    pub const ALL: [FederalState; 16] = [
        FederalState::BW,
        FederalState::BY,
        FederalState::BE,
        FederalState::BB,
        FederalState::HB,
        FederalState::HH,
        FederalState::HE,
        FederalState::MV,
        FederalState::NI,
        FederalState::NW,
        FederalState::RP,
        FederalState::SL,
        FederalState::SN,
        FederalState::ST,
        FederalState::SH,
        FederalState::TH,
    ];

    pub fn code(self) -> &'static str {
        match self {
            FederalState::BW => "BW",
            FederalState::BY => "BY",
            FederalState::BE => "BE",
            FederalState::BB => "BB",
            FederalState::HB => "HB",
            FederalState::HH => "HH",
            FederalState::HE => "HE",
            FederalState::MV => "MV",
            FederalState::NI => "NI",
            FederalState::NW => "NW",
            FederalState::RP => "RP",
            FederalState::SL => "SL",
            FederalState::SN => "SN",
            FederalState::ST => "ST",
            FederalState::SH => "SH",
            FederalState::TH => "TH",
        }
    }
}

impl fmt::Display for FederalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FederalState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        FederalState::ALL
            .iter()
            .copied()
            .find(|state| state.code() == wanted)
            .ok_or_else(|| EngineError::UnknownRegion(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayInfo {
    pub is_holiday: bool,
    pub name: Option<String>,
}

/// Region-aware public holiday lookup.
pub trait HolidayCalendar {
    fn is_holiday(&self, date: NaiveDate, region: FederalState) -> HolidayInfo;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GermanHolidayCalendar;

impl HolidayCalendar for GermanHolidayCalendar {
    fn is_holiday(&self, date: NaiveDate, region: FederalState) -> HolidayInfo {
        match holidays_in_year(date.year(), region)
            .into_iter()
            .find(|(day, _)| *day == date)
        {
            Some((_, name)) => HolidayInfo {
                is_holiday: true,
                name: Some(name.to_string()),
            },
            None => HolidayInfo::default(),
        }
    }
}

/// Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Wednesday before 23 November.
fn buss_und_bettag(year: i32) -> Option<NaiveDate> {
    let mut date = NaiveDate::from_ymd_opt(year, 11, 22)?;
    while date.weekday() != Weekday::Wed {
        date -= Duration::days(1);
    }
    Some(date)
}

/// All public holidays of a year in the region, sorted by date.
pub fn holidays_in_year(year: i32, region: FederalState) -> Vec<(NaiveDate, &'static str)> {
    use FederalState::*;

    let fixed = |month: u32, day: u32| NaiveDate::from_ymd_opt(year, month, day);
    let mut days: Vec<(Option<NaiveDate>, &'static str)> = vec![
        (fixed(1, 1), "Neujahr"),
        (fixed(5, 1), "Tag der Arbeit"),
        (fixed(10, 3), "Tag der Deutschen Einheit"),
        (fixed(12, 25), "1. Weihnachtstag"),
        (fixed(12, 26), "2. Weihnachtstag"),
    ];

    if let Some(easter) = easter_sunday(year) {
        let offset = |n: i64| Some(easter + Duration::days(n));
        days.push((offset(-2), "Karfreitag"));
        days.push((offset(1), "Ostermontag"));
        days.push((offset(39), "Christi Himmelfahrt"));
        days.push((offset(50), "Pfingstmontag"));
        if matches!(region, BW | BY | HE | NW | RP | SL) {
            days.push((offset(60), "Fronleichnam"));
        }
    }

    if matches!(region, BW | BY | ST) {
        days.push((fixed(1, 6), "Heilige Drei Könige"));
    }
    if region == BE || (region == MV && year >= 2023) {
        days.push((fixed(3, 8), "Internationaler Frauentag"));
    }
    if matches!(region, BY | SL) {
        days.push((fixed(8, 15), "Mariä Himmelfahrt"));
    }
    if region == TH && year >= 2019 {
        days.push((fixed(9, 20), "Weltkindertag"));
    }
    if matches!(region, BB | HB | HH | MV | NI | SN | ST | SH | TH) {
        days.push((fixed(10, 31), "Reformationstag"));
    }
    if matches!(region, BW | BY | NW | RP | SL) {
        days.push((fixed(11, 1), "Allerheiligen"));
    }
    if region == SN {
        days.push((buss_und_bettag(year), "Buß- und Bettag"));
    }

    let mut resolved: Vec<(NaiveDate, &'static str)> = days
        .into_iter()
        .filter_map(|(date, name)| date.map(|d| (d, name)))
        .collect();
    resolved.sort_by_key(|(date, _)| *date);
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn easter_dates() {
        assert_eq!(easter_sunday(2024), Some(d("2024-03-31")));
        assert_eq!(easter_sunday(2025), Some(d("2025-04-20")));
        assert_eq!(easter_sunday(2026), Some(d("2026-04-05")));
    }

    #[test]
    fn nationwide_and_regional() {
        let calendar = GermanHolidayCalendar;
        let good_friday = calendar.is_holiday(d("2025-04-18"), FederalState::HH);
        assert!(good_friday.is_holiday);
        assert_eq!(good_friday.name.as_deref(), Some("Karfreitag"));

        assert!(calendar.is_holiday(d("2025-06-19"), FederalState::NW).is_holiday);
        assert!(!calendar.is_holiday(d("2025-06-19"), FederalState::HH).is_holiday);
        assert!(calendar.is_holiday(d("2025-10-31"), FederalState::NI).is_holiday);
        assert!(!calendar.is_holiday(d("2025-10-31"), FederalState::NW).is_holiday);
        assert!(calendar.is_holiday(d("2025-11-19"), FederalState::SN).is_holiday);
        assert!(!calendar.is_holiday(d("2022-03-08"), FederalState::MV).is_holiday);
        assert!(calendar.is_holiday(d("2023-03-08"), FederalState::MV).is_holiday);
    }

    #[test]
    fn year_listing_is_sorted() {
        let list = holidays_in_year(2025, FederalState::BY);
        assert_eq!(list.first().map(|(_, n)| *n), Some("Neujahr"));
        assert!(list.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(list.len(), 13);
        assert_eq!(holidays_in_year(2025, FederalState::HB).len(), 10);
    }

    #[test]
    fn region_codes_parse() {
        assert_eq!("nw".parse::<FederalState>().unwrap(), FederalState::NW);
        assert!(matches!(
            "XX".parse::<FederalState>(),
            Err(EngineError::UnknownRegion(_))
        ));
    }
}
