// src/shift_plan.rs
use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::clock::{minutes_to_hours, opt_hhmm, TimeBlock};
use crate::error::PlanError;
use crate::pause_law::effective_pause_minutes;
use crate::status_code::StatusCode;

// --- Plan Records (as stored) ---

/// Legacy single-segment plan for one employee and date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftPlanDay {
    pub iso_date: NaiveDate,
    #[serde(default, with = "opt_hhmm")]
    pub start: Option<NaiveTime>,
    #[serde(default, with = "opt_hhmm")]
    pub end: Option<NaiveTime>,
    #[serde(default)]
    pub required_pause_minutes: u32,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub branch_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentMode {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftPlanSegment {
    pub segment_index: u32,
    pub mode: SegmentMode,
    #[serde(default, with = "opt_hhmm")]
    pub start: Option<NaiveTime>,
    #[serde(default, with = "opt_hhmm")]
    pub end: Option<NaiveTime>,
    #[serde(default)]
    pub required_pause_minutes: u32,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub branch_id: Option<i64>,
}

impl ShiftPlanSegment {
    fn block(&self) -> Option<TimeBlock> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(TimeBlock::new(start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentedPlanDay {
    pub iso_date: NaiveDate,
    pub segments: Vec<ShiftPlanSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlanRecord {
    Day(ShiftPlanDay),
    Segmented(SegmentedPlanDay),
}

impl PlanRecord {
    pub fn date(&self) -> NaiveDate {
        match self {
            PlanRecord::Day(day) => day.iso_date,
            PlanRecord::Segmented(seg) => seg.iso_date,
        }
    }

    /// Structural checks run before a plan day is saved.
    pub fn validate(&self) -> Result<(), PlanError> {
        match self {
            PlanRecord::Day(day) => validate_day(day),
            PlanRecord::Segmented(seg) => validate_segments(&seg.segments),
        }
    }

    /// Consolidated read-only view used by the reconciler and the balance fold.
    pub fn to_plan_info(&self) -> PlanInfo {
        match self {
            PlanRecord::Day(day) => {
                let blocks = match (day.start, day.end) {
                    (Some(start), Some(end)) => {
                        let block = TimeBlock::new(start, end);
                        if block.minutes() > 0 {
                            vec![block]
                        } else {
                            Vec::new()
                        }
                    }
                    _ => Vec::new(),
                };
                PlanInfo {
                    date: day.iso_date,
                    blocks,
                    stored_pause_minutes: day.required_pause_minutes,
                    label: day.label.clone(),
                    branch_id: day.branch_id,
                }
            }
            PlanRecord::Segmented(seg) => {
                let mut segments: Vec<&ShiftPlanSegment> = seg.segments.iter().collect();
                segments.sort_by_key(|s| s.segment_index);

                let available: Vec<&ShiftPlanSegment> = segments
                    .iter()
                    .copied()
                    .filter(|s| s.mode == SegmentMode::Available)
                    .collect();
                let blocks = available
                    .iter()
                    .filter_map(|s| s.block())
                    .filter(|b| b.minutes() > 0)
                    .collect();
                let stored_pause_minutes = available.iter().map(|s| s.required_pause_minutes).sum();
                let label = segments
                    .iter()
                    .filter_map(|s| s.label.as_deref())
                    .find(|l| !l.trim().is_empty())
                    .map(str::to_string);
                let branch_id = available
                    .iter()
                    .chain(segments.iter())
                    .find_map(|s| s.branch_id);

                PlanInfo {
                    date: seg.iso_date,
                    blocks,
                    stored_pause_minutes,
                    label,
                    branch_id,
                }
            }
        }
    }
}

fn validate_day(day: &ShiftPlanDay) -> Result<(), PlanError> {
    if let Some(label) = day.label.as_deref() {
        if is_no_work_label(label)
            && (day.start.is_some() || day.end.is_some() || day.required_pause_minutes > 0)
        {
            return Err(PlanError::NoWorkLabelWithTimes {
                label: label.to_string(),
            });
        }
    }
    match (day.start, day.end) {
        (Some(start), Some(end)) => {
            if TimeBlock::new(start, end).minutes() == 0 {
                return Err(PlanError::SegmentEmpty { index: 0 });
            }
            Ok(())
        }
        (None, None) => Ok(()),
        _ => Err(PlanError::IncompleteTimes),
    }
}

fn validate_segments(segments: &[ShiftPlanSegment]) -> Result<(), PlanError> {
    let mut ordered: Vec<&ShiftPlanSegment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.segment_index);

    for pair in ordered.windows(2) {
        if pair[0].segment_index == pair[1].segment_index {
            return Err(PlanError::DuplicateSegmentIndex {
                index: pair[0].segment_index,
            });
        }
    }

    for segment in &ordered {
        let index = segment.segment_index;
        if let Some(label) = segment.label.as_deref() {
            if is_no_work_label(label)
                && (segment.start.is_some()
                    || segment.end.is_some()
                    || segment.required_pause_minutes > 0)
            {
                return Err(PlanError::NoWorkLabelWithTimes {
                    label: label.to_string(),
                });
            }
        }
        match (segment.start, segment.end) {
            (Some(start), Some(end)) => {
                if TimeBlock::new(start, end).minutes() == 0 {
                    return Err(PlanError::SegmentEmpty { index });
                }
            }
            (None, None) if segment.mode == SegmentMode::Available => {
                let no_work = segment.label.as_deref().map(is_no_work_label).unwrap_or(false);
                if !no_work {
                    return Err(PlanError::SegmentTimesMissing { index });
                }
            }
            (None, None) => {}
            _ => return Err(PlanError::IncompleteTimes),
        }
    }

    let timed: Vec<(u32, TimeBlock)> = ordered
        .iter()
        .filter_map(|s| s.block().map(|b| (s.segment_index, b)))
        .collect();
    for (i, (first_index, first)) in timed.iter().enumerate() {
        for (second_index, second) in timed.iter().skip(i + 1) {
            if first.overlaps(second) {
                return Err(PlanError::SegmentsOverlap {
                    first: *first_index,
                    second: *second_index,
                });
            }
        }
    }
    Ok(())
}

// --- Consolidated Plan View ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanInfo {
    pub date: NaiveDate,
    /// Working blocks in segment order; empty for days without planned work.
    pub blocks: Vec<TimeBlock>,
    pub stored_pause_minutes: u32,
    pub label: Option<String>,
    pub branch_id: Option<i64>,
}

impl PlanInfo {
    pub fn primary(&self) -> Option<&TimeBlock> {
        self.blocks.first()
    }

    pub fn secondary(&self) -> Option<&TimeBlock> {
        self.blocks.get(1)
    }

    pub fn span_minutes(&self) -> i64 {
        self.blocks.iter().map(TimeBlock::minutes).sum()
    }

    pub fn span_hours(&self) -> Decimal {
        minutes_to_hours(self.span_minutes())
    }

    /// Stored pause, raised to what the law (and policy overlay) requires for the span.
    pub fn derived_pause_minutes(&self, mandatory_pause_under6: Option<u32>) -> u32 {
        if self.blocks.is_empty() {
            return 0;
        }
        self.stored_pause_minutes
            .max(effective_pause_minutes(self.span_hours(), mandatory_pause_under6))
    }

    pub fn net_minutes(&self, mandatory_pause_under6: Option<u32>) -> i64 {
        (self.span_minutes() - i64::from(self.derived_pause_minutes(mandatory_pause_under6))).max(0)
    }

    pub fn net_hours(&self, mandatory_pause_under6: Option<u32>) -> Decimal {
        minutes_to_hours(self.net_minutes(mandatory_pause_under6))
    }

    pub fn absence_code(&self) -> Option<StatusCode> {
        self.label.as_deref().and_then(classify_label)
    }

    pub fn marks_absence(&self) -> bool {
        self.absence_code().is_some()
    }

    pub fn is_no_work(&self) -> bool {
        self.label.as_deref().map(is_no_work_label).unwrap_or(false)
    }

    /// Planned working day that expects a recorded entry.
    pub fn expects_work(&self) -> bool {
        !self.blocks.is_empty() && !self.marks_absence() && !self.is_no_work()
    }
}

// --- Label Classification ---

/// Lowercases and strips diacritics so "Überstunden" and "uberstunden" compare equal.
/// Decomposed input folds the same way as precomposed input.
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let folded = label
        .trim()
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase);
    for ch in folded {
        match ch {
            'ß' => out.push_str("ss"),
            other => out.push(other),
        }
    }
    out
}

// Evaluated in order, first match wins.
static LABEL_RULES: Lazy<Vec<(Regex, StatusCode)>> = Lazy::new(|| {
    [
        (r"unbezahlt", StatusCode::UnpaidLeave),
        (r"halb\w*\s*(tag\w*\s*)?urlaub|urlaub\s*\(?\s*halb", StatusCode::HalfVacation),
        (r"urlaub", StatusCode::Vacation),
        (r"kind\w*\s*-?\s*krank|kinderkrank", StatusCode::ChildSick),
        (r"krank", StatusCode::Sick),
        (r"kurzarbeit", StatusCode::ShortWork),
        (
            r"u(e)?berstunden|zeitausgleich|\bu\s*-?\s*abbau\b|\buest\b",
            StatusCode::OvertimeAbatement,
        ),
        (r"feiertag", StatusCode::Holiday),
    ]
    .into_iter()
    .map(|(pattern, code)| (Regex::new(pattern).expect("static regex"), code))
    .collect()
});

static NO_WORK_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(frei|kein(e|en)?\s+dienst|nicht\s+verfugbar|ruhetag)$").expect("static regex")
});

/// Absence code implied by a plan label, if any.
pub fn classify_label(label: &str) -> Option<StatusCode> {
    let normalized = normalize_label(label);
    if normalized.is_empty() {
        return None;
    }
    LABEL_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(&normalized))
        .map(|(_, code)| *code)
}

pub fn is_no_work_label(label: &str) -> bool {
    NO_WORK_LABEL.is_match(&normalize_label(label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn day(start: &str, end: &str, pause: u32, label: Option<&str>) -> ShiftPlanDay {
        ShiftPlanDay {
            iso_date: d("2025-03-03"),
            start: Some(t(start)),
            end: Some(t(end)),
            required_pause_minutes: pause,
            label: label.map(String::from),
            branch_id: Some(4),
        }
    }

    fn segment(index: u32, mode: SegmentMode, start: &str, end: &str, pause: u32) -> ShiftPlanSegment {
        ShiftPlanSegment {
            segment_index: index,
            mode,
            start: Some(t(start)),
            end: Some(t(end)),
            required_pause_minutes: pause,
            label: None,
            branch_id: None,
        }
    }

    #[test]
    fn labels_are_classified_case_and_diacritic_insensitive() {
        assert_eq!(classify_label("Urlaub"), Some(StatusCode::Vacation));
        assert_eq!(classify_label("URLAUB (genehmigt)"), Some(StatusCode::Vacation));
        assert_eq!(classify_label("halber Urlaub"), Some(StatusCode::HalfVacation));
        assert_eq!(classify_label("Krank"), Some(StatusCode::Sick));
        assert_eq!(classify_label("Kind krank"), Some(StatusCode::ChildSick));
        assert_eq!(classify_label("Kurzarbeit"), Some(StatusCode::ShortWork));
        assert_eq!(classify_label("Überstundenabbau"), Some(StatusCode::OvertimeAbatement));
        assert_eq!(classify_label("ueberstunden"), Some(StatusCode::OvertimeAbatement));
        assert_eq!(classify_label("Ü-Abbau"), Some(StatusCode::OvertimeAbatement));
        // Decomposed umlaut (U + combining diaeresis)
        assert_eq!(
            classify_label("U\u{0308}berstunden"),
            Some(StatusCode::OvertimeAbatement)
        );
        assert_eq!(normalize_label("Nicht verfu\u{0308}gbar"), "nicht verfugbar");
        assert_eq!(normalize_label("Straße"), "strasse");
        assert_eq!(classify_label("Feiertag"), Some(StatusCode::Holiday));
        assert_eq!(classify_label("unbezahlter Urlaub"), Some(StatusCode::UnpaidLeave));
        assert_eq!(classify_label("Frühschicht"), None);
        assert_eq!(classify_label("  "), None);
    }

    #[test]
    fn no_work_labels() {
        assert!(is_no_work_label("frei"));
        assert!(is_no_work_label("Kein Dienst"));
        assert!(is_no_work_label("nicht verfügbar"));
        assert!(!is_no_work_label("Freitagsschicht"));
    }

    #[test]
    fn legacy_day_view_and_pause() {
        let info = PlanRecord::Day(day("08:00", "16:30", 0, None)).to_plan_info();
        assert_eq!(info.span_minutes(), 510);
        assert_eq!(info.derived_pause_minutes(None), 30);
        assert_eq!(info.net_hours(None), dec!(8));
        assert_eq!(info.branch_id, Some(4));
        assert!(info.expects_work());

        let long = PlanRecord::Day(day("07:00", "17:00", 30, None)).to_plan_info();
        assert_eq!(long.derived_pause_minutes(None), 45);

        let stored_higher = PlanRecord::Day(day("08:00", "12:00", 15, None)).to_plan_info();
        assert_eq!(stored_higher.derived_pause_minutes(None), 15);
    }

    #[test]
    fn segments_consolidate_in_index_order() {
        let record = PlanRecord::Segmented(SegmentedPlanDay {
            iso_date: d("2025-03-04"),
            segments: vec![
                segment(2, SegmentMode::Available, "14:00", "18:00", 0),
                segment(1, SegmentMode::Available, "08:00", "12:00", 0),
                segment(3, SegmentMode::Unavailable, "19:00", "20:00", 0),
            ],
        });
        assert!(record.validate().is_ok());
        let info = record.to_plan_info();
        assert_eq!(info.blocks.len(), 2);
        assert_eq!(info.primary().unwrap().start, t("08:00"));
        assert_eq!(info.secondary().unwrap().start, t("14:00"));
        assert_eq!(info.span_minutes(), 480);
        assert_eq!(info.derived_pause_minutes(None), 30);
    }

    #[test]
    fn midnight_segments_validate() {
        let record = PlanRecord::Day(day("22:00", "06:00", 30, None));
        assert!(record.validate().is_ok());
        assert_eq!(record.to_plan_info().span_minutes(), 480);
    }

    #[test]
    fn invalid_plans_are_rejected() {
        let overlap = PlanRecord::Segmented(SegmentedPlanDay {
            iso_date: d("2025-03-04"),
            segments: vec![
                segment(1, SegmentMode::Available, "08:00", "12:30", 0),
                segment(2, SegmentMode::Available, "12:00", "16:00", 0),
            ],
        });
        assert_eq!(
            overlap.validate(),
            Err(PlanError::SegmentsOverlap { first: 1, second: 2 })
        );

        let duplicate = PlanRecord::Segmented(SegmentedPlanDay {
            iso_date: d("2025-03-04"),
            segments: vec![
                segment(1, SegmentMode::Available, "08:00", "10:00", 0),
                segment(1, SegmentMode::Available, "12:00", "16:00", 0),
            ],
        });
        assert_eq!(
            duplicate.validate(),
            Err(PlanError::DuplicateSegmentIndex { index: 1 })
        );

        let frei_with_times = PlanRecord::Day(day("08:00", "16:00", 0, Some("frei")));
        assert!(matches!(
            frei_with_times.validate(),
            Err(PlanError::NoWorkLabelWithTimes { .. })
        ));

        let empty = PlanRecord::Day(day("08:00", "08:00", 0, None));
        assert_eq!(empty.validate(), Err(PlanError::SegmentEmpty { index: 0 }));
    }

    #[test]
    fn absence_label_days_do_not_expect_work() {
        let info = PlanRecord::Day(day("08:00", "16:30", 30, Some("Urlaub"))).to_plan_info();
        assert!(info.marks_absence());
        assert!(!info.expects_work());
        assert_eq!(info.absence_code(), Some(StatusCode::Vacation));
    }
}
