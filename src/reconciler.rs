// src/reconciler.rs
// Plan vs. actual: form defaults, deviation detection, Ü classification, synthetic and holiday days.
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::clock::{minutes_to_hours, round_hours, TimeBlock};
use crate::decision::{ConfirmationReason, Decision, Deviation, Resolution};
use crate::entry::{MealFlag, PauseInput, TimeEntry};
use crate::error::{EmployeeId, ValidationWarning};
use crate::holidays::{FederalState, HolidayCalendar};
use crate::pause_law::{effective_pause_minutes, required_pause_minutes, PAUSE_OVER_SIX_HOURS};
use crate::shift_plan::PlanInfo;
use crate::status_code::StatusCode;

/// Codes offered when a regular entry diverges from its plan.
pub const DEVIATION_ALTERNATIVES: [StatusCode; 4] = [
    StatusCode::OvertimeAbatement,
    StatusCode::SickRemainder,
    StatusCode::ChildSickRemainder,
    StatusCode::HalfVacation,
];

// --- Form Defaults ---

#[derive(Debug, Clone, Copy)]
pub struct DefaultsRequest<'a> {
    pub plan: Option<&'a PlanInfo>,
    pub date: NaiveDate,
    pub requires_meal_flag: bool,
    pub mandatory_pause_under6: Option<u32>,
    pub user_overrode_pause: bool,
    pub current_pause: PauseInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryDefaults {
    #[serde(with = "crate::clock::opt_hhmm")]
    pub start: Option<NaiveTime>,
    #[serde(with = "crate::clock::opt_hhmm")]
    pub end: Option<NaiveTime>,
    #[serde(with = "crate::clock::opt_hhmm")]
    pub second_start: Option<NaiveTime>,
    #[serde(with = "crate::clock::opt_hhmm")]
    pub second_end: Option<NaiveTime>,
    pub pause: PauseInput,
    pub meal: MealFlag,
    pub has_plan: bool,
}

/// Prefill values for the entry form on a planned day.
pub fn compute_defaults(request: &DefaultsRequest<'_>) -> EntryDefaults {
    let plan = match request.plan.filter(|p| p.date == request.date && !p.blocks.is_empty()) {
        Some(plan) => plan,
        None => {
            return EntryDefaults {
                start: None,
                end: None,
                second_start: None,
                second_end: None,
                pause: request.current_pause,
                meal: if request.requires_meal_flag {
                    MealFlag::Ja
                } else {
                    MealFlag::Nein
                },
                has_plan: false,
            }
        }
    };

    let pause = if request.user_overrode_pause {
        request.current_pause
    } else {
        match plan.derived_pause_minutes(request.mandatory_pause_under6) {
            0 => PauseInput::None,
            minutes => PauseInput::Minutes(minutes),
        }
    };
    let over_six = required_pause_minutes(plan.span_hours()) >= PAUSE_OVER_SIX_HOURS;
    let meal = if request.requires_meal_flag || over_six {
        MealFlag::Ja
    } else {
        MealFlag::Nein
    };

    EntryDefaults {
        start: plan.primary().map(|b| b.start),
        end: plan.primary().map(|b| b.end),
        second_start: plan.secondary().map(|b| b.start),
        second_end: plan.secondary().map(|b| b.end),
        pause,
        meal,
        has_plan: true,
    }
}

// --- Deviation Detection ---

/// Differences between a regular entry and its plan. Other codes never deviate.
pub fn detect_deviation(
    entry: &TimeEntry,
    plan: Option<&PlanInfo>,
    mandatory_pause_under6: Option<u32>,
) -> Vec<Deviation> {
    let plan = match plan {
        Some(plan) if entry.code == StatusCode::Regular && !plan.blocks.is_empty() => plan,
        _ => return Vec::new(),
    };

    let mut deviations = Vec::new();
    let planned_primary = plan.primary();
    let planned_start = planned_primary.map(|b| b.start);
    let planned_end = planned_primary.map(|b| b.end);
    if entry.kommt1 != planned_start {
        deviations.push(Deviation::Start {
            planned: planned_start,
            actual: entry.kommt1,
        });
    }
    if entry.geht1 != planned_end {
        deviations.push(Deviation::End {
            planned: planned_end,
            actual: entry.geht1,
        });
    }

    let actual_second = if entry.has_secondary() {
        Some((entry.kommt2, entry.geht2))
    } else {
        None
    };
    let planned_second = plan.secondary().map(|b| (Some(b.start), Some(b.end)));
    if actual_second != planned_second {
        deviations.push(Deviation::SecondBlock);
    }

    let planned_pause = plan.derived_pause_minutes(mandatory_pause_under6);
    if entry.pause.minutes() != planned_pause {
        deviations.push(Deviation::Pause {
            planned: planned_pause,
            actual: entry.pause.minutes(),
        });
    }
    deviations
}

pub fn check_plan_deviation(
    entry: &TimeEntry,
    plan: Option<&PlanInfo>,
    mandatory_pause_under6: Option<u32>,
) -> Decision {
    let deviations = detect_deviation(entry, plan, mandatory_pause_under6);
    if deviations.is_empty() {
        return Decision::Proceed;
    }
    debug!(
        employee_id = entry.employee_id,
        date = %entry.day_date,
        count = deviations.len(),
        "Entry deviates from shift plan"
    );
    Decision::NeedsConfirmation(ConfirmationReason::PlanDeviation {
        date: entry.day_date,
        deviations,
        alternatives: DEVIATION_ALTERNATIVES.to_vec(),
    })
}

/// Turns the operator's answer to a deviation into the entry to persist.
pub fn apply_resolution(
    entry: &TimeEntry,
    plan: Option<&PlanInfo>,
    resolution: Resolution,
    mandatory_pause_under6: Option<u32>,
) -> TimeEntry {
    let mut resolved = entry.clone();
    match resolution {
        Resolution::Reclassify(code) => {
            resolved.code = code;
        }
        Resolution::RevertToPlan => {
            let planned = plan.filter(|p| !p.blocks.is_empty());
            resolved.kommt1 = planned.and_then(PlanInfo::primary).map(|b| b.start);
            resolved.geht1 = planned.and_then(PlanInfo::primary).map(|b| b.end);
            resolved.kommt2 = planned.and_then(PlanInfo::secondary).map(|b| b.start);
            resolved.geht2 = planned.and_then(PlanInfo::secondary).map(|b| b.end);
            resolved.pause = match planned.map(|p| p.derived_pause_minutes(mandatory_pause_under6)) {
                Some(minutes) if minutes > 0 => PauseInput::Minutes(minutes),
                _ => PauseInput::None,
            };
        }
    }
    resolved
}

// --- Overtime Abatement ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbatementKind {
    /// Whole planned day taken off against the overtime balance.
    FullDay,
    /// Worked part of the day, the rest is abated.
    Partial,
}

fn matches_plan_primary(entry: &TimeEntry, plan: Option<&PlanInfo>) -> bool {
    match (entry.primary_block(), plan.and_then(PlanInfo::primary)) {
        (Some(actual), Some(planned)) => actual == *planned,
        _ => false,
    }
}

/// Primary minutes that count as worked; zero when an Ü day copies the plan.
pub fn effective_primary_minutes(entry: &TimeEntry, plan: Option<&PlanInfo>) -> i64 {
    if entry.code == StatusCode::OvertimeAbatement
        && !entry.has_secondary()
        && matches_plan_primary(entry, plan)
    {
        return 0;
    }
    entry.primary_block().map(|b| b.minutes()).unwrap_or(0)
}

pub fn classify_overtime_abatement(entry: &TimeEntry, plan: Option<&PlanInfo>) -> Option<AbatementKind> {
    if entry.code != StatusCode::OvertimeAbatement {
        return None;
    }
    if entry.primary_block().is_none() && !entry.has_secondary() {
        return Some(AbatementKind::FullDay);
    }
    if effective_primary_minutes(entry, plan) == 0 && !entry.has_secondary() {
        Some(AbatementKind::FullDay)
    } else {
        Some(AbatementKind::Partial)
    }
}

/// Forces the field shape a code allows. Returns what was changed as warnings.
pub fn normalize_entry(entry: &mut TimeEntry, plan: Option<&PlanInfo>) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let code = entry.code;

    if code.policy().full_day_zero {
        let carries_fields = entry.has_any_time()
            || entry.pause.minutes() > 0
            || entry.mittag.is_yes()
            || entry.brutto.is_some();
        if carries_fields {
            entry.clear_times();
            warnings.push(ValidationWarning::FullDayFieldsCleared { code });
        }
        return warnings;
    }

    if classify_overtime_abatement(entry, plan) == Some(AbatementKind::FullDay) {
        entry.pause = PauseInput::None;
        entry.mittag = MealFlag::Nein;
        entry.brutto = None;
        warnings.push(ValidationWarning::OvertimeAbatementFullDay);
    }
    warnings
}

/// Gross minutes that count for the day: both blocks, or the Ü primary block after the plan-copy rule.
pub fn counted_span_minutes(entry: &TimeEntry, plan: Option<&PlanInfo>) -> i64 {
    if entry.code.policy().full_day_zero {
        return 0;
    }
    if entry.code == StatusCode::OvertimeAbatement {
        effective_primary_minutes(entry, plan)
    } else {
        entry.span_minutes()
    }
}

/// Worked minutes after pause.
pub fn worked_minutes(entry: &TimeEntry, plan: Option<&PlanInfo>) -> i64 {
    let gross = counted_span_minutes(entry, plan);
    if gross == 0 {
        return 0;
    }
    (gross - i64::from(entry.pause.minutes())).max(0)
}

/// Pause the law demands for the entry's counted span.
pub fn required_entry_pause(
    entry: &TimeEntry,
    plan: Option<&PlanInfo>,
    mandatory_pause_under6: Option<u32>,
) -> u32 {
    let gross = counted_span_minutes(entry, plan);
    if gross == 0 {
        return 0;
    }
    effective_pause_minutes(minutes_to_hours(gross), mandatory_pause_under6)
}

// --- Synthetic Days ---

/// Read-only virtual entry for a plan-only absence day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticDay {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub code: StatusCode,
    pub plan_hours: Decimal,
    pub label: String,
}

pub fn derive_synthetic_day(
    employee_id: EmployeeId,
    plan: &PlanInfo,
    mandatory_pause_under6: Option<u32>,
) -> Option<SyntheticDay> {
    let code = plan.absence_code()?;
    Some(SyntheticDay {
        employee_id,
        date: plan.date,
        code,
        plan_hours: round_hours(plan.net_hours(mandatory_pause_under6)),
        label: plan.label.clone().unwrap_or_default(),
    })
}

/// Code that governs a day: the real entry, else the plan label.
pub fn effective_code(entry: Option<&TimeEntry>, plan: Option<&PlanInfo>) -> Option<StatusCode> {
    entry
        .map(|e| e.code)
        .or_else(|| plan.and_then(PlanInfo::absence_code))
}

// --- Holidays ---

/// Asks whether an unrecorded public holiday was worked.
pub fn holiday_decision(
    calendar: &dyn HolidayCalendar,
    region: FederalState,
    date: NaiveDate,
    has_entry: bool,
    plan: Option<&PlanInfo>,
) -> Decision {
    if has_entry || plan.map(PlanInfo::marks_absence).unwrap_or(false) {
        return Decision::Proceed;
    }
    let info = calendar.is_holiday(date, region);
    if !info.is_holiday {
        return Decision::Proceed;
    }
    Decision::NeedsConfirmation(ConfirmationReason::HolidayWorked {
        date,
        name: info.name.unwrap_or_else(|| "Feiertag".to_string()),
    })
}

/// The FT entry stored when a holiday was not worked.
pub fn holiday_entry(employee_id: EmployeeId, date: NaiveDate) -> TimeEntry {
    TimeEntry::new(employee_id, date, StatusCode::Holiday)
}

/// True when both entry blocks equal the planned blocks.
pub fn entry_matches_plan(entry: &TimeEntry, plan: &PlanInfo) -> bool {
    let actual: Vec<TimeBlock> = entry
        .primary_block()
        .into_iter()
        .chain(entry.secondary_block())
        .collect();
    !actual.is_empty() && actual == plan.blocks
}
