// src/error.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::status_code::StatusCode;

pub type EmployeeId = i64;

// --- Validation Error Types ---

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationErrorReason {
    #[error("Employee id is required")]
    MissingEmployee,
    #[error("Employee id '{value}' is not a valid number")]
    MalformedEmployee { value: String },
    #[error("Date is required")]
    MissingDate,
    #[error("Date '{value}' is not a valid ISO date (YYYY-MM-DD)")]
    MalformedDate { value: String },
    #[error("Range end {end} lies before range start {start}")]
    RangeEndBeforeStart { start: NaiveDate, end: NaiveDate },
    #[error("Range of {days} days exceeds the maximum of {max_days} days")]
    RangeTooLong { days: i64, max_days: i64 },
    #[error("Month {month:02}/{year} is closed, no changes are possible (affected date {date})")]
    MonthClosed { year: i32, month: u32, date: NaiveDate },
    #[error("Status code '{value}' is unknown")]
    UnknownStatusCode { value: String },
    #[error("Time '{value}' in field {field} is not a valid HH:MM time")]
    MalformedTime { field: String, value: String },
    #[error("Pause '{value}' must be a number of minutes or 'keine'")]
    MalformedPause { value: String },
    #[error("Meal flag '{value}' must be 'Ja' or 'Nein'")]
    MalformedMealFlag { value: String },
    #[error("Revenue '{value}' is not a valid amount")]
    MalformedRevenue { value: String },
    #[error("Revenue must not be negative (got {amount})")]
    NegativeRevenue { amount: Decimal },
    #[error("Revenue of {amount} exceeds the daily maximum of {max}")]
    RevenueTooLarge { amount: Decimal, max: Decimal },
    #[error("Code {code} requires start and end of the first time block")]
    MissingTimes { code: StatusCode },
    #[error("Time block {block} needs both start and end")]
    IncompleteBlock { block: u8 },
    #[error("Time block {block} has identical start and end")]
    EmptyBlock { block: u8 },
    #[error("Code {code} does not allow a second time block")]
    SecondaryBlockNotAllowed { code: StatusCode },
    #[error("Code {code} applied to the unchanged planned shift is contradictory; record the hours actually worked or use the full-day sick code")]
    ResidualSickOnUnchangedPlan { code: StatusCode },
    #[error("Per §4 ArbZG a working time of {worked_hours}h requires at least {required_minutes} minutes pause (recorded: {provided_minutes})")]
    PauseBelowStatutoryMinimum {
        worked_hours: Decimal,
        required_minutes: u32,
        provided_minutes: u32,
    },
    #[error("Pause of {pause_minutes} minutes is not shorter than the recorded working time of {worked_minutes} minutes")]
    PauseExceedsWorkTime {
        pause_minutes: u32,
        worked_minutes: i64,
    },
    #[error("Meal flag is set although no pause was recorded; please confirm")]
    MealWithoutPauseUnconfirmed,
}

impl ValidationErrorReason {
    /// Errors the operator may lift by explicit confirmation.
    pub fn is_confirmable(&self) -> bool {
        matches!(self, ValidationErrorReason::MealWithoutPauseUnconfirmed)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Validation failed{} for rule '{rule_id}': {reason}", .date.map(|d| format!(" on {}", d)).unwrap_or_default())]
pub struct ValidationError {
    pub rule_id: String,
    pub date: Option<NaiveDate>,
    pub reason: ValidationErrorReason,
}

impl ValidationError {
    pub fn new(rule_id: &str, date: Option<NaiveDate>, reason: ValidationErrorReason) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            date,
            reason,
        }
    }
}

// Non-blocking findings
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationWarning {
    #[error("{worked_hours}h recorded but the meal flag is not set")]
    MealFlagUnsetOverSixHours { worked_hours: Decimal },
    #[error("Meal flag without pause confirmed by operator")]
    MealWithoutPauseConfirmed,
    #[error("Code {code} is a full-day code; times, pause, meal flag and revenue were cleared")]
    FullDayFieldsCleared { code: StatusCode },
    #[error("Overtime abatement covers the planned shift; pause, meal flag and revenue were cleared")]
    OvertimeAbatementFullDay,
    #[error("A range end date is not supported for code {code} and was ignored")]
    RangeIgnoredForCode { code: StatusCode },
}

// --- Rule Identifiers ---
pub mod rule_id {
    pub const R1_EMPLOYEE: &str = "R1_EMPLOYEE";
    pub const R1_DATE: &str = "R1_DATE";
    pub const R1_RANGE: &str = "R1_RANGE";
    pub const R1_FIELD_FORMAT: &str = "R1_FIELD_FORMAT";
    pub const R2_TIMES_REQUIRED: &str = "R2_TIMES_REQUIRED";
    pub const R2_BLOCK_SHAPE: &str = "R2_BLOCK_SHAPE";
    pub const R3_RESIDUAL_SICK_UNCHANGED: &str = "R3_RESIDUAL_SICK_UNCHANGED";
    pub const R4_PAUSE_MINIMUM: &str = "R4_PAUSE_MINIMUM";
    pub const R5_MEAL_WITHOUT_PAUSE: &str = "R5_MEAL_WITHOUT_PAUSE";
    pub const R6_MONTH_CLOSED: &str = "R6_MONTH_CLOSED";
    pub const REVENUE: &str = "REVENUE";
}

// --- Plan Errors ---

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PlanError {
    #[error("Segment {index}: start and end are required for an available segment")]
    SegmentTimesMissing { index: u32 },
    #[error("Segment {index}: start must lie before end")]
    SegmentEmpty { index: u32 },
    #[error("Segments {first} and {second} overlap")]
    SegmentsOverlap { first: u32, second: u32 },
    #[error("Segment index {index} is used more than once")]
    DuplicateSegmentIndex { index: u32 },
    #[error("Plan label '{label}' marks a day without work; start, end and pause must be empty")]
    NoWorkLabelWithTimes { label: String },
    #[error("Plan needs both start and end or neither")]
    IncompleteTimes,
}

// --- Engine Errors ---

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Submission stopped at {date}: {source} (already saved: {})", format_dates(.persisted))]
    RangeAborted {
        date: NaiveDate,
        persisted: Vec<NaiveDate>,
        #[source]
        source: Box<EngineError>,
    },
    #[error("Invalid shift plan for {date}: {reason}")]
    InvalidPlan { date: NaiveDate, reason: PlanError },
    #[error("Month {month:02}/{year} is already closed for employee {employee_id}")]
    MonthAlreadyClosed {
        employee_id: EmployeeId,
        year: i32,
        month: u32,
    },
    #[error("Month {month:02}/{year} is not closed for employee {employee_id}")]
    MonthNotClosed {
        employee_id: EmployeeId,
        year: i32,
        month: u32,
    },
    #[error("Month {month:02}/{year} is closed for employee {employee_id}")]
    MonthClosed {
        employee_id: EmployeeId,
        year: i32,
        month: u32,
    },
    #[error("No time entry for employee {employee_id} on {date}")]
    EntryNotFound {
        employee_id: EmployeeId,
        date: NaiveDate,
    },
    #[error("The entry on {date} is derived from the shift plan and cannot be deleted")]
    SyntheticEntryNotDeletable { date: NaiveDate },
    #[error("{code} is not offered for resolving a plan deviation")]
    InvalidResolution { code: StatusCode },
    #[error("Invalid month {month}/{year}")]
    InvalidMonth { year: i32, month: u32 },
    #[error("Unknown federal state '{0}'")]
    UnknownRegion(String),
    #[error("Store error: {0}")]
    Store(String),
}

fn format_dates(dates: &[NaiveDate]) -> String {
    if dates.is_empty() {
        return "none".to_string();
    }
    dates
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
