// src/decision.rs
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::fmt;

use crate::clock::format_hhmm;
use crate::status_code::StatusCode;

/// Three-way outcome of every check that may need operator consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Decision {
    Proceed,
    NeedsConfirmation(ConfirmationReason),
    Reject(String),
}

impl Decision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Decision::Proceed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ConfirmationReason {
    /// Regular entry differs from the plan; reclassify or revert.
    PlanDeviation {
        date: NaiveDate,
        deviations: Vec<Deviation>,
        alternatives: Vec<StatusCode>,
    },
    MealWithoutPause { date: NaiveDate },
    /// Public holiday without entry: did the employee work?
    HolidayWorked { date: NaiveDate, name: String },
}

impl fmt::Display for ConfirmationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationReason::PlanDeviation {
                date,
                deviations,
                alternatives,
            } => {
                let parts: Vec<String> = deviations.iter().map(|d| d.to_string()).collect();
                let codes: Vec<&str> = alternatives.iter().map(|c| c.as_str()).collect();
                write!(
                    f,
                    "Entry on {} deviates from the shift plan ({}); choose one of {} or revert to the plan",
                    date,
                    parts.join(", "),
                    codes.join("/")
                )
            }
            ConfirmationReason::MealWithoutPause { date } => {
                write!(f, "Meal flag without pause on {}; please confirm", date)
            }
            ConfirmationReason::HolidayWorked { date, name } => {
                write!(f, "{} is a public holiday ({}); was the day worked?", date, name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum Deviation {
    Start {
        #[serde(serialize_with = "ser_time")]
        planned: Option<NaiveTime>,
        #[serde(serialize_with = "ser_time")]
        actual: Option<NaiveTime>,
    },
    End {
        #[serde(serialize_with = "ser_time")]
        planned: Option<NaiveTime>,
        #[serde(serialize_with = "ser_time")]
        actual: Option<NaiveTime>,
    },
    SecondBlock,
    Pause { planned: u32, actual: u32 },
}

fn ser_time<S: serde::Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
    crate::clock::opt_hhmm::serialize(time, s)
}

fn show(time: &Option<NaiveTime>) -> String {
    time.map(format_hhmm).unwrap_or_else(|| "--:--".to_string())
}

impl fmt::Display for Deviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deviation::Start { planned, actual } => {
                write!(f, "start {} instead of {}", show(actual), show(planned))
            }
            Deviation::End { planned, actual } => {
                write!(f, "end {} instead of {}", show(actual), show(planned))
            }
            Deviation::SecondBlock => f.write_str("second time block differs"),
            Deviation::Pause { planned, actual } => {
                write!(f, "pause {} min instead of {} min", actual, planned)
            }
        }
    }
}

/// Operator answer to a plan deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(tag = "action", content = "code", rename_all = "snake_case")]
pub enum Resolution {
    Reclassify(StatusCode),
    RevertToPlan,
}

/// Consents already given for the current submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Confirmations {
    pub meal_without_pause: bool,
}
