// src/validator.rs
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

use crate::clock::{minutes_to_hours, round_hours};
use crate::closing::ClosingLookup;
use crate::decision::{ConfirmationReason, Confirmations, Decision};
use crate::entry::{check_revenue, ParsedSubmission, TimeEntry};
use crate::error::{rule_id, EmployeeId, ValidationError, ValidationErrorReason, ValidationWarning};
use crate::pause_law::{required_pause_minutes, PAUSE_OVER_SIX_HOURS};
use crate::profile::ValidationProfile;
use crate::reconciler::{
    classify_overtime_abatement, counted_span_minutes, entry_matches_plan, normalize_entry,
    required_entry_pause, AbatementKind,
};
use crate::shift_plan::PlanInfo;
use crate::status_code::StatusCode;

/// Half a minute of slack between required and recorded pause.
const PAUSE_TOLERANCE_MINUTES: Decimal = dec!(0.5);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Confirmable first error asks, any other error rejects.
    pub fn decision(&self) -> Decision {
        match self.first_error() {
            None => Decision::Proceed,
            Some(err) if err.reason.is_confirmable() => match err.date {
                Some(date) => {
                    Decision::NeedsConfirmation(ConfirmationReason::MealWithoutPause { date })
                }
                None => Decision::Reject(err.to_string()),
            },
            Some(err) => Decision::Reject(err.to_string()),
        }
    }
}

/// Pure entry checks against a plan, a profile and the closing state.
pub struct Validator<'a> {
    profile: &'a ValidationProfile,
    closings: &'a dyn ClosingLookup,
}

impl<'a> Validator<'a> {
    pub fn new(profile: &'a ValidationProfile, closings: &'a dyn ClosingLookup) -> Self {
        Self { profile, closings }
    }

    /// Closing gate over every affected date; runs before anything is written.
    pub fn check_dates(
        &self,
        employee_id: EmployeeId,
        dates: &[NaiveDate],
    ) -> Result<(), ValidationError> {
        match self.closings.first_closed(employee_id, dates) {
            Some(date) => Err(month_closed(date)),
            None => Ok(()),
        }
    }

    /// Validates every date of a parsed submission, plan looked up per date.
    pub fn validate_submission<F>(
        &self,
        submission: &ParsedSubmission,
        plan_for: F,
        confirmations: Confirmations,
    ) -> ValidationReport
    where
        F: Fn(NaiveDate) -> Option<PlanInfo>,
    {
        let mut report = ValidationReport {
            errors: Vec::new(),
            warnings: submission.warnings.clone(),
        };
        if let Err(err) = self.check_dates(submission.entry.employee_id, &submission.dates) {
            report.errors.push(err);
            return report;
        }
        for date in &submission.dates {
            let entry = submission.entry_for(*date);
            let plan = plan_for(*date);
            report.merge(self.validate_entry(&entry, plan.as_ref(), confirmations));
        }
        report.warnings.dedup();
        report
    }

    pub fn validate_entry(
        &self,
        entry: &TimeEntry,
        plan: Option<&PlanInfo>,
        confirmations: Confirmations,
    ) -> ValidationReport {
        debug!(
            "Validating entry: Emp={}, Date={}, Code={}",
            entry.employee_id, entry.day_date, entry.code
        );
        let mut normalized = entry.clone();
        let warnings = normalize_entry(&mut normalized, plan);
        let mut report = ValidationReport {
            errors: Vec::new(),
            warnings,
        };

        // --- Run individual validation rules ---

        report.errors.extend(self.validate_times(&normalized, plan));
        report.errors.extend(self.validate_revenue(&normalized));
        report.errors.extend(self.validate_residual_sick(&normalized, plan));
        report.errors.extend(self.validate_pause(&normalized, plan));
        self.validate_meal(&normalized, plan, confirmations, &mut report);
        if self
            .closings
            .is_closed(entry.employee_id, entry.day_date.year(), entry.day_date.month())
        {
            report.errors.push(month_closed(entry.day_date));
        }

        debug!(
            "Validation finished for Emp={}, Date={}: {} errors, {} warnings.",
            entry.employee_id,
            entry.day_date,
            report.errors.len(),
            report.warnings.len()
        );
        report
    }

    // --- Individual Rule Validation Functions ---

    fn validate_times(&self, entry: &TimeEntry, plan: Option<&PlanInfo>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let date = Some(entry.day_date);
        let policy = entry.code.policy();
        if policy.full_day_zero {
            return errors;
        }

        let abatement = classify_overtime_abatement(entry, plan);
        let full_day_abatement = abatement == Some(AbatementKind::FullDay);
        if policy.requires_time && !full_day_abatement && (entry.kommt1.is_none() || entry.geht1.is_none()) {
            errors.push(ValidationError::new(
                rule_id::R2_TIMES_REQUIRED,
                date,
                ValidationErrorReason::MissingTimes { code: entry.code },
            ));
            return errors;
        }

        let blocks = [
            (1u8, entry.kommt1, entry.geht1, entry.primary_block()),
            (2u8, entry.kommt2, entry.geht2, entry.secondary_block()),
        ];
        for (index, start, end, block) in blocks {
            if start.is_some() != end.is_some() {
                errors.push(ValidationError::new(
                    rule_id::R2_BLOCK_SHAPE,
                    date,
                    ValidationErrorReason::IncompleteBlock { block: index },
                ));
            } else if block.map(|b| b.minutes() == 0).unwrap_or(false) {
                errors.push(ValidationError::new(
                    rule_id::R2_BLOCK_SHAPE,
                    date,
                    ValidationErrorReason::EmptyBlock { block: index },
                ));
            }
        }

        if abatement == Some(AbatementKind::Partial) && entry.has_secondary() {
            errors.push(ValidationError::new(
                rule_id::R2_BLOCK_SHAPE,
                date,
                ValidationErrorReason::SecondaryBlockNotAllowed { code: entry.code },
            ));
        }
        errors
    }

    fn validate_revenue(&self, entry: &TimeEntry) -> Vec<ValidationError> {
        match entry.brutto.map(check_revenue) {
            Some(Err(reason)) => vec![ValidationError::new(
                rule_id::REVENUE,
                Some(entry.day_date),
                reason,
            )],
            _ => Vec::new(),
        }
    }

    fn validate_residual_sick(&self, entry: &TimeEntry, plan: Option<&PlanInfo>) -> Vec<ValidationError> {
        let residual = matches!(
            entry.code,
            StatusCode::SickRemainder | StatusCode::ChildSickRemainder
        );
        match plan {
            Some(plan) if residual && entry_matches_plan(entry, plan) => {
                vec![ValidationError::new(
                    rule_id::R3_RESIDUAL_SICK_UNCHANGED,
                    Some(entry.day_date),
                    ValidationErrorReason::ResidualSickOnUnchangedPlan { code: entry.code },
                )]
            }
            _ => Vec::new(),
        }
    }

    fn validate_pause(&self, entry: &TimeEntry, plan: Option<&PlanInfo>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if entry.code.policy().full_day_zero {
            return errors;
        }
        let span = entry.span_minutes();
        let provided = entry.pause.minutes();
        if span > 0 && i64::from(provided) >= span {
            errors.push(ValidationError::new(
                rule_id::R4_PAUSE_MINIMUM,
                Some(entry.day_date),
                ValidationErrorReason::PauseExceedsWorkTime {
                    pause_minutes: provided,
                    worked_minutes: span,
                },
            ));
            return errors;
        }

        let required = required_entry_pause(entry, plan, self.profile.min_pause_under6_minutes);
        if Decimal::from(required) - Decimal::from(provided) > PAUSE_TOLERANCE_MINUTES {
            debug!(
                "Pause below minimum: Emp={}, Date={}, required={}, provided={}",
                entry.employee_id, entry.day_date, required, provided
            );
            errors.push(ValidationError::new(
                rule_id::R4_PAUSE_MINIMUM,
                Some(entry.day_date),
                ValidationErrorReason::PauseBelowStatutoryMinimum {
                    worked_hours: round_hours(minutes_to_hours(span)),
                    required_minutes: required,
                    provided_minutes: provided,
                },
            ));
        }
        errors
    }

    fn validate_meal(
        &self,
        entry: &TimeEntry,
        plan: Option<&PlanInfo>,
        confirmations: Confirmations,
        report: &mut ValidationReport,
    ) {
        if entry.code.policy().meal_blocked {
            return;
        }
        if entry.mittag.is_yes() && entry.pause.minutes() == 0 {
            if confirmations.meal_without_pause {
                report.warnings.push(ValidationWarning::MealWithoutPauseConfirmed);
            } else {
                report.errors.push(ValidationError::new(
                    rule_id::R5_MEAL_WITHOUT_PAUSE,
                    Some(entry.day_date),
                    ValidationErrorReason::MealWithoutPauseUnconfirmed,
                ));
            }
        }

        let hours = minutes_to_hours(counted_span_minutes(entry, plan));
        if !entry.mittag.is_yes() && required_pause_minutes(hours) >= PAUSE_OVER_SIX_HOURS {
            report.warnings.push(ValidationWarning::MealFlagUnsetOverSixHours {
                worked_hours: round_hours(hours),
            });
        }
    }
}

fn month_closed(date: NaiveDate) -> ValidationError {
    ValidationError::new(
        rule_id::R6_MONTH_CLOSED,
        Some(date),
        ValidationErrorReason::MonthClosed {
            year: date.year(),
            month: date.month(),
            date,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closing::ClosingRegistry;
    use crate::entry::{EntryForm, MealFlag};
    use crate::shift_plan::{PlanRecord, ShiftPlanDay};
    use chrono::NaiveTime;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn plan(date: &str, start: &str, end: &str) -> PlanInfo {
        PlanRecord::Day(ShiftPlanDay {
            iso_date: d(date),
            start: Some(t(start)),
            end: Some(t(end)),
            required_pause_minutes: 0,
            label: None,
            branch_id: None,
        })
        .to_plan_info()
    }

    fn regular(date: &str, start: &str, end: &str) -> TimeEntry {
        TimeEntry::new(1, d(date), StatusCode::Regular).primary(t(start), t(end))
    }

    #[test]
    fn regular_day_with_enough_pause_passes() {
        let profile = ValidationProfile::default();
        let closings = ClosingRegistry::new();
        let validator = Validator::new(&profile, &closings);
        let entry = regular("2025-03-03", "08:00", "16:30")
            .pause_minutes(30)
            .meal(MealFlag::Ja);
        let report = validator.validate_entry(&entry, None, Confirmations::default());
        assert!(report.is_ok(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
        assert_eq!(report.decision(), Decision::Proceed);
    }

    #[test]
    fn missing_pause_cites_statute() {
        let profile = ValidationProfile::default();
        let closings = ClosingRegistry::new();
        let validator = Validator::new(&profile, &closings);
        let entry = regular("2025-03-03", "07:00", "17:00").pause_minutes(30);
        let report = validator.validate_entry(&entry, None, Confirmations::default());
        let err = report.first_error().unwrap();
        assert_eq!(err.rule_id, rule_id::R4_PAUSE_MINIMUM);
        assert!(err.to_string().contains("§4 ArbZG"));
        assert!(err.to_string().contains("45"));
        assert!(matches!(report.decision(), Decision::Reject(_)));
    }

    #[test]
    fn regular_without_times_is_rejected() {
        let profile = ValidationProfile::default();
        let closings = ClosingRegistry::new();
        let validator = Validator::new(&profile, &closings);
        let entry = TimeEntry::new(1, d("2025-03-03"), StatusCode::Regular);
        let report = validator.validate_entry(&entry, None, Confirmations::default());
        assert_eq!(report.first_error().unwrap().rule_id, rule_id::R2_TIMES_REQUIRED);
    }

    #[test]
    fn vacation_needs_no_times() {
        let profile = ValidationProfile::default();
        let closings = ClosingRegistry::new();
        let validator = Validator::new(&profile, &closings);
        let entry = TimeEntry::new(1, d("2025-03-03"), StatusCode::Vacation);
        assert!(validator
            .validate_entry(&entry, None, Confirmations::default())
            .is_ok());
    }

    #[test]
    fn residual_sick_on_unchanged_plan() {
        let profile = ValidationProfile::default();
        let closings = ClosingRegistry::new();
        let validator = Validator::new(&profile, &closings);
        let p = plan("2025-03-03", "08:00", "16:30");
        let mut entry = regular("2025-03-03", "08:00", "16:30").pause_minutes(30);
        entry.code = StatusCode::SickRemainder;
        let report = validator.validate_entry(&entry, Some(&p), Confirmations::default());
        assert_eq!(
            report.first_error().unwrap().rule_id,
            rule_id::R3_RESIDUAL_SICK_UNCHANGED
        );

        let mut shortened = regular("2025-03-03", "08:00", "11:00");
        shortened.code = StatusCode::SickRemainder;
        assert!(validator
            .validate_entry(&shortened, Some(&p), Confirmations::default())
            .is_ok());
    }

    #[test]
    fn meal_without_pause_needs_confirmation() {
        let profile = ValidationProfile::default();
        let closings = ClosingRegistry::new();
        let validator = Validator::new(&profile, &closings);
        let entry = regular("2025-03-03", "08:00", "13:00").meal(MealFlag::Ja);

        let report = validator.validate_entry(&entry, None, Confirmations::default());
        assert_eq!(
            report.decision(),
            Decision::NeedsConfirmation(ConfirmationReason::MealWithoutPause {
                date: d("2025-03-03")
            })
        );

        let confirmed = validator.validate_entry(
            &entry,
            None,
            Confirmations {
                meal_without_pause: true,
            },
        );
        assert!(confirmed.is_ok());
        assert_eq!(
            confirmed.warnings,
            vec![ValidationWarning::MealWithoutPauseConfirmed]
        );
    }

    #[test]
    fn second_block_counts_towards_pause() {
        let profile = ValidationProfile::default();
        let closings = ClosingRegistry::new();
        let validator = Validator::new(&profile, &closings);
        let entry = regular("2025-03-03", "08:00", "12:00")
            .secondary(t("13:00"), t("16:00"))
            .meal(MealFlag::Ja)
            .pause_minutes(15);
        let report = validator.validate_entry(&entry, None, Confirmations::default());
        assert_eq!(report.first_error().unwrap().rule_id, rule_id::R4_PAUSE_MINIMUM);
    }

    #[test]
    fn closed_month_blocks_whole_range() {
        let profile = ValidationProfile::default();
        let mut closings = ClosingRegistry::new();
        closings
            .close(7, 2025, 1, "admin", d("2025-02-01").and_hms_opt(8, 0, 0).unwrap())
            .unwrap();
        let validator = Validator::new(&profile, &closings);

        let form = EntryForm {
            employee_id: "7".into(),
            day_date: "2025-01-28".into(),
            range_end_date: Some("2025-02-02".into()),
            code: "U".into(),
            ..Default::default()
        };
        let parsed = form.parse().unwrap();
        let report = validator.validate_submission(&parsed, |_| None, Confirmations::default());
        assert_eq!(report.errors.len(), 1);
        let err = &report.errors[0];
        assert_eq!(err.rule_id, rule_id::R6_MONTH_CLOSED);
        assert_eq!(err.date, Some(d("2025-01-28")));
    }

    #[test]
    fn negative_revenue_is_rejected() {
        let profile = ValidationProfile::default();
        let closings = ClosingRegistry::new();
        let validator = Validator::new(&profile, &closings);
        let entry = regular("2025-03-03", "08:00", "12:00").revenue(dec!(-10));
        let report = validator.validate_entry(&entry, None, Confirmations::default());
        assert_eq!(report.first_error().unwrap().rule_id, rule_id::REVENUE);
    }

    #[test]
    fn revenue_near_decimal_max_is_rejected() {
        let profile = ValidationProfile::default();
        let closings = ClosingRegistry::new();
        let validator = Validator::new(&profile, &closings);
        let entry = regular("2025-03-03", "08:00", "12:00").revenue(Decimal::MAX);
        let report = validator.validate_entry(&entry, None, Confirmations::default());
        let err = report.first_error().unwrap();
        assert_eq!(err.rule_id, rule_id::REVENUE);
        assert!(matches!(err.reason, ValidationErrorReason::RevenueTooLarge { .. }));
    }
}
