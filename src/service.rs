// src/service.rs
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

use crate::balance::{
    build_day_rows, find_gaps, month_bounds, monthly_gross, recompute, BalanceTotals,
    DayComputation, MonthlyReport,
};
use crate::bonus::{net_revenue, BonusComputation, BonusEngine, BonusSettlement};
use crate::closing::ClosingLookup;
use crate::decision::{ConfirmationReason, Confirmations, Decision, Resolution};
use crate::entry::{EntryForm, ParsedSubmission, PauseInput};
use crate::error::{EmployeeId, EngineError, ValidationWarning};
use crate::holidays::{GermanHolidayCalendar, HolidayCalendar};
use crate::profile::ValidationProfile;
use crate::reconciler::{
    apply_resolution, check_plan_deviation, compute_defaults, derive_synthetic_day,
    holiday_decision, holiday_entry, normalize_entry, DefaultsRequest, EntryDefaults,
    DEVIATION_ALTERNATIVES,
};
use crate::shift_plan::{PlanInfo, PlanRecord};
use crate::status_code::StatusCode;
use crate::store::{EmployeeSettings, WorkTimeStore};
use crate::validator::{ValidationReport, Validator};

// --- Outbound Shapes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Error,
}

/// `{status, message}` returned for every single operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub status: OperationStatus,
    pub message: String,
}

impl OperationResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }
}

impl From<&EngineError> for OperationResult {
    fn from(err: &EngineError) -> Self {
        OperationResult::error(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Saved {
        dates: Vec<NaiveDate>,
        warnings: Vec<ValidationWarning>,
        reports: Vec<MonthlyReport>,
    },
    NeedsConfirmation {
        reason: ConfirmationReason,
    },
}

impl SubmitOutcome {
    pub fn to_operation_result(&self) -> OperationResult {
        match self {
            SubmitOutcome::Saved { dates, warnings, .. } => {
                let mut message = match dates.as_slice() {
                    [single] => format!("Entry for {} saved", single),
                    [first, .., last] => {
                        format!("{} entries from {} to {} saved", dates.len(), first, last)
                    }
                    [] => "Nothing to save".to_string(),
                };
                for warning in warnings {
                    message.push_str(&format!("; {}", warning));
                }
                OperationResult::success(message)
            }
            SubmitOutcome::NeedsConfirmation { reason } => OperationResult::error(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormCheck {
    #[serde(skip)]
    pub submission: ParsedSubmission,
    pub report: ValidationReport,
    pub decision: Decision,
}

// --- Service ---

/// Entry points for every mutation and report, over a `WorkTimeStore`.
pub struct WorkTimeService<S: WorkTimeStore> {
    store: S,
    calendar: Box<dyn HolidayCalendar>,
}

impl<S: WorkTimeStore> WorkTimeService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            calendar: Box::new(GermanHolidayCalendar),
        }
    }

    pub fn with_calendar(store: S, calendar: Box<dyn HolidayCalendar>) -> Self {
        Self { store, calendar }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn settings(&self, employee_id: EmployeeId) -> EmployeeSettings {
        self.store.settings(employee_id).unwrap_or_else(|| EmployeeSettings {
            employee_id,
            profile: self.store.profile(employee_id),
            ..Default::default()
        })
    }

    pub fn plan_info(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<PlanInfo> {
        self.store
            .plan(employee_id, date)
            .map(|record| record.to_plan_info())
    }

    fn ensure_open(&self, employee_id: EmployeeId, date: NaiveDate) -> Result<(), EngineError> {
        if self.store.is_closed(employee_id, date.year(), date.month()) {
            warn!(
                "Rejected change for Emp={} on {}: month is closed",
                employee_id, date
            );
            return Err(EngineError::MonthClosed {
                employee_id,
                year: date.year(),
                month: date.month(),
            });
        }
        Ok(())
    }

    pub fn entry_defaults(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
        user_overrode_pause: bool,
        current_pause: PauseInput,
    ) -> EntryDefaults {
        let profile = self.store.profile(employee_id);
        let plan = self.plan_info(employee_id, date);
        compute_defaults(&DefaultsRequest {
            plan: plan.as_ref(),
            date,
            requires_meal_flag: profile.requires_meal_flag,
            mandatory_pause_under6: profile.min_pause_under6_minutes,
            user_overrode_pause,
            current_pause,
        })
    }

    // --- Submission Pipeline ---

    /// Parses and validates a form without writing anything.
    pub fn validate_form(
        &self,
        form: &EntryForm,
        confirmations: Confirmations,
    ) -> Result<FormCheck, EngineError> {
        let submission = form.parse()?;
        Ok(self.check_submission(submission, confirmations, true))
    }

    fn check_submission(
        &self,
        submission: ParsedSubmission,
        confirmations: Confirmations,
        check_deviation: bool,
    ) -> FormCheck {
        let employee_id = submission.entry.employee_id;
        let profile = self.store.profile(employee_id);
        let validator = Validator::new(&profile, &self.store);
        let report = validator.validate_submission(
            &submission,
            |date| self.plan_info(employee_id, date),
            confirmations,
        );

        let mut decision = report.decision();
        if decision.is_proceed() && check_deviation && submission.dates.len() == 1 {
            let entry = &submission.entry;
            let plan = self.plan_info(employee_id, entry.day_date);
            decision = check_plan_deviation(entry, plan.as_ref(), profile.min_pause_under6_minutes);
        }
        FormCheck {
            submission,
            report,
            decision,
        }
    }

    pub fn submit_entry(
        &mut self,
        form: &EntryForm,
        confirmations: Confirmations,
    ) -> Result<SubmitOutcome, EngineError> {
        let submission = form.parse()?;
        self.process(submission, confirmations, true)
    }

    /// Re-submits a deviating regular entry after the operator chose how to resolve it.
    /// Reclassifying is limited to the offered alternatives, so RA cannot bypass the prompt.
    pub fn submit_with_resolution(
        &mut self,
        form: &EntryForm,
        resolution: Resolution,
        confirmations: Confirmations,
    ) -> Result<SubmitOutcome, EngineError> {
        if let Resolution::Reclassify(code) = resolution {
            if !DEVIATION_ALTERNATIVES.contains(&code) {
                warn!("Rejected resolution to {}: not a deviation alternative", code);
                return Err(EngineError::InvalidResolution { code });
            }
        }
        let mut submission = form.parse()?;
        let employee_id = submission.entry.employee_id;
        let profile = self.store.profile(employee_id);
        let plan = self.plan_info(employee_id, submission.entry.day_date);
        submission.entry = apply_resolution(
            &submission.entry,
            plan.as_ref(),
            resolution,
            profile.min_pause_under6_minutes,
        );
        info!(
            "Deviation resolved for Emp={} on {}: {:?}",
            employee_id, submission.entry.day_date, resolution
        );
        self.process(submission, confirmations, false)
    }

    fn process(
        &mut self,
        submission: ParsedSubmission,
        confirmations: Confirmations,
        check_deviation: bool,
    ) -> Result<SubmitOutcome, EngineError> {
        let employee_id = submission.entry.employee_id;
        let is_range = submission.dates.len() > 1;
        {
            let profile = self.store.profile(employee_id);
            Validator::new(&profile, &self.store)
                .check_dates(employee_id, &submission.dates)
                .map_err(|err| {
                    warn!("Submission rejected for Emp={}: {}", employee_id, err);
                    wrap_range(is_range, err.date, err.into())
                })?;
        }

        let check = self.check_submission(submission, confirmations, check_deviation);
        match check.decision {
            Decision::Proceed => {}
            Decision::NeedsConfirmation(reason) => {
                info!(
                    "Submission for Emp={} needs confirmation: {}",
                    employee_id, reason
                );
                return Ok(SubmitOutcome::NeedsConfirmation { reason });
            }
            Decision::Reject(message) => {
                warn!("Submission rejected for Emp={}: {}", employee_id, message);
                let err = check
                    .report
                    .errors
                    .into_iter()
                    .next()
                    .map(EngineError::from)
                    .unwrap_or(EngineError::Store(message));
                let date = match &err {
                    EngineError::Validation(v) => v.date,
                    _ => None,
                };
                return Err(wrap_range(is_range, date, err));
            }
        }

        let submission = check.submission;
        let mut persisted = Vec::with_capacity(submission.dates.len());
        for date in &submission.dates {
            let mut entry = submission.entry_for(*date);
            let plan = self.plan_info(employee_id, *date);
            normalize_entry(&mut entry, plan.as_ref());
            if let Err(err) = self.store.upsert_entry(entry) {
                error!("Persisting entry for Emp={} on {} failed: {}", employee_id, date, err);
                return Err(EngineError::RangeAborted {
                    date: *date,
                    persisted,
                    source: Box::new(err),
                });
            }
            persisted.push(*date);
        }
        info!(
            "Saved {} entr{} for Emp={} ({} warnings)",
            persisted.len(),
            if persisted.len() == 1 { "y" } else { "ies" },
            employee_id,
            check.report.warnings.len()
        );

        let reports = self.recompute_months(employee_id, &persisted)?;
        Ok(SubmitOutcome::Saved {
            dates: persisted,
            warnings: check.report.warnings,
            reports,
        })
    }

    fn recompute_months(
        &self,
        employee_id: EmployeeId,
        dates: &[NaiveDate],
    ) -> Result<Vec<MonthlyReport>, EngineError> {
        let months: BTreeSet<(i32, u32)> = dates.iter().map(|d| (d.year(), d.month())).collect();
        months
            .into_iter()
            .map(|(year, month)| self.recompute_month(employee_id, year, month))
            .collect()
    }

    pub fn delete_entry(
        &mut self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<OperationResult, EngineError> {
        self.ensure_open(employee_id, date)?;
        if self.store.entry(employee_id, date).is_none() {
            let profile = self.store.profile(employee_id);
            let synthetic = self.plan_info(employee_id, date).and_then(|plan| {
                derive_synthetic_day(employee_id, &plan, profile.min_pause_under6_minutes)
            });
            if synthetic.is_some() {
                warn!("Refused to delete synthetic day for Emp={} on {}", employee_id, date);
                return Err(EngineError::SyntheticEntryNotDeletable { date });
            }
            return Err(EngineError::EntryNotFound { employee_id, date });
        }
        let removed = self.store.remove_entry(employee_id, date)?;
        info!("Deleted {} entry for Emp={} on {}", removed.code, employee_id, date);
        self.recompute_month(employee_id, date.year(), date.month())?;
        Ok(OperationResult::success(format!("Entry for {} deleted", date)))
    }

    pub fn save_plan_day(
        &mut self,
        employee_id: EmployeeId,
        plan: PlanRecord,
    ) -> Result<OperationResult, EngineError> {
        let date = plan.date();
        plan.validate()
            .map_err(|reason| EngineError::InvalidPlan { date, reason })?;
        self.ensure_open(employee_id, date)?;
        self.store.save_plan(employee_id, plan)?;
        info!("Saved shift plan for Emp={} on {}", employee_id, date);
        self.recompute_month(employee_id, date.year(), date.month())?;
        Ok(OperationResult::success(format!("Shift plan for {} saved", date)))
    }

    // --- Holidays ---

    pub fn holiday_decision(&self, employee_id: EmployeeId, date: NaiveDate) -> Decision {
        let profile = self.store.profile(employee_id);
        let plan = self.plan_info(employee_id, date);
        holiday_decision(
            self.calendar.as_ref(),
            profile.federal_state,
            date,
            self.store.entry(employee_id, date).is_some(),
            plan.as_ref(),
        )
    }

    /// Records FT when the holiday was not worked; a worked holiday stays open for a normal entry.
    pub fn resolve_holiday(
        &mut self,
        employee_id: EmployeeId,
        date: NaiveDate,
        worked: bool,
    ) -> Result<OperationResult, EngineError> {
        self.ensure_open(employee_id, date)?;
        if worked {
            debug!("Holiday {} marked as worked for Emp={}", date, employee_id);
            return Ok(OperationResult::success(format!(
                "{} left open for a regular entry",
                date
            )));
        }
        self.store.upsert_entry(holiday_entry(employee_id, date))?;
        info!("Recorded {} for Emp={} on {}", StatusCode::Holiday, employee_id, date);
        self.recompute_month(employee_id, date.year(), date.month())?;
        Ok(OperationResult::success(format!("Holiday recorded for {}", date)))
    }

    // --- Recomputation ---

    pub fn recompute_month(
        &self,
        employee_id: EmployeeId,
        year: i32,
        month: u32,
    ) -> Result<MonthlyReport, EngineError> {
        let (first, last) = month_bounds(year, month)?;
        let settings = self.settings(employee_id);
        let under6 = settings.profile.min_pause_under6_minutes;

        let entries = self.store.entries_until(employee_id, last);
        let plans: Vec<PlanInfo> = self
            .store
            .plans_until(employee_id, last)
            .iter()
            .map(PlanRecord::to_plan_info)
            .collect();
        let rows = build_day_rows(employee_id, &entries, &plans, under6);
        let payouts: Vec<Decimal> = self
            .store
            .payouts_until(employee_id, year, month)
            .into_iter()
            .map(|e| e.payout)
            .collect();
        let monthly_bonus: Vec<Decimal> = monthly_gross(&rows)
            .into_values()
            .map(|gross| settings.bonus_scheme.compute(net_revenue(gross)).bonus)
            .collect();
        let balance = recompute(&settings.baseline, &rows, &monthly_bonus, &payouts);

        let days: Vec<DayComputation> = rows
            .into_iter()
            .filter(|r| r.date >= first && r.date <= last)
            .collect();
        let totals = BalanceTotals::from_rows(&days);
        let region = settings.profile.federal_state;
        let (missing_dates, pending_holidays) = find_gaps(&plans, &days, first, last, |date| {
            let info = self.calendar.is_holiday(date, region);
            if info.is_holiday {
                info.name
            } else {
                None
            }
        });

        info!(
            "Recomputed {:02}/{} for Emp={}: {} days, delta={}h, balance={}h, {} gaps",
            month,
            year,
            employee_id,
            days.len(),
            totals.overtime_delta,
            balance.net_hours(),
            missing_dates.len()
        );
        Ok(MonthlyReport {
            employee_id,
            year,
            month,
            days,
            totals,
            balance,
            missing_dates,
            pending_holidays,
        })
    }

    // --- Bonus ---

    pub fn settle_bonus(
        &mut self,
        employee_id: EmployeeId,
        year: i32,
        month: u32,
        requested_payout: Option<Decimal>,
    ) -> Result<(BonusComputation, BonusSettlement), EngineError> {
        month_bounds(year, month)?;
        if self.store.is_closed(employee_id, year, month) {
            return Err(EngineError::MonthClosed {
                employee_id,
                year,
                month,
            });
        }
        let report = self.recompute_month(employee_id, year, month)?;
        let scheme = self.settings(employee_id).bonus_scheme;
        BonusEngine::new(&mut self.store).settle_month(
            &scheme,
            employee_id,
            year,
            month,
            report.totals.net_revenue,
            requested_payout,
        )
    }

    // --- Closing ---

    pub fn close_month(
        &mut self,
        employee_id: EmployeeId,
        year: i32,
        month: u32,
        closed_by: &str,
        closed_at: NaiveDateTime,
    ) -> Result<OperationResult, EngineError> {
        self.store
            .closings_mut()
            .close(employee_id, year, month, closed_by, closed_at)?;
        Ok(OperationResult::success(format!(
            "Month {:02}/{} closed",
            month, year
        )))
    }

    pub fn reopen_month(
        &mut self,
        employee_id: EmployeeId,
        year: i32,
        month: u32,
    ) -> Result<OperationResult, EngineError> {
        self.store.closings_mut().reopen(employee_id, year, month)?;
        Ok(OperationResult::success(format!(
            "Month {:02}/{} reopened",
            month, year
        )))
    }

    pub fn profile(&self, employee_id: EmployeeId) -> ValidationProfile {
        self.store.profile(employee_id)
    }
}

/// Range failures before any write name the failing date.
fn wrap_range(is_range: bool, date: Option<NaiveDate>, err: EngineError) -> EngineError {
    match (is_range, date) {
        (true, Some(date)) => EngineError::RangeAborted {
            date,
            persisted: Vec::new(),
            source: Box::new(err),
        },
        _ => err,
    }
}
