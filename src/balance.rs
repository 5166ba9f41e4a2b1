// src/balance.rs
// Per-day figures and the running overtime/vacation balance, always folded from full history.
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::bonus::{net_revenue, round_money};
use crate::clock::{minutes_to_hours, round_hours};
use crate::entry::TimeEntry;
use crate::error::{EmployeeId, EngineError};
use crate::reconciler::{derive_synthetic_day, worked_minutes, SyntheticDay};
use crate::shift_plan::PlanInfo;
use crate::status_code::{CodeCategory, StatusCode};

// --- Day Rows ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayComputation {
    pub date: NaiveDate,
    pub code: StatusCode,
    /// Derived from a plan label, not stored.
    pub synthetic: bool,
    pub ist_hours: Decimal,
    pub plan_hours: Decimal,
    pub overtime_delta: Decimal,
    pub sick_hours: Decimal,
    pub child_sick_hours: Decimal,
    pub vacation_hours: Decimal,
    pub vacation_days: Decimal,
    pub short_work_hours: Decimal,
    pub holiday_hours: Decimal,
    pub unpaid_hours: Decimal,
    pub gross_revenue: Decimal,
    pub net_revenue: Decimal,
}

impl DayComputation {
    fn empty(date: NaiveDate, code: StatusCode, synthetic: bool) -> Self {
        Self {
            date,
            code,
            synthetic,
            ist_hours: Decimal::ZERO,
            plan_hours: Decimal::ZERO,
            overtime_delta: Decimal::ZERO,
            sick_hours: Decimal::ZERO,
            child_sick_hours: Decimal::ZERO,
            vacation_hours: Decimal::ZERO,
            vacation_days: Decimal::ZERO,
            short_work_hours: Decimal::ZERO,
            holiday_hours: Decimal::ZERO,
            unpaid_hours: Decimal::ZERO,
            gross_revenue: Decimal::ZERO,
            net_revenue: Decimal::ZERO,
        }
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Books ist/plan hours into the code's category.
fn credit(row: &mut DayComputation, ist: Decimal, plan: Decimal, counts_as_workday: bool) {
    row.ist_hours = ist;
    row.plan_hours = plan;
    let zero = Decimal::ZERO;
    match row.code {
        StatusCode::Regular | StatusCode::OvertimeAbatement => {
            row.overtime_delta = ist - plan;
        }
        StatusCode::SickRemainder => {
            row.sick_hours = (plan - ist).max(zero);
            row.overtime_delta = (ist - plan).max(zero);
        }
        StatusCode::ChildSickRemainder => {
            row.child_sick_hours = (plan - ist).max(zero);
            row.overtime_delta = (ist - plan).max(zero);
        }
        StatusCode::HalfVacation => {
            let half = plan / dec!(2);
            row.vacation_hours = half;
            row.vacation_days = dec!(0.5);
            row.overtime_delta = ist - half;
        }
        code => {
            match code.category() {
                CodeCategory::Sick => row.sick_hours = plan,
                CodeCategory::ChildSick => row.child_sick_hours = plan,
                CodeCategory::ShortWork => row.short_work_hours = plan,
                CodeCategory::Vacation => {
                    row.vacation_hours = plan;
                    if counts_as_workday {
                        row.vacation_days = Decimal::ONE;
                    }
                }
                CodeCategory::Holiday => row.holiday_hours = plan,
                CodeCategory::Unpaid => row.unpaid_hours = plan,
                CodeCategory::Work | CodeCategory::OvertimeAbatement => {}
            }
        }
    }
    row.ist_hours = round_hours(row.ist_hours);
    row.plan_hours = round_hours(row.plan_hours);
    row.overtime_delta = round_hours(row.overtime_delta);
    row.sick_hours = round_hours(row.sick_hours);
    row.child_sick_hours = round_hours(row.child_sick_hours);
    row.vacation_hours = round_hours(row.vacation_hours);
    row.short_work_hours = round_hours(row.short_work_hours);
    row.holiday_hours = round_hours(row.holiday_hours);
    row.unpaid_hours = round_hours(row.unpaid_hours);
}

/// Figures for one stored entry. A missing plan counts as span 0, pause 0.
pub fn compute_day(
    entry: &TimeEntry,
    plan: Option<&PlanInfo>,
    mandatory_pause_under6: Option<u32>,
) -> DayComputation {
    let plan_hours = plan
        .map(|p| p.net_hours(mandatory_pause_under6))
        .unwrap_or(Decimal::ZERO);
    let ist_hours = minutes_to_hours(worked_minutes(entry, plan));
    let counts_as_workday = match plan {
        Some(_) => plan_hours > Decimal::ZERO,
        None => is_weekday(entry.day_date),
    };

    let mut row = DayComputation::empty(entry.day_date, entry.code, false);
    credit(&mut row, ist_hours, plan_hours, counts_as_workday);
    if let Some(gross) = entry.brutto {
        row.gross_revenue = round_money(gross);
        row.net_revenue = net_revenue(gross);
    }
    row
}

pub fn compute_synthetic(day: &SyntheticDay) -> DayComputation {
    let mut row = DayComputation::empty(day.date, day.code, true);
    credit(&mut row, Decimal::ZERO, day.plan_hours, day.plan_hours > Decimal::ZERO);
    row
}

/// Real entries plus synthetic plan-label days, ascending by date.
pub fn build_day_rows(
    employee_id: EmployeeId,
    entries: &[TimeEntry],
    plans: &[PlanInfo],
    mandatory_pause_under6: Option<u32>,
) -> Vec<DayComputation> {
    let plan_by_date: BTreeMap<NaiveDate, &PlanInfo> = plans.iter().map(|p| (p.date, p)).collect();
    let mut rows: BTreeMap<NaiveDate, DayComputation> = BTreeMap::new();

    for entry in entries {
        let plan = plan_by_date.get(&entry.day_date).copied();
        rows.insert(
            entry.day_date,
            compute_day(entry, plan, mandatory_pause_under6),
        );
    }
    for plan in plans {
        if rows.contains_key(&plan.date) {
            continue;
        }
        if let Some(day) = derive_synthetic_day(employee_id, plan, mandatory_pause_under6) {
            rows.insert(plan.date, compute_synthetic(&day));
        }
    }
    rows.into_values().collect()
}

// --- Totals and Running Balance ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceTotals {
    pub ist_hours: Decimal,
    pub plan_hours: Decimal,
    pub overtime_delta: Decimal,
    pub sick_hours: Decimal,
    pub child_sick_hours: Decimal,
    pub vacation_hours: Decimal,
    pub vacation_days: Decimal,
    pub short_work_hours: Decimal,
    pub holiday_hours: Decimal,
    pub unpaid_hours: Decimal,
    pub gross_revenue: Decimal,
    pub net_revenue: Decimal,
}

impl BalanceTotals {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a DayComputation>) -> Self {
        let mut totals = rows.into_iter().fold(Self::default(), |mut acc, row| {
            acc.ist_hours += row.ist_hours;
            acc.plan_hours += row.plan_hours;
            acc.overtime_delta += row.overtime_delta;
            acc.sick_hours += row.sick_hours;
            acc.child_sick_hours += row.child_sick_hours;
            acc.vacation_hours += row.vacation_hours;
            acc.vacation_days += row.vacation_days;
            acc.short_work_hours += row.short_work_hours;
            acc.holiday_hours += row.holiday_hours;
            acc.unpaid_hours += row.unpaid_hours;
            acc.gross_revenue += row.gross_revenue;
            acc
        });
        // Net once over the period's gross; per-day rounding would drift
        totals.net_revenue = net_revenue(totals.gross_revenue);
        totals
    }
}

/// Gross revenue per (year, month), ascending.
pub fn monthly_gross(rows: &[DayComputation]) -> BTreeMap<(i32, u32), Decimal> {
    let mut months = BTreeMap::new();
    for row in rows {
        *months
            .entry((row.date.year(), row.date.month()))
            .or_insert(Decimal::ZERO) += row.gross_revenue;
    }
    months
}

/// Imported opening balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BalanceBaseline {
    pub overtime_hours: Decimal,
    pub minus_hours: Decimal,
    pub vacation_days: Decimal,
    pub bonus_earned: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OvertimeBalance {
    pub overtime_hours: Decimal,
    pub minus_hours: Decimal,
    pub vacation_days: Decimal,
    /// Bonus computed per month, whether paid out or carried over.
    pub bonus_earned: Decimal,
    /// Ledger payouts.
    pub bonus_paid_out: Decimal,
}

impl OvertimeBalance {
    /// Overtime minus minus hours.
    pub fn net_hours(&self) -> Decimal {
        self.overtime_hours - self.minus_hours
    }
}

/// Folds baseline and every row in date order. Same input, same balance.
pub fn recompute(
    baseline: &BalanceBaseline,
    rows: &[DayComputation],
    monthly_bonus: &[Decimal],
    bonus_payouts: &[Decimal],
) -> OvertimeBalance {
    let mut ordered: Vec<&DayComputation> = rows.iter().collect();
    ordered.sort_by_key(|r| r.date);

    let mut balance = OvertimeBalance {
        overtime_hours: baseline.overtime_hours,
        minus_hours: baseline.minus_hours,
        vacation_days: baseline.vacation_days,
        bonus_earned: baseline.bonus_earned,
        bonus_paid_out: Decimal::ZERO,
    };
    for row in ordered {
        if row.overtime_delta.is_sign_positive() {
            balance.overtime_hours += row.overtime_delta;
        } else {
            balance.minus_hours += -row.overtime_delta;
        }
        balance.vacation_days += row.vacation_days;
    }
    balance.bonus_earned += monthly_bonus.iter().copied().sum::<Decimal>();
    balance.bonus_paid_out = bonus_payouts.iter().copied().sum::<Decimal>();
    balance.overtime_hours = round_hours(balance.overtime_hours);
    balance.minus_hours = round_hours(balance.minus_hours);
    balance.bonus_earned = round_money(balance.bonus_earned);
    balance.bonus_paid_out = round_money(balance.bonus_paid_out);

    debug!(
        "Recomputed balance: overtime={}, minus={}, vacation_days={}",
        balance.overtime_hours, balance.minus_hours, balance.vacation_days
    );
    balance
}

// --- Gaps ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingHoliday {
    pub date: NaiveDate,
    pub name: String,
}

/// First and last day of a month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), EngineError> {
    let invalid = || EngineError::InvalidMonth { year, month };
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next.pred_opt().ok_or_else(invalid)?;
    Ok((first, last))
}

/// Planned working days with no row. Holidays go to the second list instead.
pub fn find_gaps<F>(
    plans: &[PlanInfo],
    rows: &[DayComputation],
    first: NaiveDate,
    last: NaiveDate,
    holiday_name: F,
) -> (Vec<NaiveDate>, Vec<PendingHoliday>)
where
    F: Fn(NaiveDate) -> Option<String>,
{
    let covered: std::collections::BTreeSet<NaiveDate> = rows.iter().map(|r| r.date).collect();
    let mut missing = Vec::new();
    let mut pending = Vec::new();

    let mut candidates: Vec<&PlanInfo> = plans
        .iter()
        .filter(|p| p.date >= first && p.date <= last && !covered.contains(&p.date))
        .collect();
    candidates.sort_by_key(|p| p.date);

    for plan in candidates {
        if plan.marks_absence() {
            continue;
        }
        if let Some(name) = holiday_name(plan.date) {
            pending.push(PendingHoliday {
                date: plan.date,
                name,
            });
        } else if plan.expects_work() {
            missing.push(plan.date);
        }
    }
    (missing, pending)
}

// --- Monthly Report ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub employee_id: EmployeeId,
    pub year: i32,
    pub month: u32,
    pub days: Vec<DayComputation>,
    pub totals: BalanceTotals,
    /// Running balance from the baseline through the end of this month.
    pub balance: OvertimeBalance,
    pub missing_dates: Vec<NaiveDate>,
    pub pending_holidays: Vec<PendingHoliday>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shift_plan::{PlanRecord, ShiftPlanDay};
    use chrono::NaiveTime;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn plan(date: &str, start: &str, end: &str, label: Option<&str>) -> PlanInfo {
        PlanRecord::Day(ShiftPlanDay {
            iso_date: d(date),
            start: Some(t(start)),
            end: Some(t(end)),
            required_pause_minutes: 0,
            label: label.map(String::from),
            branch_id: None,
        })
        .to_plan_info()
    }

    #[test]
    fn regular_overtime_delta() {
        let p = plan("2025-03-03", "08:00", "16:30", None);
        let entry = TimeEntry::new(1, d("2025-03-03"), StatusCode::Regular)
            .primary(t("08:00"), t("18:00"))
            .pause_minutes(45)
            .revenue(dec!(1190));
        let row = compute_day(&entry, Some(&p), None);
        assert_eq!(row.plan_hours, dec!(8));
        assert_eq!(row.ist_hours, dec!(9.25));
        assert_eq!(row.overtime_delta, dec!(1.25));
        assert_eq!(row.net_revenue, dec!(1000));
    }

    #[test]
    fn absence_codes_credit_category() {
        let p = plan("2025-03-03", "08:00", "16:30", None);
        let sick = compute_day(&TimeEntry::new(1, d("2025-03-03"), StatusCode::Sick), Some(&p), None);
        assert_eq!(sick.sick_hours, dec!(8));
        assert_eq!(sick.overtime_delta, Decimal::ZERO);

        let vacation =
            compute_day(&TimeEntry::new(1, d("2025-03-03"), StatusCode::Vacation), Some(&p), None);
        assert_eq!(vacation.vacation_days, Decimal::ONE);
        assert_eq!(vacation.vacation_hours, dec!(8));

        let weekend = compute_day(&TimeEntry::new(1, d("2025-03-08"), StatusCode::Vacation), None, None);
        assert_eq!(weekend.vacation_days, Decimal::ZERO);
    }

    #[test]
    fn partial_codes() {
        let p = plan("2025-03-03", "08:00", "16:30", None);
        let kr = TimeEntry::new(1, d("2025-03-03"), StatusCode::SickRemainder)
            .primary(t("08:00"), t("11:00"));
        let row = compute_day(&kr, Some(&p), None);
        assert_eq!(row.ist_hours, dec!(3));
        assert_eq!(row.sick_hours, dec!(5));
        assert_eq!(row.overtime_delta, Decimal::ZERO);

        let uh = TimeEntry::new(1, d("2025-03-03"), StatusCode::HalfVacation)
            .primary(t("08:00"), t("12:30"));
        let row = compute_day(&uh, Some(&p), None);
        assert_eq!(row.vacation_days, dec!(0.5));
        assert_eq!(row.vacation_hours, dec!(4));
        assert_eq!(row.overtime_delta, dec!(0.5));
    }

    #[test]
    fn synthetic_rows_fill_plan_absences() {
        let plans = vec![
            plan("2025-03-03", "08:00", "16:30", None),
            plan("2025-03-04", "08:00", "16:30", Some("Urlaub")),
            plan("2025-03-05", "08:00", "16:30", None),
        ];
        let entries = vec![TimeEntry::new(1, d("2025-03-03"), StatusCode::Regular)
            .primary(t("08:00"), t("16:30"))
            .pause_minutes(30)];
        let rows = build_day_rows(1, &entries, &plans, None);
        assert_eq!(rows.len(), 2);
        assert!(rows[1].synthetic);
        assert_eq!(rows[1].code, StatusCode::Vacation);

        let (missing, pending) = find_gaps(&plans, &rows, d("2025-03-01"), d("2025-03-31"), |_| None);
        assert_eq!(missing, vec![d("2025-03-05")]);
        assert!(pending.is_empty());
    }

    #[test]
    fn recompute_is_idempotent_and_seeded() {
        let p = plan("2025-03-03", "08:00", "16:30", None);
        let rows = vec![
            compute_day(
                &TimeEntry::new(1, d("2025-03-03"), StatusCode::Regular)
                    .primary(t("08:00"), t("18:00"))
                    .pause_minutes(45),
                Some(&p),
                None,
            ),
            compute_day(
                &TimeEntry::new(1, d("2025-03-04"), StatusCode::OvertimeAbatement),
                Some(&plan("2025-03-04", "08:00", "16:30", None)),
                None,
            ),
        ];
        let baseline = BalanceBaseline {
            overtime_hours: dec!(10),
            minus_hours: dec!(2),
            vacation_days: dec!(3),
            bonus_earned: dec!(100),
        };
        let first = recompute(&baseline, &rows, &[dec!(80)], &[dec!(50)]);
        let second = recompute(&baseline, &rows, &[dec!(80)], &[dec!(50)]);
        assert_eq!(first, second);
        assert_eq!(first.overtime_hours, dec!(11.25));
        assert_eq!(first.minus_hours, dec!(10));
        assert_eq!(first.net_hours(), dec!(1.25));
        assert_eq!(first.bonus_earned, dec!(180));
        assert_eq!(first.bonus_paid_out, dec!(50));
    }

    #[test]
    fn month_net_is_taken_from_summed_gross() {
        let rows: Vec<DayComputation> = (1..=20)
            .map(|day| {
                let date = NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
                compute_day(
                    &TimeEntry::new(1, date, StatusCode::Regular)
                        .primary(t("08:00"), t("12:00"))
                        .revenue(dec!(0.05)),
                    None,
                    None,
                )
            })
            .collect();
        let totals = BalanceTotals::from_rows(&rows);
        assert_eq!(totals.gross_revenue, dec!(1.00));
        assert_eq!(totals.net_revenue, dec!(0.84));

        let months = monthly_gross(&rows);
        assert_eq!(months.get(&(2025, 3)), Some(&dec!(1.00)));
    }

    #[test]
    fn month_bounds_handle_december_and_leap_years() {
        assert_eq!(
            month_bounds(2024, 2).unwrap(),
            (d("2024-02-01"), d("2024-02-29"))
        );
        assert_eq!(
            month_bounds(2025, 12).unwrap(),
            (d("2025-12-01"), d("2025-12-31"))
        );
        assert!(month_bounds(2025, 0).is_err());
    }
}
