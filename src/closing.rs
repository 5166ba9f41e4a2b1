// src/closing.rs
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::info;

use crate::error::{EmployeeId, EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosingStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyClosing {
    pub employee_id: EmployeeId,
    pub year: i32,
    pub month: u32,
    pub status: ClosingStatus,
    #[serde(default)]
    pub closed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub closed_by: Option<String>,
}

/// Read side of the monthly closing gate.
pub trait ClosingLookup {
    fn is_closed(&self, employee_id: EmployeeId, year: i32, month: u32) -> bool;

    /// First date among `dates` whose month is closed.
    fn first_closed(&self, employee_id: EmployeeId, dates: &[NaiveDate]) -> Option<NaiveDate> {
        dates
            .iter()
            .copied()
            .find(|d| self.is_closed(employee_id, d.year(), d.month()))
    }
}

/// Open/closed state per employee and month; months without a record are open.
#[derive(Debug, Clone, Default)]
pub struct ClosingRegistry {
    records: BTreeMap<(EmployeeId, i32, u32), MonthlyClosing>,
}

fn check_month(year: i32, month: u32) -> Result<(), EngineError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(EngineError::InvalidMonth { year, month })
    }
}

impl ClosingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = MonthlyClosing>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| ((r.employee_id, r.year, r.month), r))
                .collect(),
        }
    }

    pub fn status(&self, employee_id: EmployeeId, year: i32, month: u32) -> ClosingStatus {
        self.records
            .get(&(employee_id, year, month))
            .map(|r| r.status)
            .unwrap_or_default()
    }

    pub fn close(
        &mut self,
        employee_id: EmployeeId,
        year: i32,
        month: u32,
        closed_by: &str,
        closed_at: NaiveDateTime,
    ) -> Result<&MonthlyClosing, EngineError> {
        check_month(year, month)?;
        if self.status(employee_id, year, month) == ClosingStatus::Closed {
            return Err(EngineError::MonthAlreadyClosed {
                employee_id,
                year,
                month,
            });
        }
        info!(employee_id, year, month, closed_by, "Closing month");
        let record = MonthlyClosing {
            employee_id,
            year,
            month,
            status: ClosingStatus::Closed,
            closed_at: Some(closed_at),
            closed_by: Some(closed_by.to_string()),
        };
        let slot = match self.records.entry((employee_id, year, month)) {
            Entry::Occupied(mut existing) => {
                existing.insert(record);
                existing.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(record),
        };
        Ok(slot)
    }

    pub fn reopen(&mut self, employee_id: EmployeeId, year: i32, month: u32) -> Result<(), EngineError> {
        check_month(year, month)?;
        match self.records.get_mut(&(employee_id, year, month)) {
            Some(record) if record.status == ClosingStatus::Closed => {
                info!(employee_id, year, month, "Reopening month");
                record.status = ClosingStatus::Open;
                record.closed_at = None;
                record.closed_by = None;
                Ok(())
            }
            _ => Err(EngineError::MonthNotClosed {
                employee_id,
                year,
                month,
            }),
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &MonthlyClosing> {
        self.records.values()
    }
}

impl ClosingLookup for ClosingRegistry {
    fn is_closed(&self, employee_id: EmployeeId, year: i32, month: u32) -> bool {
        self.status(employee_id, year, month) == ClosingStatus::Closed
    }
}
