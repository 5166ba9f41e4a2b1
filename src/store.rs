// src/store.rs
// Persistence seam for the service. `InMemoryStore` backs the CLI and the tests.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::balance::BalanceBaseline;
use crate::bonus::{BonusLedger, BonusLedgerEntry, BonusScheme};
use crate::closing::{ClosingLookup, ClosingRegistry};
use crate::entry::TimeEntry;
use crate::error::{EmployeeId, EngineError};
use crate::profile::{ProfileProvider, ValidationProfile};
use crate::shift_plan::PlanRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployeeSettings {
    pub employee_id: EmployeeId,
    pub name: String,
    pub profile: ValidationProfile,
    pub baseline: BalanceBaseline,
    pub bonus_scheme: BonusScheme,
}

pub trait WorkTimeStore: BonusLedger + ClosingLookup + ProfileProvider {
    fn settings(&self, employee_id: EmployeeId) -> Option<EmployeeSettings>;

    fn entry(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<TimeEntry>;
    /// Inserts or replaces the entry for its employee and date.
    fn upsert_entry(&mut self, entry: TimeEntry) -> Result<(), EngineError>;
    fn remove_entry(&mut self, employee_id: EmployeeId, date: NaiveDate) -> Result<TimeEntry, EngineError>;
    /// Every entry up to and including `until`, ascending.
    fn entries_until(&self, employee_id: EmployeeId, until: NaiveDate) -> Vec<TimeEntry>;

    fn plan(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<PlanRecord>;
    fn save_plan(&mut self, employee_id: EmployeeId, plan: PlanRecord) -> Result<(), EngineError>;
    fn plans_until(&self, employee_id: EmployeeId, until: NaiveDate) -> Vec<PlanRecord>;

    fn closings(&self) -> &ClosingRegistry;
    fn closings_mut(&mut self) -> &mut ClosingRegistry;

    /// Ledger payouts up to and including the given month.
    fn payouts_until(&self, employee_id: EmployeeId, year: i32, month: u32) -> Vec<BonusLedgerEntry>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    employees: BTreeMap<EmployeeId, EmployeeSettings>,
    entries: BTreeMap<(EmployeeId, NaiveDate), TimeEntry>,
    plans: BTreeMap<(EmployeeId, NaiveDate), PlanRecord>,
    ledger: BTreeMap<(EmployeeId, i32, u32), BonusLedgerEntry>,
    closings: ClosingRegistry,
    default_profile: ValidationProfile,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile used for employees without their own settings.
    pub fn with_default_profile(mut self, profile: ValidationProfile) -> Self {
        self.default_profile = profile;
        self
    }

    pub fn add_employee(&mut self, settings: EmployeeSettings) {
        self.employees.insert(settings.employee_id, settings);
    }

    pub fn set_closings(&mut self, closings: ClosingRegistry) {
        self.closings = closings;
    }

    pub fn entry_count(&self, employee_id: EmployeeId) -> usize {
        self.entries.keys().filter(|(emp, _)| *emp == employee_id).count()
    }
}

impl ProfileProvider for InMemoryStore {
    fn profile(&self, employee_id: EmployeeId) -> ValidationProfile {
        self.employees
            .get(&employee_id)
            .map(|s| s.profile.clone())
            .unwrap_or_else(|| self.default_profile.clone())
    }
}

impl ClosingLookup for InMemoryStore {
    fn is_closed(&self, employee_id: EmployeeId, year: i32, month: u32) -> bool {
        self.closings.is_closed(employee_id, year, month)
    }
}

impl BonusLedger for InMemoryStore {
    fn ledger_entry(&self, employee_id: EmployeeId, year: i32, month: u32) -> Option<BonusLedgerEntry> {
        self.ledger.get(&(employee_id, year, month)).cloned()
    }

    fn write_ledger_entry(&mut self, entry: BonusLedgerEntry) -> Result<(), EngineError> {
        self.ledger
            .insert((entry.employee_id, entry.year, entry.month), entry);
        Ok(())
    }
}

impl WorkTimeStore for InMemoryStore {
    fn settings(&self, employee_id: EmployeeId) -> Option<EmployeeSettings> {
        self.employees.get(&employee_id).cloned()
    }

    fn entry(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<TimeEntry> {
        self.entries.get(&(employee_id, date)).cloned()
    }

    fn upsert_entry(&mut self, entry: TimeEntry) -> Result<(), EngineError> {
        self.entries.insert((entry.employee_id, entry.day_date), entry);
        Ok(())
    }

    fn remove_entry(&mut self, employee_id: EmployeeId, date: NaiveDate) -> Result<TimeEntry, EngineError> {
        self.entries
            .remove(&(employee_id, date))
            .ok_or(EngineError::EntryNotFound { employee_id, date })
    }

    fn entries_until(&self, employee_id: EmployeeId, until: NaiveDate) -> Vec<TimeEntry> {
        self.entries
            .range((employee_id, NaiveDate::MIN)..=(employee_id, until))
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn plan(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<PlanRecord> {
        self.plans.get(&(employee_id, date)).cloned()
    }

    fn save_plan(&mut self, employee_id: EmployeeId, plan: PlanRecord) -> Result<(), EngineError> {
        self.plans.insert((employee_id, plan.date()), plan);
        Ok(())
    }

    fn plans_until(&self, employee_id: EmployeeId, until: NaiveDate) -> Vec<PlanRecord> {
        self.plans
            .range((employee_id, NaiveDate::MIN)..=(employee_id, until))
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn closings(&self) -> &ClosingRegistry {
        &self.closings
    }

    fn closings_mut(&mut self) -> &mut ClosingRegistry {
        &mut self.closings
    }

    fn payouts_until(&self, employee_id: EmployeeId, year: i32, month: u32) -> Vec<BonusLedgerEntry> {
        self.ledger
            .range((employee_id, i32::MIN, 0)..=(employee_id, year, month))
            .map(|(_, e)| e.clone())
            .collect()
    }
}
