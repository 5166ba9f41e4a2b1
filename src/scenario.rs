// src/scenario.rs
// JSON scenario files and CSV history import for the CLI.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::bonus::{BonusLedger, BonusLedgerEntry};
use crate::closing::{ClosingRegistry, MonthlyClosing};
use crate::entry::{check_revenue, EntryForm, TimeEntry};
use crate::error::{rule_id, EmployeeId, EngineError, ValidationError, ValidationWarning};
use crate::profile::ValidationProfile;
use crate::reconciler::normalize_entry;
use crate::shift_plan::PlanRecord;
use crate::store::{EmployeeSettings, InMemoryStore, WorkTimeStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioPlan {
    pub employee_id: EmployeeId,
    #[serde(flatten)]
    pub plan: PlanRecord,
}

/// Everything needed to seed an in-memory store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scenario {
    pub employees: Vec<EmployeeSettings>,
    pub plans: Vec<ScenarioPlan>,
    pub entries: Vec<TimeEntry>,
    pub closings: Vec<MonthlyClosing>,
    pub ledger: Vec<BonusLedgerEntry>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading scenario {} failed", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Parsing scenario {} failed", path.display()))
    }

    /// Builds a store; every plan is validated on the way in.
    pub fn into_store(self, default_profile: ValidationProfile) -> Result<InMemoryStore, EngineError> {
        let mut store = InMemoryStore::new().with_default_profile(default_profile);
        for employee in self.employees {
            store.add_employee(employee);
        }
        for ScenarioPlan { employee_id, plan } in self.plans {
            plan.validate().map_err(|reason| EngineError::InvalidPlan {
                date: plan.date(),
                reason,
            })?;
            store.save_plan(employee_id, plan)?;
        }
        import_entries(&mut store, self.entries)?;
        for row in self.ledger {
            store.write_ledger_entry(row)?;
        }
        store.set_closings(ClosingRegistry::from_records(self.closings));
        Ok(store)
    }
}

/// Stores entries that did not come through a submission. They are normalized against the
/// plan first, so full-day codes lose times and revenue exactly as a submitted entry would.
pub fn import_entries<S: WorkTimeStore>(
    store: &mut S,
    entries: Vec<TimeEntry>,
) -> Result<Vec<ValidationWarning>, EngineError> {
    let mut warnings = Vec::new();
    for mut entry in entries {
        let plan = store
            .plan(entry.employee_id, entry.day_date)
            .map(|record| record.to_plan_info());
        warnings.extend(normalize_entry(&mut entry, plan.as_ref()));
        if let Some(amount) = entry.brutto {
            check_revenue(amount).map_err(|reason| {
                ValidationError::new(rule_id::REVENUE, Some(entry.day_date), reason)
            })?;
        }
        store.upsert_entry(entry)?;
    }
    Ok(warnings)
}

/// Reads form-shaped CSV rows (same column names as the entry form) into entries.
pub fn read_entries_csv<R: Read>(reader: R) -> Result<Vec<TimeEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut entries = Vec::new();
    for (line, record) in csv_reader.deserialize::<EntryForm>().enumerate() {
        let form = record.with_context(|| format!("CSV row {} is malformed", line + 1))?;
        let parsed = form
            .parse()
            .with_context(|| format!("CSV row {} failed validation", line + 1))?;
        entries.extend(parsed.dates.iter().map(|date| parsed.entry_for(*date)));
    }
    Ok(entries)
}

pub fn load_entries_csv(path: &Path) -> Result<Vec<TimeEntry>> {
    let file = fs::File::open(path)
        .with_context(|| format!("Opening {} failed", path.display()))?;
    read_entries_csv(file)
}
