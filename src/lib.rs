// src/lib.rs
//! Working time against shift plans: statutory breaks, plan reconciliation,
//! overtime balances and the revenue-share bonus.

pub mod balance;
pub mod bonus;
pub mod clock;
pub mod closing;
pub mod config;
pub mod decision;
pub mod entry;
pub mod error;
pub mod holidays;
pub mod pause_law;
pub mod profile;
pub mod reconciler;
pub mod scenario;
pub mod service;
pub mod shift_plan;
pub mod status_code;
pub mod store;
pub mod validator;


pub use balance::{BalanceBaseline, DayComputation, MonthlyReport, OvertimeBalance};
pub use bonus::{BonusScheme, BonusSettlement, BonusTier, SchemeType};
pub use closing::{ClosingLookup, ClosingRegistry, ClosingStatus, MonthlyClosing};
pub use decision::{ConfirmationReason, Confirmations, Decision, Resolution};
pub use entry::{EntryForm, MealFlag, PauseInput, TimeEntry};
pub use error::{EmployeeId, EngineError, ValidationError, ValidationErrorReason, ValidationWarning};
pub use holidays::{FederalState, GermanHolidayCalendar, HolidayCalendar, HolidayInfo};
pub use pause_law::{effective_pause_minutes, required_pause_minutes};
pub use profile::ValidationProfile;
pub use service::{OperationResult, SubmitOutcome, WorkTimeService};
pub use shift_plan::{PlanInfo, PlanRecord};
pub use status_code::StatusCode;
pub use store::{EmployeeSettings, InMemoryStore, WorkTimeStore};
pub use validator::{ValidationReport, Validator};
