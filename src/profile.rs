// src/profile.rs
use serde::{Deserialize, Serialize};

use crate::error::EmployeeId;
use crate::holidays::FederalState;

/// Per-employee policy the validator and reconciler work against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationProfile {
    pub federal_state: FederalState,
    /// Employer minimum that raises the legal pause once one is due.
    #[serde(default)]
    pub min_pause_under6_minutes: Option<u32>,
    #[serde(default)]
    pub requires_meal_flag: bool,
}

impl Default for ValidationProfile {
    fn default() -> Self {
        Self {
            federal_state: FederalState::NW,
            min_pause_under6_minutes: None,
            requires_meal_flag: false,
        }
    }
}

pub trait ProfileProvider {
    fn profile(&self, employee_id: EmployeeId) -> ValidationProfile;
}
