// src/status_code.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationErrorReason;

/// Day classification recorded with every time entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusCode {
    #[serde(rename = "RA")]
    Regular,
    #[serde(rename = "Ü", alias = "UE")]
    OvertimeAbatement,
    #[serde(rename = "K")]
    Sick,
    #[serde(rename = "KK")]
    ChildSick,
    #[serde(rename = "KR")]
    SickRemainder,
    #[serde(rename = "KKR")]
    ChildSickRemainder,
    #[serde(rename = "KU")]
    ShortWork,
    #[serde(rename = "U")]
    Vacation,
    #[serde(rename = "UH")]
    HalfVacation,
    #[serde(rename = "FT")]
    Holiday,
    #[serde(rename = "UBF")]
    UnpaidLeave,
}

/// Balance bucket a code books its hours into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CodeCategory {
    Work,
    OvertimeAbatement,
    Sick,
    ChildSick,
    ShortWork,
    Vacation,
    Holiday,
    Unpaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodePolicy {
    pub code: StatusCode,
    pub symbol: &'static str,
    pub description: &'static str,
    pub category: CodeCategory,
    /// Start and end of the first block must be recorded.
    pub requires_time: bool,
    /// The whole planned day is booked to the category with zero recorded time.
    pub full_day_zero: bool,
    pub meal_blocked: bool,
    /// May be submitted for a date range in one request.
    pub range_eligible: bool,
}

const fn policy(
    code: StatusCode,
    symbol: &'static str,
    description: &'static str,
    category: CodeCategory,
    requires_time: bool,
    full_day_zero: bool,
    range_eligible: bool,
) -> CodePolicy {
    CodePolicy {
        code,
        symbol,
        description,
        category,
        requires_time,
        full_day_zero,
        meal_blocked: full_day_zero,
        range_eligible,
    }
}

// One row per code. Columns: requires_time, full_day_zero, range_eligible.
pub static CODE_TABLE: [CodePolicy; 11] = [
    policy(StatusCode::Regular, "RA", "Regular work", CodeCategory::Work, true, false, false),
    policy(StatusCode::OvertimeAbatement, "Ü", "Overtime abatement", CodeCategory::OvertimeAbatement, true, false, false),
    policy(StatusCode::Sick, "K", "Sick", CodeCategory::Sick, false, true, true),
    policy(StatusCode::ChildSick, "KK", "Child sick", CodeCategory::ChildSick, false, true, true),
    policy(StatusCode::SickRemainder, "KR", "Sick for the remainder of the day", CodeCategory::Sick, true, false, false),
    policy(StatusCode::ChildSickRemainder, "KKR", "Child sick for the remainder of the day", CodeCategory::ChildSick, true, false, false),
    policy(StatusCode::ShortWork, "KU", "Short-time work", CodeCategory::ShortWork, false, true, true),
    policy(StatusCode::Vacation, "U", "Vacation", CodeCategory::Vacation, false, true, true),
    policy(StatusCode::HalfVacation, "UH", "Half-day vacation", CodeCategory::Vacation, false, false, false),
    policy(StatusCode::Holiday, "FT", "Public holiday", CodeCategory::Holiday, false, true, false),
    policy(StatusCode::UnpaidLeave, "UBF", "Unpaid leave", CodeCategory::Unpaid, false, true, true),
];

impl StatusCode {
    pub fn policy(self) -> &'static CodePolicy {
        // CODE_TABLE is ordered like the enum
        &CODE_TABLE[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.policy().symbol
    }

    pub fn category(self) -> CodeCategory {
        self.policy().category
    }

    pub fn all() -> impl Iterator<Item = StatusCode> {
        CODE_TABLE.iter().map(|p| p.code)
    }

    /// Case-insensitive lookup, accepts `UE` for `Ü`.
    pub fn parse(raw: &str) -> Result<Self, ValidationErrorReason> {
        let normalized = raw.trim().to_uppercase();
        let normalized = if normalized == "UE" {
            "Ü".to_string()
        } else {
            normalized
        };
        CODE_TABLE
            .iter()
            .find(|p| p.symbol == normalized)
            .map(|p| p.code)
            .ok_or_else(|| ValidationErrorReason::UnknownStatusCode {
                value: raw.to_string(),
            })
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusCode {
    type Err = ValidationErrorReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusCode::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_match_enum_order() {
        for (index, row) in CODE_TABLE.iter().enumerate() {
            assert_eq!(row.code as usize, index, "row {} out of order", row.symbol);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(StatusCode::parse("ra").unwrap(), StatusCode::Regular);
        assert_eq!(StatusCode::parse(" kkr ").unwrap(), StatusCode::ChildSickRemainder);
        assert_eq!(StatusCode::parse("ü").unwrap(), StatusCode::OvertimeAbatement);
        assert_eq!(StatusCode::parse("ue").unwrap(), StatusCode::OvertimeAbatement);
        assert!(matches!(
            StatusCode::parse("XY"),
            Err(ValidationErrorReason::UnknownStatusCode { .. })
        ));
    }

    #[test]
    fn full_day_codes_block_meal_and_skip_time() {
        for code in [
            StatusCode::Vacation,
            StatusCode::UnpaidLeave,
            StatusCode::Sick,
            StatusCode::ChildSick,
            StatusCode::ShortWork,
            StatusCode::Holiday,
        ] {
            let p = code.policy();
            assert!(p.full_day_zero && p.meal_blocked && !p.requires_time, "{}", code);
        }
        for code in [
            StatusCode::Regular,
            StatusCode::OvertimeAbatement,
            StatusCode::SickRemainder,
            StatusCode::ChildSickRemainder,
        ] {
            assert!(code.policy().requires_time, "{}", code);
        }
    }
}
