// src/pause_law.rs
//! Statutory break minutes (§4 ArbZG) and the employer's under-6h overlay.
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const STATUTORY_BASIS: &str = "§4 ArbZG";

const SIX_HOURS: Decimal = dec!(6);
const NINE_HOURS: Decimal = dec!(9);

/// Tolerance on the thresholds so that hours derived from minutes never flip at exactly 6h/9h.
pub const PAUSE_LAW_EPSILON: Decimal = dec!(0.005);

pub const PAUSE_OVER_SIX_HOURS: u32 = 30;
pub const PAUSE_OVER_NINE_HOURS: u32 = 45;

/// Minimum break in minutes for the given worked hours.
pub fn required_pause_minutes(hours: Decimal) -> u32 {
    if hours - NINE_HOURS > PAUSE_LAW_EPSILON {
        PAUSE_OVER_NINE_HOURS
    } else if hours - SIX_HOURS > PAUSE_LAW_EPSILON {
        PAUSE_OVER_SIX_HOURS
    } else {
        0
    }
}

/// Legal minimum raised by the configured policy value.
///
/// The policy only applies once the legal rule already demands a break, it never
/// introduces one for short shifts.
pub fn effective_pause_minutes(hours: Decimal, mandatory_pause_under6: Option<u32>) -> u32 {
    let legal = required_pause_minutes(hours);
    match mandatory_pause_under6 {
        Some(policy) if legal >= PAUSE_OVER_SIX_HOURS => legal.max(policy),
        _ => legal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::minutes_to_hours;

    #[test]
    fn boundaries_are_exact() {
        assert_eq!(required_pause_minutes(dec!(6.00)), 0);
        assert_eq!(required_pause_minutes(dec!(6.01)), 30);
        assert_eq!(required_pause_minutes(dec!(9.00)), 30);
        assert_eq!(required_pause_minutes(dec!(9.01)), 45);
        assert_eq!(required_pause_minutes(dec!(0)), 0);
        assert_eq!(required_pause_minutes(dec!(12)), 45);
    }

    #[test]
    fn minute_derived_hours_do_not_flip() {
        assert_eq!(required_pause_minutes(minutes_to_hours(360)), 0);
        assert_eq!(required_pause_minutes(minutes_to_hours(361)), 30);
        assert_eq!(required_pause_minutes(minutes_to_hours(540)), 30);
        assert_eq!(required_pause_minutes(minutes_to_hours(541)), 45);
    }

    #[test]
    fn monotonic_over_the_working_day() {
        let mut previous = 0;
        for minutes in 0..=(14 * 60) {
            let current = required_pause_minutes(minutes_to_hours(minutes));
            assert!(current >= previous, "pause dropped at {} minutes", minutes);
            previous = current;
        }
    }

    #[test]
    fn policy_raises_but_never_introduces() {
        assert_eq!(effective_pause_minutes(dec!(5.5), Some(45)), 0);
        assert_eq!(effective_pause_minutes(dec!(7), Some(45)), 45);
        assert_eq!(effective_pause_minutes(dec!(7), Some(15)), 30);
        assert_eq!(effective_pause_minutes(dec!(10), Some(40)), 45);
        assert_eq!(effective_pause_minutes(dec!(10), None), 45);
    }
}
