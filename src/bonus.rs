// src/bonus.rs
// Revenue-share bonus: linear or marginal tiers, payout clamp and month-to-month carryover.
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EmployeeId, EngineError};

/// Gross revenue includes 19% VAT.
pub const VAT_RATE: Decimal = dec!(1.19);

/// Half-up to cents.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn net_revenue(gross: Decimal) -> Decimal {
    round_money(gross / VAT_RATE)
}

// --- Schemes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeType {
    #[default]
    Linear,
    Stufen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusTier {
    pub threshold: Decimal,
    pub percent: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusScheme {
    pub scheme_type: SchemeType,
    #[serde(default)]
    pub linear_percent: Decimal,
    #[serde(default)]
    pub linear_threshold: Decimal,
    #[serde(default)]
    pub tiers: Vec<BonusTier>,
}

/// Share of net revenue that fell into one band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandShare {
    pub from: Decimal,
    pub to: Option<Decimal>,
    pub percent: Decimal,
    pub base: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusComputation {
    pub net_revenue: Decimal,
    pub bonus: Decimal,
    pub bands: Vec<BandShare>,
}

fn share(base: Decimal, percent: Decimal) -> Decimal {
    base * percent / dec!(100)
}

impl BonusScheme {
    pub fn linear(percent: Decimal, threshold: Decimal) -> Self {
        Self {
            scheme_type: SchemeType::Linear,
            linear_percent: percent,
            linear_threshold: threshold,
            tiers: Vec::new(),
        }
    }

    pub fn tiered(tiers: Vec<BonusTier>) -> Self {
        Self {
            scheme_type: SchemeType::Stufen,
            linear_percent: Decimal::ZERO,
            linear_threshold: Decimal::ZERO,
            tiers,
        }
    }

    /// Bonus on net revenue. Each tier rate applies only to the part inside its band.
    pub fn compute(&self, net: Decimal) -> BonusComputation {
        let bands = match self.scheme_type {
            SchemeType::Linear => {
                let base = (net - self.linear_threshold).max(Decimal::ZERO);
                vec![BandShare {
                    from: self.linear_threshold,
                    to: None,
                    percent: self.linear_percent,
                    base,
                    amount: share(base, self.linear_percent),
                }]
            }
            SchemeType::Stufen => {
                let mut tiers = self.tiers.clone();
                tiers.sort_by(|a, b| a.threshold.cmp(&b.threshold));
                let mut bands = Vec::with_capacity(tiers.len());
                for (i, tier) in tiers.iter().enumerate() {
                    let upper = tiers.get(i + 1).map(|next| next.threshold);
                    let ceiling = upper.map(|u| net.min(u)).unwrap_or(net);
                    let base = (ceiling - tier.threshold).max(Decimal::ZERO);
                    bands.push(BandShare {
                        from: tier.threshold,
                        to: upper,
                        percent: tier.percent,
                        base,
                        amount: share(base, tier.percent),
                    });
                }
                bands
            }
        };
        let bonus = round_money(bands.iter().map(|b| b.amount).sum());
        BonusComputation {
            net_revenue: net,
            bonus,
            bands,
        }
    }
}

// --- Ledger ---

/// One row of `employee_bonus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusLedgerEntry {
    pub employee_id: EmployeeId,
    pub year: i32,
    pub month: u32,
    #[serde(rename = "auszahlung", alias = "payout")]
    pub payout: Decimal,
    #[serde(rename = "uebertrag", alias = "carryOver")]
    pub carry_over: Decimal,
}

pub trait BonusLedger {
    fn ledger_entry(&self, employee_id: EmployeeId, year: i32, month: u32) -> Option<BonusLedgerEntry>;
    fn write_ledger_entry(&mut self, entry: BonusLedgerEntry) -> Result<(), EngineError>;
}

pub fn previous_period(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusSettlement {
    pub bonus: Decimal,
    pub previous_carry_over: Decimal,
    pub available: Decimal,
    pub requested_payout: Option<Decimal>,
    pub payout: Decimal,
    pub carry_over: Decimal,
    /// The request was outside `[0, available]`.
    pub clamped: bool,
}

/// Clamps the payout into `[0, available]`. Without a request the whole amount is paid.
pub fn settle(bonus: Decimal, previous_carry_over: Decimal, requested: Option<Decimal>) -> BonusSettlement {
    let available = round_money(bonus + previous_carry_over).max(Decimal::ZERO);
    let wanted = requested.unwrap_or(available);
    let payout = round_money(wanted.max(Decimal::ZERO).min(available));
    let carry_over = round_money(available - payout).max(Decimal::ZERO);
    BonusSettlement {
        bonus,
        previous_carry_over,
        available,
        requested_payout: requested,
        payout,
        carry_over,
        clamped: payout != round_money(wanted),
    }
}

pub struct BonusEngine<'a, L: BonusLedger + ?Sized> {
    ledger: &'a mut L,
}

impl<'a, L: BonusLedger + ?Sized> BonusEngine<'a, L> {
    pub fn new(ledger: &'a mut L) -> Self {
        Self { ledger }
    }

    /// Reads last month's carryover, settles, then writes this month's row.
    pub fn settle_month(
        &mut self,
        scheme: &BonusScheme,
        employee_id: EmployeeId,
        year: i32,
        month: u32,
        net: Decimal,
        requested: Option<Decimal>,
    ) -> Result<(BonusComputation, BonusSettlement), EngineError> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::InvalidMonth { year, month });
        }
        let (prev_year, prev_month) = previous_period(year, month);
        let previous_carry = self
            .ledger
            .ledger_entry(employee_id, prev_year, prev_month)
            .map(|e| e.carry_over)
            .unwrap_or(Decimal::ZERO);

        let computation = scheme.compute(net);
        let settlement = settle(computation.bonus, previous_carry, requested);
        self.ledger.write_ledger_entry(BonusLedgerEntry {
            employee_id,
            year,
            month,
            payout: settlement.payout,
            carry_over: settlement.carry_over,
        })?;
        info!(
            employee_id,
            year,
            month,
            bonus = %settlement.bonus,
            payout = %settlement.payout,
            carry_over = %settlement.carry_over,
            "Bonus settled"
        );
        Ok((computation, settlement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MemoryLedger {
        rows: BTreeMap<(EmployeeId, i32, u32), BonusLedgerEntry>,
    }

    impl BonusLedger for MemoryLedger {
        fn ledger_entry(&self, employee_id: EmployeeId, year: i32, month: u32) -> Option<BonusLedgerEntry> {
            self.rows.get(&(employee_id, year, month)).cloned()
        }

        fn write_ledger_entry(&mut self, entry: BonusLedgerEntry) -> Result<(), EngineError> {
            self.rows.insert((entry.employee_id, entry.year, entry.month), entry);
            Ok(())
        }
    }

    #[test]
    fn net_strips_vat() {
        assert_eq!(net_revenue(dec!(1190)), dec!(1000));
        assert_eq!(net_revenue(dec!(100)), dec!(84.03));
    }

    #[test]
    fn linear_scheme() {
        let scheme = BonusScheme::linear(dec!(5), dec!(8000));
        assert_eq!(scheme.compute(dec!(10000)).bonus, dec!(100));
        assert_eq!(scheme.compute(dec!(7000)).bonus, Decimal::ZERO);
    }

    #[test]
    fn tiers_are_marginal() {
        let scheme = BonusScheme::tiered(vec![
            BonusTier {
                threshold: dec!(15000),
                percent: dec!(5),
            },
            BonusTier {
                threshold: dec!(10000),
                percent: dec!(3),
            },
        ]);
        let result = scheme.compute(dec!(20000));
        assert_eq!(result.bonus, dec!(400));
        assert_eq!(result.bands[0].amount, dec!(150));
        assert_eq!(result.bands[1].amount, dec!(250));
        assert_eq!(scheme.compute(dec!(12000)).bonus, dec!(60));
        assert_eq!(scheme.compute(dec!(9000)).bonus, Decimal::ZERO);
    }

    #[test]
    fn payout_is_clamped() {
        let over = settle(dec!(100), dec!(20), Some(dec!(500)));
        assert_eq!(over.available, dec!(120));
        assert_eq!(over.payout, dec!(120));
        assert_eq!(over.carry_over, Decimal::ZERO);
        assert!(over.clamped);

        let under = settle(dec!(100), dec!(20), Some(dec!(-5)));
        assert_eq!(under.payout, Decimal::ZERO);
        assert_eq!(under.carry_over, dec!(120));

        let partial = settle(dec!(100.005), Decimal::ZERO, Some(dec!(40)));
        assert_eq!(partial.carry_over, dec!(60.01));
        assert!(!partial.clamped);
        assert!(partial.payout + partial.carry_over == partial.available);
    }

    #[test]
    fn carryover_feeds_next_month() {
        let mut ledger = MemoryLedger::default();
        let scheme = BonusScheme::linear(dec!(10), Decimal::ZERO);
        {
            let mut engine = BonusEngine::new(&mut ledger);
            engine
                .settle_month(&scheme, 4, 2024, 12, dec!(1000), Some(dec!(30)))
                .unwrap();
            let (_, january) = engine
                .settle_month(&scheme, 4, 2025, 1, dec!(500), None)
                .unwrap();
            assert_eq!(january.previous_carry_over, dec!(70));
            assert_eq!(january.available, dec!(120));
            assert_eq!(january.payout, dec!(120));
        }
        assert_eq!(ledger.rows.len(), 2);
        assert_eq!(previous_period(2025, 1), (2024, 12));
    }
}
