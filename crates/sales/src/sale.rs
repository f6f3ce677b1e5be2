use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tallerpos_core::{LedgerError, LedgerResult, ProductId, SaleId};

/// One product line of a completed sale.
///
/// `unit_cost` captures the purchase price at sale time, so margins stay
/// correct when the catalog price changes later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price charged, in cents per unit.
    pub unit_price: i64,
    /// Cost at sale time, in cents per unit.
    pub unit_cost: i64,
}

impl SaleLine {
    pub fn revenue(&self) -> i64 {
        self.quantity * self.unit_price
    }

    pub fn cost(&self) -> i64 {
        self.quantity * self.unit_cost
    }

    pub fn margin(&self) -> i64 {
        self.revenue() - self.cost()
    }
}

/// Immutable snapshot of a completed sale. Service charges carry no stock
/// and are not recorded here; they never feed product statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: SaleId,
    pub completed_at: DateTime<Utc>,
    pub lines: Vec<SaleLine>,
}

impl SaleRecord {
    pub fn new(id: SaleId, completed_at: DateTime<Utc>, lines: Vec<SaleLine>) -> Self {
        Self {
            id,
            completed_at,
            lines,
        }
    }

    /// Units of one product in this sale.
    pub fn units_of(&self, product_id: ProductId) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .sum()
    }
}

/// Closed reporting window `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Period {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> LedgerResult<Self> {
        if from > to {
            return Err(LedgerError::validation(format!(
                "period start {from} is after its end {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// Inclusive on both ends.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at <= self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn period_is_inclusive_on_both_ends() {
        let period = Period::new(at("2026-03-01T00:00:00Z"), at("2026-03-31T23:59:59Z")).unwrap();
        assert!(period.contains(at("2026-03-01T00:00:00Z")));
        assert!(period.contains(at("2026-03-31T23:59:59Z")));
        assert!(!period.contains(at("2026-04-01T00:00:00Z")));
    }

    #[test]
    fn inverted_period_is_rejected() {
        let err =
            Period::new(at("2026-03-31T00:00:00Z"), at("2026-03-01T00:00:00Z")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn sale_line_money_math() {
        let line = SaleLine {
            product_id: ProductId::new(),
            quantity: 3,
            unit_price: 1500,
            unit_cost: 1000,
        };
        assert_eq!(line.revenue(), 4500);
        assert_eq!(line.cost(), 3000);
        assert_eq!(line.margin(), 1500);
    }

    #[test]
    fn units_of_sums_repeated_lines() {
        let product_id = ProductId::new();
        let sale = SaleRecord::new(
            SaleId::new(),
            at("2026-03-05T12:00:00Z"),
            vec![
                SaleLine {
                    product_id,
                    quantity: 2,
                    unit_price: 1500,
                    unit_cost: 1000,
                },
                SaleLine {
                    product_id,
                    quantity: 1,
                    unit_price: 1400,
                    unit_cost: 1000,
                },
                SaleLine {
                    product_id: ProductId::new(),
                    quantity: 5,
                    unit_price: 200,
                    unit_cost: 100,
                },
            ],
        );
        assert_eq!(sale.units_of(product_id), 3);
    }
}
