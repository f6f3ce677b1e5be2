//! Price policy.
//!
//! Prices are held in the smallest currency unit (cents). A non-positive
//! price is a hard error. `sale < purchase` is advisory only: the original
//! business rule was ambiguous, so a negative margin is surfaced as a
//! warning and never silently corrected.

use serde::{Deserialize, Serialize};

use tallerpos_core::{LedgerError, LedgerResult};

/// Smallest admissible price, in cents. Also the auto-repair clamp target.
pub const MIN_PRICE: i64 = 1;

/// Advisory pricing condition. Warnings never block a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceAdvisory {
    /// Selling below cost.
    NegativeMargin { purchase: i64, sale: i64 },
}

/// Outcome of a price check: all hard errors plus all advisories, never
/// fail-fast, so a caller can report everything at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceReport {
    pub errors: Vec<LedgerError>,
    pub warnings: Vec<PriceAdvisory>,
}

impl PriceReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Collect every problem with a price pair.
pub fn check_prices(purchase: i64, sale: i64) -> PriceReport {
    let mut report = PriceReport::default();
    if purchase < MIN_PRICE {
        report.errors.push(LedgerError::invalid_price(format!(
            "purchase price must be at least {MIN_PRICE} cent (got {purchase})"
        )));
    }
    if sale < MIN_PRICE {
        report.errors.push(LedgerError::invalid_price(format!(
            "sale price must be at least {MIN_PRICE} cent (got {sale})"
        )));
    }
    if report.is_ok() && sale < purchase {
        report.warnings.push(PriceAdvisory::NegativeMargin { purchase, sale });
    }
    report
}

/// Fail-fast variant used by constructors and patches: returns the first
/// hard error, or the advisories when the pair is admissible.
pub fn validate_prices(purchase: i64, sale: i64) -> LedgerResult<Vec<PriceAdvisory>> {
    let mut report = check_prices(purchase, sale);
    match report.errors.drain(..).next() {
        Some(err) => Err(err),
        None => Ok(report.warnings),
    }
}
