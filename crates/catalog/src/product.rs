use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tallerpos_core::{CategoryId, LedgerError, LedgerResult, ProductId};

use crate::price::{self, PriceAdvisory};

/// Catalog record: one sellable part or supply.
///
/// `stock` is a materialized cache of the movement ledger. It is signed so
/// out-of-band corruption is representable (and detectable by the auditor),
/// but the ledger never commits a negative value. The only write path for
/// it is the stock ledger's combined commit; metadata edits go through
/// [`ProductPatch`], which has no stock field at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Unique short code (e.g. "BRK-PAD-01").
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<CategoryId>,
    /// Prices in smallest currency unit (cents).
    pub purchase_price: i64,
    pub sale_price: i64,
    /// Materialized on-hand quantity.
    pub stock: i64,
    /// Threshold below/at which the product counts as critical.
    pub stock_minimum: i64,
    pub active: bool,
    /// Bumped by the store on every committed write (optimistic concurrency).
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Create a new catalog record. Stock always starts at zero; units only
    /// ever enter through movements.
    pub fn new(
        id: ProductId,
        code: impl Into<String>,
        name: impl Into<String>,
        purchase_price: i64,
        sale_price: i64,
        stock_minimum: i64,
        now: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        let code = code.into();
        let name = name.into();
        if code.trim().is_empty() {
            return Err(LedgerError::validation("code cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(LedgerError::validation("name cannot be empty"));
        }
        if stock_minimum < 0 {
            return Err(LedgerError::validation(format!(
                "stock minimum cannot be negative (got {stock_minimum})"
            )));
        }
        // Negative margin is advisory; constructors only enforce hard rules.
        let _ = price::validate_prices(purchase_price, sale_price)?;

        Ok(Self {
            id,
            code,
            name,
            description: None,
            category: None,
            purchase_price,
            sale_price,
            stock: 0,
            stock_minimum,
            active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Per-unit margin in cents (may be negative; advisory only).
    pub fn margin(&self) -> i64 {
        self.sale_price - self.purchase_price
    }
}

/// Metadata-only patch. Stock is deliberately absent: there is no way to
/// express a stock change through the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<CategoryId>,
    pub purchase_price: Option<i64>,
    pub sale_price: Option<i64>,
    pub stock_minimum: Option<i64>,
    pub active: Option<bool>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the patch, enforcing the same hard rules as construction.
    /// Returns price advisories (never auto-corrected).
    ///
    /// On error the record may be partially modified; callers patch an
    /// owned copy and persist only on success.
    pub fn apply(
        &self,
        product: &mut Product,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<PriceAdvisory>> {
        if let Some(code) = &self.code {
            if code.trim().is_empty() {
                return Err(LedgerError::validation("code cannot be empty"));
            }
            product.code = code.clone();
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(LedgerError::validation("name cannot be empty"));
            }
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(category) = self.category {
            product.category = Some(category);
        }
        if let Some(purchase) = self.purchase_price {
            product.purchase_price = purchase;
        }
        if let Some(sale) = self.sale_price {
            product.sale_price = sale;
        }
        if let Some(minimum) = self.stock_minimum {
            if minimum < 0 {
                return Err(LedgerError::validation(format!(
                    "stock minimum cannot be negative (got {minimum})"
                )));
            }
            product.stock_minimum = minimum;
        }
        if let Some(active) = self.active {
            product.active = active;
        }

        let advisories = price::validate_prices(product.purchase_price, product.sale_price)?;
        product.updated_at = now;
        Ok(advisories)
    }
}
