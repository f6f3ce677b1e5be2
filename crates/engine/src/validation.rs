//! Advisory prechecks.
//!
//! Everything here is a courtesy to the caller: the authoritative checks
//! run again inside the ledger's serialized write path. A batch report
//! collects *all* per-line problems so a sale form can mark every bad line
//! at once instead of failing on the first.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use thiserror::Error;

use tallerpos_catalog::{price, PriceReport, Product};
use tallerpos_core::{LedgerError, LedgerResult, ProductId};
use tallerpos_ledger::{LineItem, MovementKind};
use tallerpos_store::LedgerStore;

/// One per-line finding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Issue {
    #[error("product not found: {0}")]
    UnknownProduct(ProductId),

    #[error("quantity must be a positive integer (got {0})")]
    InvalidQuantity(i64),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("service price cannot be negative (got {0})")]
    NegativeServicePrice(i64),

    /// Warning: the product is flagged inactive but can still be moved.
    #[error("product {0} is inactive")]
    InactiveProduct(ProductId),

    /// Warning: the line leaves the product at or under its minimum.
    #[error("resulting stock {resulting} at/under minimum {minimum}")]
    AtOrBelowMinimum { resulting: i64, minimum: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIssue {
    pub line: usize,
    pub issue: Issue,
}

/// All findings for a batch, split into blocking errors and advisories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub errors: Vec<LineIssue>,
    pub warnings: Vec<LineIssue>,
}

impl BatchReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Stateless precondition checks over the store.
#[derive(Debug)]
pub struct ValidationEngine<S> {
    store: S,
}

impl<S: LedgerStore> ValidationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Quick availability precheck for one product.
    pub fn validate_availability(&self, product_id: ProductId, quantity: i64) -> LedgerResult<()> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity(quantity));
        }
        let product = self
            .store
            .get(product_id)?
            .ok_or(LedgerError::NotFound(product_id))?;
        if product.stock < quantity {
            return Err(LedgerError::InsufficientStock {
                requested: quantity,
                available: product.stock.max(0),
            });
        }
        Ok(())
    }

    /// Check a whole batch against one snapshot, collecting every finding.
    ///
    /// Running stock carries across lines, so two lines of the same product
    /// are judged jointly. Inbound batches skip availability (goods
    /// arriving cannot overdraw); service lines are checked for price only.
    pub fn validate_batch(
        &self,
        items: &[LineItem],
        kind: MovementKind,
    ) -> LedgerResult<BatchReport> {
        let mut report = BatchReport::default();
        let mut cache: HashMap<ProductId, Option<Product>> = HashMap::new();
        let mut running: HashMap<ProductId, i64> = HashMap::new();

        for (idx, item) in items.iter().enumerate() {
            match item {
                LineItem::Service { price, .. } => {
                    if *price < 0 {
                        report.errors.push(LineIssue {
                            line: idx,
                            issue: Issue::NegativeServicePrice(*price),
                        });
                    }
                }
                LineItem::Inventory {
                    product_id,
                    quantity,
                    ..
                } => {
                    if *quantity <= 0 {
                        report.errors.push(LineIssue {
                            line: idx,
                            issue: Issue::InvalidQuantity(*quantity),
                        });
                        continue;
                    }

                    let cached = match cache.entry(*product_id) {
                        Entry::Occupied(e) => e.into_mut(),
                        Entry::Vacant(e) => e.insert(self.store.get(*product_id)?),
                    };
                    let product = match cached {
                        Some(product) => product,
                        None => {
                            report.errors.push(LineIssue {
                                line: idx,
                                issue: Issue::UnknownProduct(*product_id),
                            });
                            continue;
                        }
                    };

                    if !product.active {
                        report.warnings.push(LineIssue {
                            line: idx,
                            issue: Issue::InactiveProduct(*product_id),
                        });
                    }

                    let available = running.entry(*product_id).or_insert(product.stock);
                    let resulting = *available + kind.sign() * quantity;
                    if resulting < 0 {
                        report.errors.push(LineIssue {
                            line: idx,
                            issue: Issue::InsufficientStock {
                                requested: *quantity,
                                available: (*available).max(0),
                            },
                        });
                        continue;
                    }
                    *available = resulting;

                    if resulting <= product.stock_minimum {
                        report.warnings.push(LineIssue {
                            line: idx,
                            issue: Issue::AtOrBelowMinimum {
                                resulting,
                                minimum: product.stock_minimum,
                            },
                        });
                    }
                }
            }
        }

        Ok(report)
    }

    /// Price pair check: all hard errors plus the negative-margin advisory.
    pub fn validate_prices(&self, purchase_price: i64, sale_price: i64) -> PriceReport {
        price::check_prices(purchase_price, sale_price)
    }
}
