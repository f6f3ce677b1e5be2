//! Consistency auditing.
//!
//! The auditor never trusts the materialized stock: it recomputes the net
//! of every product's movements from one consistent snapshot and surfaces
//! any divergence. Repairs are bounded and deterministic, and every repair
//! that touches stock goes through the ledger as a compensating movement,
//! so the "ledger is truth" invariant survives the repair itself.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use tallerpos_catalog::{price, MIN_PRICE};
use tallerpos_core::{ExpectedVersion, LedgerError, LedgerResult, MovementId, ProductId};
use tallerpos_ledger::{plan_movement, MovementContext, MovementKind};
use tallerpos_store::{LedgerStore, StockTransaction, StoreError};

use crate::stock_ledger::MAX_COMMIT_RETRIES;

/// Actor recorded on compensating movements.
const AUDIT_ACTOR: &str = "auditor";
/// Reference recorded on compensating movements.
const AUDIT_REFERENCE: &str = "consistency-audit";

/// One detected invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Materialized stock below zero (out-of-band corruption).
    NegativeStock { product_id: ProductId, stock: i64 },

    /// A price outside the admissible range.
    InvalidPrice {
        product_id: ProductId,
        purchase_price: i64,
        sale_price: i64,
    },

    /// Selling below cost. Reported, never fixed.
    NegativeMargin {
        product_id: ProductId,
        purchase_price: i64,
        sale_price: i64,
    },

    /// Materialized stock diverges from the movement net. Reported, never
    /// fixed: an operator has to decide which side is lying.
    LedgerMismatch {
        product_id: ProductId,
        materialized: i64,
        ledger_net: i64,
    },
}

impl Violation {
    pub fn product_id(&self) -> ProductId {
        match self {
            Violation::NegativeStock { product_id, .. }
            | Violation::InvalidPrice { product_id, .. }
            | Violation::NegativeMargin { product_id, .. }
            | Violation::LedgerMismatch { product_id, .. } => *product_id,
        }
    }
}

/// A fix the auditor performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepairAction {
    /// Stock clamped to zero via one compensating adjustment movement.
    StockClamped {
        previous: i64,
        movement_id: MovementId,
    },
    /// Non-positive price(s) clamped to the minimum epsilon.
    PricesClamped {
        purchase_before: i64,
        purchase_after: i64,
        sale_before: i64,
        sale_after: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repair {
    pub product_id: ProductId,
    pub action: RepairAction,
}

/// Scans for invariant violations and performs bounded auto-repair.
#[derive(Debug)]
pub struct ConsistencyAuditor<S> {
    store: S,
}

impl<S: LedgerStore> ConsistencyAuditor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Full scan over one consistent snapshot. Deterministic: products by
    /// id, violations per product in a fixed kind order.
    pub fn scan(&self) -> LedgerResult<Vec<Violation>> {
        let snapshot = self.store.snapshot()?;

        let mut nets: HashMap<ProductId, i64> = HashMap::new();
        for movement in &snapshot.movements {
            *nets.entry(movement.product_id).or_insert(0) += movement.signed_delta();
        }

        let mut violations = Vec::new();
        for product in &snapshot.products {
            if product.stock < 0 {
                violations.push(Violation::NegativeStock {
                    product_id: product.id,
                    stock: product.stock,
                });
            }

            let prices = price::check_prices(product.purchase_price, product.sale_price);
            if !prices.is_ok() {
                violations.push(Violation::InvalidPrice {
                    product_id: product.id,
                    purchase_price: product.purchase_price,
                    sale_price: product.sale_price,
                });
            } else if !prices.warnings.is_empty() {
                violations.push(Violation::NegativeMargin {
                    product_id: product.id,
                    purchase_price: product.purchase_price,
                    sale_price: product.sale_price,
                });
            }

            let ledger_net = nets.get(&product.id).copied().unwrap_or(0);
            if ledger_net != product.stock {
                violations.push(Violation::LedgerMismatch {
                    product_id: product.id,
                    materialized: product.stock,
                    ledger_net,
                });
            }
        }

        if !violations.is_empty() {
            warn!(count = violations.len(), "consistency scan found violations");
        }
        Ok(violations)
    }

    /// Bounded, deterministic repairs.
    ///
    /// Only `NegativeStock` (clamp to 0 via exactly one compensating
    /// `adjustment_in` movement) and `InvalidPrice` (clamp to the 1-cent
    /// epsilon) are fixed. `NegativeMargin` and `LedgerMismatch` are left
    /// for an operator. Products whose stock recovered between scan and
    /// repair are skipped.
    pub fn auto_repair(&self, now: DateTime<Utc>) -> LedgerResult<Vec<Repair>> {
        let mut repairs = Vec::new();

        for violation in self.scan()? {
            match violation {
                Violation::NegativeStock { product_id, .. } => {
                    if let Some(repair) = self.clamp_stock(product_id, now)? {
                        repairs.push(repair);
                    }
                }
                Violation::InvalidPrice { product_id, .. } => {
                    if let Some(repair) = self.clamp_prices(product_id)? {
                        repairs.push(repair);
                    }
                }
                Violation::NegativeMargin { .. } | Violation::LedgerMismatch { .. } => {}
            }
        }

        Ok(repairs)
    }

    /// Clamp negative stock back to zero with one compensating movement.
    ///
    /// The clamp quantity is planned from the same read the commit's
    /// version check runs against, so any write that lands in between
    /// (another sweep included) forces a replan instead of a second blind
    /// adjustment. A product that recovered is skipped.
    fn clamp_stock(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Repair>> {
        for _ in 0..MAX_COMMIT_RETRIES {
            let Some(current) = self.store.get(product_id)? else {
                return Ok(None);
            };
            if current.stock >= 0 {
                return Ok(None);
            }

            let ctx = MovementContext::new(AUDIT_ACTOR, now)
                .with_reference(AUDIT_REFERENCE)
                .with_reason("auto-repair");
            let (movement, updated) =
                plan_movement(&current, MovementKind::AdjustmentIn, -current.stock, &ctx)?;

            match self
                .store
                .commit(StockTransaction::single(updated, movement.clone()))
            {
                Ok(_) => {
                    warn!(
                        product = %product_id,
                        previous = current.stock,
                        "negative stock clamped to zero"
                    );
                    return Ok(Some(Repair {
                        product_id,
                        action: RepairAction::StockClamped {
                            previous: current.stock,
                            movement_id: movement.id,
                        },
                    }));
                }
                Err(StoreError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::conflict(format!(
            "stock repair on {product_id} kept losing to concurrent writers"
        )))
    }

    fn clamp_prices(&self, product_id: ProductId) -> LedgerResult<Option<Repair>> {
        for _ in 0..MAX_COMMIT_RETRIES {
            let Some(mut product) = self.store.get(product_id)? else {
                return Ok(None);
            };
            let (purchase_before, sale_before) = (product.purchase_price, product.sale_price);
            if purchase_before >= MIN_PRICE && sale_before >= MIN_PRICE {
                return Ok(None);
            }
            product.purchase_price = purchase_before.max(MIN_PRICE);
            product.sale_price = sale_before.max(MIN_PRICE);

            let snapshot_version = product.version;
            match self
                .store
                .put(product, ExpectedVersion::Exact(snapshot_version))
            {
                Ok(stored) => {
                    warn!(product = %product_id, "non-positive price clamped to epsilon");
                    return Ok(Some(Repair {
                        product_id,
                        action: RepairAction::PricesClamped {
                            purchase_before,
                            purchase_after: stored.purchase_price,
                            sale_before,
                            sale_after: stored.sale_price,
                        },
                    }));
                }
                Err(StoreError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::conflict(format!(
            "price repair on {product_id} kept losing to concurrent writers"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};

    use tallerpos_catalog::Product;
    use tallerpos_ledger::Movement;
    use tallerpos_sales::{Period, SaleRecord};
    use tallerpos_store::{InMemoryStore, LedgerSnapshot};

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 16, 30, 0).unwrap()
    }

    fn seed(store: &InMemoryStore, code: &str, purchase: i64, sale: i64) -> Product {
        let product = Product::new(
            ProductId::new(),
            code,
            format!("part {code}"),
            purchase,
            sale,
            2,
            test_now(),
        )
        .unwrap();
        store.insert(product.clone()).unwrap();
        store.get(product.id).unwrap().unwrap()
    }

    fn corrupt_stock(store: &InMemoryStore, product_id: ProductId, stock: i64) {
        let mut p = store.get(product_id).unwrap().unwrap();
        p.stock = stock;
        let version = p.version;
        store.put(p, ExpectedVersion::Exact(version)).unwrap();
    }

    #[test]
    fn clean_store_scans_clean() {
        let store = InMemoryStore::new();
        seed(&store, "OK-1", 10, 25);
        let auditor = ConsistencyAuditor::new(&store);
        assert!(auditor.scan().unwrap().is_empty());
    }

    #[test]
    fn negative_stock_reports_both_violations() {
        let store = InMemoryStore::new();
        let product = seed(&store, "NEG-1", 10, 25);
        corrupt_stock(&store, product.id, -3);

        let auditor = ConsistencyAuditor::new(&store);
        let violations = auditor.scan().unwrap();
        // No movements exist, so the mismatch is against a net of zero.
        assert_eq!(
            violations,
            vec![
                Violation::NegativeStock {
                    product_id: product.id,
                    stock: -3,
                },
                Violation::LedgerMismatch {
                    product_id: product.id,
                    materialized: -3,
                    ledger_net: 0,
                },
            ]
        );
    }

    #[test]
    fn negative_margin_is_advisory() {
        let store = InMemoryStore::new();
        let product = seed(&store, "LOSS-1", 50, 40);

        let auditor = ConsistencyAuditor::new(&store);
        let violations = auditor.scan().unwrap();
        assert_eq!(
            violations,
            vec![Violation::NegativeMargin {
                product_id: product.id,
                purchase_price: 50,
                sale_price: 40,
            }]
        );

        assert!(auditor.auto_repair(test_now()).unwrap().is_empty());
        let unchanged = store.get(product.id).unwrap().unwrap();
        assert_eq!(unchanged.sale_price, 40);
    }

    #[test]
    fn repair_clamps_negative_stock_with_one_compensating_movement() {
        let store = InMemoryStore::new();
        let product = seed(&store, "NEG-2", 10, 25);
        corrupt_stock(&store, product.id, -3);

        let auditor = ConsistencyAuditor::new(&store);
        let repairs = auditor.auto_repair(test_now()).unwrap();

        assert_eq!(repairs.len(), 1);
        let RepairAction::StockClamped {
            previous,
            movement_id,
        } = repairs[0].action
        else {
            panic!("expected a stock clamp");
        };
        assert_eq!(previous, -3);

        let repaired = store.get(product.id).unwrap().unwrap();
        assert_eq!(repaired.stock, 0);

        let movements = store.movements_for(product.id).unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].id, movement_id);
        assert_eq!(movements[0].kind, MovementKind::AdjustmentIn);
        assert_eq!(movements[0].quantity, 3);
        assert_eq!(movements[0].actor, AUDIT_ACTOR);
        assert_eq!(movements[0].reason.as_deref(), Some("auto-repair"));
    }

    #[test]
    fn repair_clamps_prices_to_epsilon() {
        let store = InMemoryStore::new();
        let product = seed(&store, "PRC-1", 10, 25);
        let mut broken = store.get(product.id).unwrap().unwrap();
        broken.purchase_price = 0;
        broken.sale_price = -5;
        let version = broken.version;
        store.put(broken, ExpectedVersion::Exact(version)).unwrap();

        let auditor = ConsistencyAuditor::new(&store);
        let repairs = auditor.auto_repair(test_now()).unwrap();

        assert_eq!(
            repairs,
            vec![Repair {
                product_id: product.id,
                action: RepairAction::PricesClamped {
                    purchase_before: 0,
                    purchase_after: MIN_PRICE,
                    sale_before: -5,
                    sale_after: MIN_PRICE,
                },
            }]
        );
        let fixed = store.get(product.id).unwrap().unwrap();
        assert_eq!(fixed.purchase_price, MIN_PRICE);
        assert_eq!(fixed.sale_price, MIN_PRICE);
    }

    #[test]
    fn repair_is_idempotent() {
        let store = InMemoryStore::new();
        let product = seed(&store, "NEG-3", 10, 25);
        corrupt_stock(&store, product.id, -7);

        let auditor = ConsistencyAuditor::new(&store);
        assert_eq!(auditor.auto_repair(test_now()).unwrap().len(), 1);
        assert!(auditor.auto_repair(test_now()).unwrap().is_empty());

        assert_eq!(store.movements_for(product.id).unwrap().len(), 1);
    }

    /// Serves one stale product read, then delegates to the real store.
    struct StaleReadStore {
        inner: InMemoryStore,
        stale: Mutex<Option<Product>>,
    }

    impl LedgerStore for StaleReadStore {
        fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            if let Some(stale) = self.stale.lock().unwrap().take() {
                if stale.id == id {
                    return Ok(Some(stale));
                }
            }
            self.inner.get(id)
        }

        fn list(&self) -> Result<Vec<Product>, StoreError> {
            self.inner.list()
        }

        fn insert(&self, product: Product) -> Result<(), StoreError> {
            self.inner.insert(product)
        }

        fn put(&self, product: Product, expected: ExpectedVersion) -> Result<Product, StoreError> {
            self.inner.put(product, expected)
        }

        fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
            self.inner.movement(id)
        }

        fn movements_for(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
            self.inner.movements_for(product_id)
        }

        fn commit(&self, txn: StockTransaction) -> Result<Vec<Product>, StoreError> {
            self.inner.commit(txn)
        }

        fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
            self.inner.snapshot()
        }

        fn record_sale(&self, sale: SaleRecord) -> Result<(), StoreError> {
            self.inner.record_sale(sale)
        }

        fn sales_in(&self, period: &Period) -> Result<Vec<SaleRecord>, StoreError> {
            self.inner.sales_in(period)
        }
    }

    #[test]
    fn clamp_replans_when_another_sweep_already_repaired() {
        let store = InMemoryStore::new();
        let product = seed(&store, "NEG-4", 10, 25);
        corrupt_stock(&store, product.id, -3);
        let stale = store.get(product.id).unwrap().unwrap();

        // Another sweep repairs the product after our read.
        let mut repaired = store.get(product.id).unwrap().unwrap();
        repaired.stock = 0;
        let version = repaired.version;
        store
            .put(repaired, ExpectedVersion::Exact(version))
            .unwrap();

        let racing = StaleReadStore {
            inner: store,
            stale: Mutex::new(Some(stale)),
        };
        let auditor = ConsistencyAuditor::new(&racing);

        // The stale read plans +3, the commit's version check rejects it,
        // and the replan sees the recovered stock. No second adjustment.
        let repair = auditor.clamp_stock(product.id, test_now()).unwrap();
        assert!(repair.is_none());
        assert_eq!(racing.inner.get(product.id).unwrap().unwrap().stock, 0);
        assert!(racing.inner.movements_for(product.id).unwrap().is_empty());
    }
}
