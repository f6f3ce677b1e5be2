use std::collections::HashMap;
use std::sync::RwLock;

use tallerpos_catalog::Product;
use tallerpos_core::{ExpectedVersion, MovementId, ProductId};
use tallerpos_ledger::Movement;
use tallerpos_sales::{Period, SaleRecord};

use crate::store::{LedgerSnapshot, LedgerStore, StockTransaction, StoreError};

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<ProductId, Product>,
    code_index: HashMap<String, ProductId>,
    /// Append-only, in application order, the total order of the ledger.
    movements: Vec<Movement>,
    movement_index: HashMap<MovementId, usize>,
    sales: Vec<SaleRecord>,
}

/// In-memory record store.
///
/// Intended for single-process deployments and tests. One writer lock per
/// commit makes multi-product transactions atomic and gives `snapshot()`
/// readers a consistent view; not optimized for throughput.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("lock poisoned".to_string())
    }
}

impl LedgerStore for InMemoryStore {
    fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner.products.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        let mut products: Vec<Product> = inner.products.values().cloned().collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    fn insert(&self, product: Product) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        if inner.products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id
            )));
        }
        if inner.code_index.contains_key(&product.code) {
            return Err(StoreError::DuplicateCode(product.code));
        }
        inner.code_index.insert(product.code.clone(), product.id);
        inner.products.insert(product.id, product);
        Ok(())
    }

    fn put(&self, product: Product, expected: ExpectedVersion) -> Result<Product, StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let current = inner
            .products
            .get(&product.id)
            .ok_or(StoreError::UnknownProduct(product.id))?;
        let current_version = current.version;
        let current_code = current.code.clone();

        if !expected.matches(current_version) {
            return Err(StoreError::Conflict(format!(
                "product {} is at version {current_version}, expected {expected:?}",
                product.id
            )));
        }
        if product.code != current_code {
            if let Some(owner) = inner.code_index.get(&product.code) {
                if *owner != product.id {
                    return Err(StoreError::DuplicateCode(product.code));
                }
            }
            inner.code_index.remove(&current_code);
            inner.code_index.insert(product.code.clone(), product.id);
        }

        let mut stored = product;
        stored.version = current_version + 1;
        inner.products.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner
            .movement_index
            .get(&id)
            .map(|idx| inner.movements[*idx].clone()))
    }

    fn movements_for(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }

    fn commit(&self, txn: StockTransaction) -> Result<Vec<Product>, StoreError> {
        if txn.is_empty() {
            return Ok(vec![]);
        }

        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;

        // Validate everything before touching anything.
        let mut seen = HashMap::new();
        for movement in &txn.movements {
            if !movement.is_consistent() {
                return Err(StoreError::InvalidCommit(format!(
                    "movement {} does not balance (before {}, after {}, delta {})",
                    movement.id,
                    movement.stock_before,
                    movement.stock_after,
                    movement.signed_delta()
                )));
            }
            if inner.movement_index.contains_key(&movement.id)
                || seen.insert(movement.id, ()).is_some()
            {
                return Err(StoreError::DuplicateMovement(movement.id));
            }
            if !txn.products.iter().any(|p| p.id == movement.product_id) {
                return Err(StoreError::InvalidCommit(format!(
                    "movement {} targets product {} missing from the transaction",
                    movement.id, movement.product_id
                )));
            }
        }
        for product in &txn.products {
            let current = inner
                .products
                .get(&product.id)
                .ok_or(StoreError::UnknownProduct(product.id))?;
            if current.version != product.version {
                return Err(StoreError::Conflict(format!(
                    "product {} is at version {}, transaction planned from {}",
                    product.id, current.version, product.version
                )));
            }
        }

        // Apply. All checks passed, so this cannot partially fail.
        let mut committed = Vec::with_capacity(txn.products.len());
        for product in txn.products {
            let mut stored = product;
            stored.version += 1;
            inner.products.insert(stored.id, stored.clone());
            committed.push(stored);
        }
        for movement in txn.movements {
            let idx = inner.movements.len();
            inner.movement_index.insert(movement.id, idx);
            inner.movements.push(movement);
        }

        Ok(committed)
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        let mut products: Vec<Product> = inner.products.values().cloned().collect();
        products.sort_by_key(|p| p.id);
        Ok(LedgerSnapshot {
            products,
            movements: inner.movements.clone(),
        })
    }

    fn record_sale(&self, sale: SaleRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        inner.sales.push(sale);
        Ok(())
    }

    fn sales_in(&self, period: &Period) -> Result<Vec<SaleRecord>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner
            .sales
            .iter()
            .filter(|s| period.contains(s.completed_at))
            .cloned()
            .collect())
    }
}
