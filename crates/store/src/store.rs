use std::sync::Arc;

use thiserror::Error;

use tallerpos_catalog::Product;
use tallerpos_core::{ExpectedVersion, LedgerError, MovementId, ProductId};
use tallerpos_ledger::Movement;
use tallerpos_sales::{Period, SaleRecord};

/// One atomic stock write: the updated product rows plus the movements that
/// explain them. Either everything commits or nothing does.
///
/// Each product row carries the `version` of the snapshot it was planned
/// from; the store checks that version against the current record before
/// applying, and bumps it on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockTransaction {
    pub products: Vec<Product>,
    pub movements: Vec<Movement>,
}

impl StockTransaction {
    pub fn new(products: Vec<Product>, movements: Vec<Movement>) -> Self {
        Self { products, movements }
    }

    pub fn single(product: Product, movement: Movement) -> Self {
        Self {
            products: vec![product],
            movements: vec![movement],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.movements.is_empty()
    }
}

/// Consistent read view: products and movements captured under one lock,
/// never a half-applied pair. Auditor and reporting reads go through this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Ordered by product id.
    pub products: Vec<Product>,
    /// In application order (the total order of the ledger).
    pub movements: Vec<Movement>,
}

/// Store operation error.
///
/// These are infrastructure failures (concurrency, duplicate keys, backend
/// faults) as opposed to the business failures in `LedgerError`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Version check failed; the caller's snapshot is stale.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// The movement id is already recorded. Retries hitting this have
    /// already been applied.
    #[error("duplicate movement id: {0}")]
    DuplicateMovement(MovementId),

    /// A product code collided with another record.
    #[error("duplicate product code: {0}")]
    DuplicateCode(String),

    /// The transaction referenced a product the store does not hold.
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    /// The transaction was malformed (inconsistent movement, orphan row).
    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    /// The backend failed.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            StoreError::DuplicateMovement(id) => {
                LedgerError::Conflict(format!("movement {id} already recorded"))
            }
            StoreError::DuplicateCode(code) => {
                LedgerError::Conflict(format!("product code '{code}' already in use"))
            }
            StoreError::UnknownProduct(id) => LedgerError::NotFound(id),
            StoreError::InvalidCommit(msg) => LedgerError::Storage(msg),
            StoreError::Backend(msg) => LedgerError::Storage(msg),
        }
    }
}

/// Record store behind the ledger.
///
/// Implementations may be embedded or remote; the engine only relies on the
/// contract below. `put` is a raw record write used by the metadata path
/// (and deliberately by tests to simulate out-of-band corruption); all
/// stock-changing writes go through `commit`.
pub trait LedgerStore: Send + Sync {
    fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    fn list(&self) -> Result<Vec<Product>, StoreError>;

    /// Create a product record. Fails on duplicate id or code.
    fn insert(&self, product: Product) -> Result<(), StoreError>;

    /// Replace a product record after a version check. Returns the stored
    /// row (version bumped).
    fn put(&self, product: Product, expected: ExpectedVersion) -> Result<Product, StoreError>;

    fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError>;

    /// All movements of one product, in application order.
    fn movements_for(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError>;

    /// Apply a stock transaction atomically: check every product version,
    /// reject duplicate movement ids, then write all rows and append all
    /// movements. Returns the committed product rows (versions bumped), in
    /// the order submitted.
    fn commit(&self, txn: StockTransaction) -> Result<Vec<Product>, StoreError>;

    /// Consistent products + movements view.
    fn snapshot(&self) -> Result<LedgerSnapshot, StoreError>;

    fn record_sale(&self, sale: SaleRecord) -> Result<(), StoreError>;

    /// Completed sales inside the window, inclusive on both ends.
    fn sales_in(&self, period: &Period) -> Result<Vec<SaleRecord>, StoreError>;
}

impl<S> LedgerStore for &S
where
    S: LedgerStore + ?Sized,
{
    fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list()
    }

    fn insert(&self, product: Product) -> Result<(), StoreError> {
        (**self).insert(product)
    }

    fn put(&self, product: Product, expected: ExpectedVersion) -> Result<Product, StoreError> {
        (**self).put(product, expected)
    }

    fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        (**self).movement(id)
    }

    fn movements_for(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        (**self).movements_for(product_id)
    }

    fn commit(&self, txn: StockTransaction) -> Result<Vec<Product>, StoreError> {
        (**self).commit(txn)
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        (**self).snapshot()
    }

    fn record_sale(&self, sale: SaleRecord) -> Result<(), StoreError> {
        (**self).record_sale(sale)
    }

    fn sales_in(&self, period: &Period) -> Result<Vec<SaleRecord>, StoreError> {
        (**self).sales_in(period)
    }
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list()
    }

    fn insert(&self, product: Product) -> Result<(), StoreError> {
        (**self).insert(product)
    }

    fn put(&self, product: Product, expected: ExpectedVersion) -> Result<Product, StoreError> {
        (**self).put(product, expected)
    }

    fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        (**self).movement(id)
    }

    fn movements_for(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        (**self).movements_for(product_id)
    }

    fn commit(&self, txn: StockTransaction) -> Result<Vec<Product>, StoreError> {
        (**self).commit(txn)
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        (**self).snapshot()
    }

    fn record_sale(&self, sale: SaleRecord) -> Result<(), StoreError> {
        (**self).record_sale(sale)
    }

    fn sales_in(&self, period: &Period) -> Result<Vec<SaleRecord>, StoreError> {
        (**self).sales_in(period)
    }
}
