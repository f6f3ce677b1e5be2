//! Product catalog service: metadata reads and writes.
//!
//! Stock is not reachable from here. `ProductPatch` has no stock field, so
//! the only way units enter or leave a product is through the stock ledger.

use chrono::{DateTime, Utc};
use tracing::info;

use tallerpos_catalog::{PriceAdvisory, Product, ProductPatch};
use tallerpos_core::{CategoryId, ExpectedVersion, LedgerError, LedgerResult, ProductId};
use tallerpos_store::{LedgerStore, StoreError};

use crate::stock_ledger::MAX_COMMIT_RETRIES;

/// Input for creating a catalog record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<CategoryId>,
    pub purchase_price: i64,
    pub sale_price: i64,
    pub stock_minimum: i64,
}

/// Result of a metadata write: the stored record plus any price advisories
/// (warnings are returned, never acted on).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub product: Product,
    pub advisories: Vec<PriceAdvisory>,
}

/// Metadata surface over the store.
#[derive(Debug)]
pub struct ProductCatalog<S> {
    store: S,
}

impl<S: LedgerStore> ProductCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, id: ProductId) -> LedgerResult<Product> {
        self.store.get(id)?.ok_or(LedgerError::NotFound(id))
    }

    pub fn list(&self) -> LedgerResult<Vec<Product>> {
        Ok(self.store.list()?)
    }

    /// Create a product. Stock starts at zero; initial inventory arrives as
    /// an inbound movement through the ledger.
    pub fn create(&self, new: NewProduct, now: DateTime<Utc>) -> LedgerResult<Product> {
        let mut product = Product::new(
            ProductId::new(),
            new.code,
            new.name,
            new.purchase_price,
            new.sale_price,
            new.stock_minimum,
            now,
        )?;
        product.description = new.description;
        product.category = new.category;

        self.store.insert(product.clone())?;
        info!(product = %product.id, code = %product.code, "product created");
        Ok(product)
    }

    /// Patch non-stock fields. Retried against fresh state when a
    /// concurrent writer invalidates the snapshot.
    pub fn upsert_metadata(
        &self,
        id: ProductId,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> LedgerResult<MetadataUpdate> {
        if patch.is_empty() {
            return Ok(MetadataUpdate {
                product: self.get(id)?,
                advisories: Vec::new(),
            });
        }

        for _ in 0..MAX_COMMIT_RETRIES {
            let mut product = self.get(id)?;
            let snapshot_version = product.version;
            let advisories = patch.apply(&mut product, now)?;

            match self.store.put(product, ExpectedVersion::Exact(snapshot_version)) {
                Ok(stored) => {
                    info!(product = %stored.id, "product metadata updated");
                    return Ok(MetadataUpdate {
                        product: stored,
                        advisories,
                    });
                }
                Err(StoreError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::conflict(format!(
            "metadata update on {id} kept losing to concurrent writers"
        )))
    }
}
