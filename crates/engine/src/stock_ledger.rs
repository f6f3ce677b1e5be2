//! The stock ledger write path.
//!
//! `StockLedger` is the only component that mutates stock. Every write is a
//! read-plan-commit cycle: read the product, plan the movement with the
//! pure planners, submit the pair as one `StockTransaction`. The store's
//! optimistic version check serializes writers per product; a loser simply
//! replans from fresh state, up to a bounded number of attempts.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use tallerpos_catalog::Product;
use tallerpos_core::{LedgerError, LedgerResult, MovementId, ProductId};
use tallerpos_ledger::{
    plan_batch, plan_movement, signal_for, LineItem, Movement, MovementContext, MovementKind,
    StockSignal,
};
use tallerpos_store::{LedgerStore, StockTransaction, StoreError};

use crate::notify::StockNotifier;

/// Attempts before a write gives up under sustained contention.
pub(crate) const MAX_COMMIT_RETRIES: usize = 8;

/// Outcome of a single movement. `replayed` is true when the caller's
/// movement id was already committed and nothing new was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMovement {
    pub movement: Movement,
    pub product: Product,
    pub replayed: bool,
}

/// Outcome of a batch. Products carry their post-commit state, one entry
/// per touched product, ordered by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedBatch {
    pub movements: Vec<Movement>,
    pub products: Vec<Product>,
    pub replayed: bool,
}

/// The only path that mutates stock.
#[derive(Debug)]
pub struct StockLedger<S, N> {
    store: S,
    notifier: N,
}

impl<S, N> StockLedger<S, N>
where
    S: LedgerStore,
    N: StockNotifier,
{
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier }
    }

    /// Apply one movement atomically.
    ///
    /// Fails with `NotFound`, `InvalidQuantity` or `InsufficientStock`
    /// without writing anything. With a caller-supplied movement id the
    /// call is idempotent: a replay returns the already-stored movement.
    pub fn apply_movement(
        &self,
        product_id: ProductId,
        kind: MovementKind,
        quantity: i64,
        ctx: &MovementContext,
    ) -> LedgerResult<AppliedMovement> {
        for _ in 0..MAX_COMMIT_RETRIES {
            if let Some(applied) = self.find_replay(product_id, kind, quantity, ctx.movement_id)? {
                return Ok(applied);
            }

            let product = self
                .store
                .get(product_id)?
                .ok_or(LedgerError::NotFound(product_id))?;
            let (movement, updated) = plan_movement(&product, kind, quantity, ctx)?;

            match self
                .store
                .commit(StockTransaction::single(updated, movement.clone()))
            {
                Ok(mut committed) => {
                    let product = committed.pop().ok_or_else(|| {
                        LedgerError::storage("commit returned no product row")
                    })?;
                    info!(
                        product = %product.id,
                        kind = ?kind,
                        quantity,
                        stock = product.stock,
                        "stock movement applied"
                    );
                    self.dispatch_signal(&product, &movement);
                    return Ok(AppliedMovement {
                        movement,
                        product,
                        replayed: false,
                    });
                }
                // Lost the race; replan from fresh state.
                Err(StoreError::Conflict(_)) => continue,
                // Concurrent replay of the same id won; resolve it above.
                Err(StoreError::DuplicateMovement(id)) if ctx.movement_id == Some(id) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::conflict(format!(
            "movement on {product_id} kept losing to concurrent writers"
        )))
    }

    /// Apply a whole batch all-or-nothing.
    ///
    /// The batch is validated against one consistent snapshot; if any line
    /// would drive stock negative (or names an unknown product), zero
    /// movements are written and the per-line failures are returned.
    pub fn apply_batch(
        &self,
        items: &[LineItem],
        kind: MovementKind,
        ctx: &MovementContext,
    ) -> LedgerResult<AppliedBatch> {
        if !items.iter().any(LineItem::is_inventory) {
            return Ok(AppliedBatch {
                movements: Vec::new(),
                products: Vec::new(),
                replayed: false,
            });
        }

        for _ in 0..MAX_COMMIT_RETRIES {
            if let Some(applied) = self.find_batch_replay(items)? {
                return Ok(applied);
            }

            // One consistent snapshot of every involved product. Missing
            // products surface as per-line NotFound failures in the plan.
            let mut snapshot = HashMap::new();
            for item in items {
                if let Some(product_id) = item.product_id() {
                    if !snapshot.contains_key(&product_id) {
                        if let Some(product) = self.store.get(product_id)? {
                            snapshot.insert(product_id, product);
                        }
                    }
                }
            }

            let plan = plan_batch(&snapshot, items, kind, ctx)?;
            match self.store.commit(StockTransaction::new(
                plan.products.clone(),
                plan.movements.clone(),
            )) {
                Ok(committed) => {
                    info!(
                        lines = plan.movements.len(),
                        products = committed.len(),
                        kind = ?kind,
                        "stock batch applied"
                    );
                    for product in &committed {
                        // The last movement of a product decides its signal.
                        if let Some(movement) = plan
                            .movements
                            .iter()
                            .rev()
                            .find(|m| m.product_id == product.id)
                        {
                            self.dispatch_signal(product, movement);
                        }
                    }
                    return Ok(AppliedBatch {
                        movements: plan.movements,
                        products: committed,
                        replayed: false,
                    });
                }
                Err(StoreError::Conflict(_)) | Err(StoreError::DuplicateMovement(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::conflict(
            "batch kept losing to concurrent writers".to_string(),
        ))
    }

    /// Resolve an idempotent replay of a single movement, if any.
    ///
    /// A true retry repeats the stored movement exactly; a reused id with a
    /// different product, kind or quantity is a mismatch, never a silent
    /// replay of the old outcome.
    fn find_replay(
        &self,
        product_id: ProductId,
        kind: MovementKind,
        quantity: i64,
        movement_id: Option<MovementId>,
    ) -> LedgerResult<Option<AppliedMovement>> {
        let Some(id) = movement_id else {
            return Ok(None);
        };
        let Some(existing) = self.store.movement(id)? else {
            return Ok(None);
        };
        if existing.product_id != product_id || existing.kind != kind || existing.quantity != quantity
        {
            return Err(LedgerError::MovementMismatch(id));
        }
        let product = self
            .store
            .get(product_id)?
            .ok_or(LedgerError::NotFound(product_id))?;
        debug!(movement = %id, product = %product_id, "movement replayed, nothing written");
        Ok(Some(AppliedMovement {
            movement: existing,
            product,
            replayed: true,
        }))
    }

    /// A batch replays only when *every* inventory line carries an already
    /// stored movement id; partial overlap means two different batches
    /// collided on ids and is refused.
    fn find_batch_replay(&self, items: &[LineItem]) -> LedgerResult<Option<AppliedBatch>> {
        let mut ids = Vec::new();
        let mut inventory_lines = 0usize;
        for item in items {
            if let LineItem::Inventory { movement_id, .. } = item {
                inventory_lines += 1;
                if let Some(id) = movement_id {
                    ids.push(*id);
                }
            }
        }
        if ids.is_empty() {
            return Ok(None);
        }

        let mut existing = Vec::new();
        for id in &ids {
            if let Some(movement) = self.store.movement(*id)? {
                existing.push(movement);
            }
        }
        if existing.is_empty() {
            return Ok(None);
        }
        if existing.len() != inventory_lines || ids.len() != inventory_lines {
            return Err(LedgerError::conflict(
                "batch partially replayed: some movement ids already recorded".to_string(),
            ));
        }

        let mut product_ids: Vec<ProductId> =
            existing.iter().map(|m| m.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        let mut products = Vec::with_capacity(product_ids.len());
        for id in product_ids {
            products.push(self.store.get(id)?.ok_or(LedgerError::NotFound(id))?);
        }

        debug!(lines = existing.len(), "batch replayed, nothing written");
        Ok(Some(AppliedBatch {
            movements: existing,
            products,
            replayed: true,
        }))
    }

    /// Fire-and-forget threshold signal. Failures never unwind the commit.
    fn dispatch_signal(&self, product: &Product, movement: &Movement) {
        if let Some(signal) = signal_for(product, movement) {
            let kind = match &signal {
                StockSignal::LowStock { .. } => "low_stock",
                StockSignal::OutOfStock { .. } => "out_of_stock",
            };
            debug!(product = %product.id, stock = product.stock, kind, "threshold signal");
            if let Err(e) = self.notifier.notify(&signal) {
                warn!(
                    error = %e,
                    product = %product.id,
                    "threshold signal delivery failed"
                );
            }
        }
    }
}
