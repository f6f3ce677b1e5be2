//! Threshold signals fired after successful stock writes.

use serde::{Deserialize, Serialize};

use tallerpos_catalog::Product;

use crate::movement::Movement;

/// Signal dispatched to the external notifier after a committed write.
///
/// Delivery is fire-and-forget; a failed delivery is never rolled back
/// against the stock change that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockSignal {
    /// `0 < stock <= stock_minimum` after the write.
    LowStock { product: Product, movement: Movement },
    /// Stock reached exactly zero.
    OutOfStock { product: Product, movement: Movement },
}

impl StockSignal {
    pub fn product(&self) -> &Product {
        match self {
            StockSignal::LowStock { product, .. } | StockSignal::OutOfStock { product, .. } => {
                product
            }
        }
    }

    pub fn movement(&self) -> &Movement {
        match self {
            StockSignal::LowStock { movement, .. } | StockSignal::OutOfStock { movement, .. } => {
                movement
            }
        }
    }
}

/// Signal for a product's post-write state, if any.
pub fn signal_for(product: &Product, movement: &Movement) -> Option<StockSignal> {
    if product.stock == 0 {
        Some(StockSignal::OutOfStock {
            product: product.clone(),
            movement: movement.clone(),
        })
    } else if product.stock > 0 && product.stock <= product.stock_minimum {
        Some(StockSignal::LowStock {
            product: product.clone(),
            movement: movement.clone(),
        })
    } else {
        None
    }
}
