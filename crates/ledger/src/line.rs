use serde::{Deserialize, Serialize};

use tallerpos_core::{MovementId, ProductId};

/// Transient, request-scoped line of a sale or purchase.
///
/// Inventory lines move stock. Service lines are labor or service charges
/// that bypass stock entirely but still carry a price to validate. The
/// variant, not a nullable product id, drives validation dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineItem {
    Inventory {
        product_id: ProductId,
        quantity: i64,
        /// Optional caller-supplied id; with one on every inventory line a
        /// whole batch becomes replay-safe.
        movement_id: Option<MovementId>,
    },
    Service {
        description: String,
        /// Price in cents; must be non-negative.
        price: i64,
    },
}

impl LineItem {
    pub fn inventory(product_id: ProductId, quantity: i64) -> Self {
        Self::Inventory {
            product_id,
            quantity,
            movement_id: None,
        }
    }

    pub fn service(description: impl Into<String>, price: i64) -> Self {
        Self::Service {
            description: description.into(),
            price,
        }
    }

    pub fn is_inventory(&self) -> bool {
        matches!(self, Self::Inventory { .. })
    }

    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            Self::Inventory { product_id, .. } => Some(*product_id),
            Self::Service { .. } => None,
        }
    }
}
