use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tallerpos_core::{MovementId, ProductId, ReferenceId};

/// Movement kind.
///
/// Adjustments carry an explicit direction so the signed delta is always
/// derivable from the record alone, without consulting surrounding context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods received (purchase, return-in).
    Inbound,
    /// Goods leaving (sale, consumption in a work order).
    Outbound,
    /// Manual or compensating correction upward.
    AdjustmentIn,
    /// Manual correction downward.
    AdjustmentOut,
}

impl MovementKind {
    /// +1 for stock-increasing kinds, -1 for stock-decreasing kinds.
    pub fn sign(self) -> i64 {
        match self {
            MovementKind::Inbound | MovementKind::AdjustmentIn => 1,
            MovementKind::Outbound | MovementKind::AdjustmentOut => -1,
        }
    }

    pub fn is_adjustment(self) -> bool {
        matches!(self, MovementKind::AdjustmentIn | MovementKind::AdjustmentOut)
    }
}

/// Immutable, append-only record of one stock-quantity change.
///
/// Movements are facts: they are created exactly once and never edited or
/// deleted. A correction is a new compensating movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub kind: MovementKind,
    /// Positive number of units moved.
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    /// Free-text origin (e.g. "sale", "purchase", "consistency-audit").
    pub reference: Option<String>,
    /// Correlation id of the originating document.
    pub reference_id: Option<ReferenceId>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    /// Who performed the change.
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

impl Movement {
    /// Signed stock delta of this movement.
    pub fn signed_delta(&self) -> i64 {
        self.kind.sign() * self.quantity
    }

    /// Record-level consistency: after must equal before plus the signed
    /// delta, and the quantity must be positive.
    pub fn is_consistent(&self) -> bool {
        self.quantity > 0 && self.stock_after == self.stock_before + self.signed_delta()
    }
}

/// Net signed sum of a product's movements, the ledger's truth for its
/// stock, against which the materialized value is audited.
pub fn net_of<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> i64 {
    movements.into_iter().map(Movement::signed_delta).sum()
}

/// Caller-supplied context for one write.
///
/// A caller-supplied `movement_id` makes retries idempotent: replaying the
/// same id after a timeout never double-applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementContext {
    pub movement_id: Option<MovementId>,
    pub reference: Option<String>,
    pub reference_id: Option<ReferenceId>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

impl MovementContext {
    pub fn new(actor: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            movement_id: None,
            reference: None,
            reference_id: None,
            reason: None,
            notes: None,
            actor: actor.into(),
            occurred_at,
        }
    }

    pub fn with_movement_id(mut self, id: MovementId) -> Self {
        self.movement_id = Some(id);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_reference_id(mut self, id: ReferenceId) -> Self {
        self.reference_id = Some(id);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
