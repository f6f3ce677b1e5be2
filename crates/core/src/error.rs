//! Ledger error model.

use thiserror::Error;

use crate::id::{MovementId, ProductId};

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// One failing line of a rejected batch, indexed into the caller's line list
/// (service lines included, so callers can pinpoint the exact line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFailure {
    pub line: usize,
    pub error: Box<LedgerError>,
}

/// Typed ledger error.
///
/// Keep this focused on deterministic, business-level failures. Storage
/// concerns surface only through the `Conflict`/`Storage` variants, already
/// translated by the store layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A value failed validation (e.g. empty name or code).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The referenced product does not exist.
    #[error("product not found: {0}")]
    NotFound(ProductId),

    /// Movement quantity must be a positive integer.
    #[error("quantity must be a positive integer (got {0})")]
    InvalidQuantity(i64),

    /// The movement would drive stock below zero. Nothing was written.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A price is outside the admissible range.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// A replayed movement id matched a stored movement with a different
    /// product, kind or quantity.
    #[error("movement {0} already recorded with different attributes")]
    MovementMismatch(MovementId),

    /// The whole batch was rejected; zero movements were written.
    #[error("batch rejected ({} failing line(s))", .0.len())]
    BatchRejected(Vec<LineFailure>),

    /// Concurrent writers kept invalidating the snapshot (or a stale
    /// version was submitted). Nothing was written by this attempt.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The record store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_price(msg: impl Into<String>) -> Self {
        Self::InvalidPrice(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
