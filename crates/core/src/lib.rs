//! Foundation building blocks for the stock ledger.
//!
//! This crate contains **pure domain** primitives (no storage, no IO):
//! strongly-typed identifiers, the typed error model, and the optimistic
//! concurrency expectation used by the record store.

pub mod error;
pub mod id;
pub mod version;

pub use error::{LedgerError, LedgerResult, LineFailure};
pub use id::{CategoryId, MovementId, ProductId, ReferenceId, SaleId};
pub use version::ExpectedVersion;
