//! Persistence collaborator for the stock ledger.
//!
//! The [`LedgerStore`] trait is the seam between the engine and whatever
//! holds the records: the in-memory implementation here for single-process
//! deployments and tests, a database transaction for remote ones. The one
//! hard requirement is that [`LedgerStore::commit`] applies the stock write
//! and its movement append as a single indivisible unit.

pub mod in_memory;
mod store;

pub use in_memory::InMemoryStore;
pub use store::{LedgerSnapshot, LedgerStore, StockTransaction, StoreError};
