//! Product catalog domain types.
//!
//! This crate contains the catalog record and its metadata rules as pure
//! domain logic (no IO, no storage). Stock is a materialized cache of the
//! movement ledger and is never written through catalog operations.

pub mod price;
pub mod product;

pub use price::{PriceAdvisory, PriceReport, MIN_PRICE};
pub use product::{Product, ProductPatch};
