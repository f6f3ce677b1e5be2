//! Completed-sale snapshots consumed by reporting.

pub mod sale;

pub use sale::{Period, SaleLine, SaleRecord};
