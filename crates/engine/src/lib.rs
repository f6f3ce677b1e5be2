//! Stock ledger engine: the services that run the shop's inventory.
//!
//! Everything here is a thin orchestration layer over a [`LedgerStore`]:
//! the domain crates decide, the store persists, these services wire the
//! two together and talk to the outside world (notifier, reports).
//!
//! - [`ProductCatalog`]: metadata reads/writes; stock is not reachable
//!   from here.
//! - [`StockLedger`]: the only path that mutates stock.
//! - [`ValidationEngine`]: advisory prechecks before committing a write.
//! - [`ConsistencyAuditor`]: invariant scans and bounded auto-repair.
//! - [`ReportingEngine`]: read-only aggregation.
//!
//! [`LedgerStore`]: tallerpos_store::LedgerStore

pub mod audit;
pub mod catalog;
pub mod notify;
pub mod reporting;
pub mod stock_ledger;
pub mod validation;

pub use audit::{ConsistencyAuditor, Repair, RepairAction, Violation};
pub use catalog::{MetadataUpdate, NewProduct, ProductCatalog};
pub use notify::{ChannelNotifier, NotifyError, NullNotifier, RecordingNotifier, StockNotifier};
pub use reporting::{
    classify, ProductHealth, ReportingEngine, SalesStats, StockHealth, TopSeller, Valuation,
};
pub use stock_ledger::{AppliedBatch, AppliedMovement, StockLedger};
pub use validation::{BatchReport, Issue, LineIssue, ValidationEngine};
