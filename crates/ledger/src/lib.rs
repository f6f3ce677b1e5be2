//! Stock ledger domain module.
//!
//! This crate contains the movement record, the transient line items of a
//! sale or purchase, threshold signals, and the *pure* planning functions
//! that decide a stock write from a product snapshot. Decision logic is
//! kept free of IO the same way aggregates separate `handle` from
//! persistence: planners return the movement plus the updated product, or
//! an error, without touching storage.

pub mod line;
pub mod movement;
pub mod plan;
pub mod signal;

pub use line::LineItem;
pub use movement::{net_of, Movement, MovementContext, MovementKind};
pub use plan::{plan_batch, plan_movement, BatchPlan};
pub use signal::{signal_for, StockSignal};
