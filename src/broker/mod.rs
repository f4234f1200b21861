//! Order netting and capital allocation across strategy ledgers.
//!
//! - `order`: order intents queued by ledgers
//! - `netting`: the two-phase execution cycle and in-flight registry
//! - `reconciler`: rebuilds the house from the real account and re-funds
//!   strategies

mod netting;
mod order;
mod reconciler;

pub use netting::{Broker, ExecutionSummary};
pub use order::Order;
pub use reconciler::{AllocationReconciler, AllocationRow, ReconcileReport};
