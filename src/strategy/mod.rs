//! Strategy hosting.
//!
//! - `algorithm`: the `Strategy` trait and the per-ledger `Algorithm` handle
//! - `manager`: fans host callbacks out to strategies and drives the broker
//! - `benchmark`: buy-and-hold reference returns
//! - `target_weights`: fixed-weight rebalancing strategy

mod algorithm;
mod benchmark;
mod manager;
mod target_weights;

pub use algorithm::{Algorithm, Strategy};
pub use benchmark::Benchmark;
pub use manager::{PerformanceRow, StrategyManager};
pub use target_weights::TargetWeights;
