//! # Virtual Ledger
//!
//! Runs several trading strategies against one real brokerage account by
//! giving each its own virtual ledger, netting their orders against shared
//! inventory before anything reaches the venue.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `host`: Trading host interface and the in-process paper host
//! - `portfolio`: Per-strategy ledgers, positions and order sizing
//! - `broker`: Order netting, in-flight tracking and capital reconciliation
//! - `strategy`: Strategy trait, manager and benchmarks
//! - `context`: Run mode, warm-up and trading-day bookkeeping
//! - `error`: Fatal accounting errors
//! - `utils`: Shared utilities and decimal arithmetic

pub mod broker;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod portfolio;
pub mod strategy;
pub mod utils;

pub use config::Config;
pub use error::{AccountingError, AccountingResult};
