//! Per-strategy virtual ledgers.
//!
//! - `position`: weighted-average-cost holding of one symbol
//! - `ledger`: cash, positions, order queue and valuation of one strategy
//! - `sizing`: fee-aware target-allocation quantity solver

mod ledger;
mod position;
pub mod sizing;

pub use ledger::Portfolio;
pub use position::Position;
pub use sizing::{solve_quantity, SizingInput};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a ledger owned by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortfolioId(pub usize);

impl PortfolioId {
    /// The ledger mirroring the real brokerage account.
    pub const HOUSE: PortfolioId = PortfolioId(usize::MAX);

    pub fn is_house(&self) -> bool {
        *self == Self::HOUSE
    }
}

impl fmt::Display for PortfolioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_house() {
            f.write_str("house")
        } else {
            write!(f, "portfolio-{}", self.0)
        }
    }
}
