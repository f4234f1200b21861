//! A single symbol's holding inside one ledger.

use crate::error::{AccountingError, AccountingResult};
use crate::utils::decimal::{snap_to_zero, QUANTITY_EPSILON};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Quantity and weighted-average cost basis of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    /// Signed quantity in shares/contracts
    pub quantity: Decimal,
    /// Cost basis per unit; only moves on quantity-increasing fills
    pub average_price: Decimal,
    /// Fees paid on fills of this position
    pub fees: Decimal,
}

impl Position {
    pub fn new(symbol: &str, quantity: Decimal, average_price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity,
            average_price,
            fees: Decimal::ZERO,
        }
    }

    /// Empty position, ready for its first fill.
    pub fn flat(symbol: &str) -> Self {
        Self::new(symbol, Decimal::ZERO, Decimal::ZERO)
    }

    /// Apply a fill of `quantity` units at `price`.
    ///
    /// Buys re-weight the average price. Sells leave it untouched: the
    /// reduction is booked at cost, not at the fill price. A sell larger
    /// than the held quantity fails and leaves the position unchanged.
    pub fn fill(&mut self, quantity: Decimal, price: Decimal) -> AccountingResult<()> {
        if quantity == Decimal::ZERO {
            return Ok(());
        }

        let resulting = self.quantity + quantity;
        if resulting < -QUANTITY_EPSILON {
            return Err(AccountingError::NegativeHoldings {
                symbol: self.symbol.clone(),
                quantity: resulting,
            });
        }

        if quantity > Decimal::ZERO {
            self.average_price = if resulting == Decimal::ZERO {
                Decimal::ZERO
            } else {
                (self.quantity * self.average_price + quantity * price) / resulting
            };
        }

        self.quantity = snap_to_zero(resulting);
        Ok(())
    }

    /// Nothing left to hold; the owning ledger drops closed positions.
    pub fn is_closed(&self) -> bool {
        self.quantity == Decimal::ZERO
    }

    pub fn total_cost(&self) -> Decimal {
        self.quantity * self.average_price
    }

    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.quantity * price
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{:.1} (${:.2})",
            self.symbol,
            self.quantity,
            self.total_cost()
        )
    }
}
