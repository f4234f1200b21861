//! Accounting failures that must abort a run.
//!
//! Anything in here indicates a bookkeeping bug rather than a market
//! condition, so callers propagate it with `?` instead of recovering.

use crate::portfolio::PortfolioId;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountingError {
    /// A reducing fill would leave a ledger short. Sells must be capped at
    /// the held quantity before they reach a ledger.
    #[error("negative holdings of {symbol}: fill would leave {quantity}")]
    NegativeHoldings { symbol: String, quantity: Decimal },

    /// Strategy ledgers claim more value than the real account holds.
    #[error("insufficient funds in real portfolio (${real:.2}) to support running strategies (${allocated:.2})")]
    InsufficientCapital { real: Decimal, allocated: Decimal },

    /// An order references a ledger the broker does not own.
    #[error("unknown portfolio {0}")]
    UnknownPortfolio(PortfolioId),
}

pub type AccountingResult<T> = std::result::Result<T, AccountingError>;
