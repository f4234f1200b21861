//! The host surface the ledger core depends on.
//!
//! The trading platform owns the event loop, quotes and the real account.
//! The core never reaches into the host beyond what is listed here, so any
//! platform (or the in-process [`PaperHost`](super::PaperHost)) can drive it.

use super::types::{AccountSnapshot, FeeSchedule, OrderTicket, SymbolProperties};
use anyhow::Result;
use rust_decimal::Decimal;

/// Operations consumed from the trading host.
///
/// Submission calls return either a pending ticket (a fill event follows
/// later) or a ticket that is already terminal (synchronous fill).
#[cfg_attr(test, mockall::automock)]
pub trait Host {
    /// Current price of `symbol`, or `None` when no quote is available.
    fn price(&self, symbol: &str) -> Option<Decimal>;

    /// Lot size and quote currency for `symbol`.
    fn symbol_properties(&self, symbol: &str) -> SymbolProperties;

    /// Fee schedule applied to orders in `symbol`.
    fn fee_schedule(&self, symbol: &str) -> FeeSchedule;

    /// Cash by currency and non-cash holdings of the real account.
    fn account(&self) -> AccountSnapshot;

    fn market_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        asynchronous: bool,
        tag: &str,
    ) -> Result<OrderTicket>;

    fn limit_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        limit_price: Decimal,
        tag: &str,
    ) -> Result<OrderTicket>;

    fn stop_market_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        stop_price: Decimal,
        tag: &str,
    ) -> Result<OrderTicket>;

    fn stop_limit_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
        tag: &str,
    ) -> Result<OrderTicket>;

    fn market_on_open_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        tag: &str,
    ) -> Result<OrderTicket>;

    fn market_on_close_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        tag: &str,
    ) -> Result<OrderTicket>;

    fn option_exercise_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        tag: &str,
    ) -> Result<OrderTicket>;
}
