//! Order intents raised by strategy ledgers.

use crate::host::{OrderId, OrderType};
use crate::portfolio::PortfolioId;
use rust_decimal::Decimal;
use std::fmt;

/// An intent to change one ledger's holding of one symbol.
///
/// Equality and hashing cover the dispatch state (`ticket`) too, so two
/// orders only compare equal once both intent and submission outcome
/// match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Order {
    /// Ledger the order belongs to
    pub portfolio: PortfolioId,
    pub symbol: String,
    /// Signed remaining quantity (negative = sell)
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub tag: String,
    /// Host identifier, set once the order is forwarded externally
    pub ticket: Option<OrderId>,
}

impl Order {
    fn new(portfolio: PortfolioId, symbol: &str, quantity: Decimal, order_type: OrderType) -> Self {
        Self {
            portfolio,
            symbol: symbol.to_string(),
            quantity,
            order_type,
            limit_price: None,
            stop_price: None,
            tag: String::new(),
            ticket: None,
        }
    }

    pub fn market(portfolio: PortfolioId, symbol: &str, quantity: Decimal) -> Self {
        Self::new(portfolio, symbol, quantity, OrderType::Market)
    }

    pub fn limit(
        portfolio: PortfolioId,
        symbol: &str,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        let mut order = Self::new(portfolio, symbol, quantity, OrderType::Limit);
        order.limit_price = Some(limit_price);
        order
    }

    pub fn stop_market(
        portfolio: PortfolioId,
        symbol: &str,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Self {
        let mut order = Self::new(portfolio, symbol, quantity, OrderType::StopMarket);
        order.stop_price = Some(stop_price);
        order
    }

    pub fn stop_limit(
        portfolio: PortfolioId,
        symbol: &str,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Self {
        let mut order = Self::new(portfolio, symbol, quantity, OrderType::StopLimit);
        order.stop_price = Some(stop_price);
        order.limit_price = Some(limit_price);
        order
    }

    pub fn market_on_open(portfolio: PortfolioId, symbol: &str, quantity: Decimal) -> Self {
        Self::new(portfolio, symbol, quantity, OrderType::MarketOnOpen)
    }

    pub fn market_on_close(portfolio: PortfolioId, symbol: &str, quantity: Decimal) -> Self {
        Self::new(portfolio, symbol, quantity, OrderType::MarketOnClose)
    }

    pub fn option_exercise(portfolio: PortfolioId, symbol: &str, quantity: Decimal) -> Self {
        Self::new(portfolio, symbol, quantity, OrderType::OptionExercise)
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn is_buy(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    /// `+1` for buys, `-1` for sells.
    pub fn direction(&self) -> Decimal {
        if self.is_buy() {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Order({} x {:.1})",
            self.order_type, self.symbol, self.quantity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_display() {
        let order = Order::market(PortfolioId(0), "SPY", dec!(12));
        assert_eq!(order.to_string(), "MarketOrder(SPY x 12.0)");

        let order = Order::stop_limit(PortfolioId(0), "SPY", dec!(-3), dec!(400), dec!(399));
        assert_eq!(order.to_string(), "StopLimitOrder(SPY x -3.0)");
    }

    #[test]
    fn test_constructors_set_prices() {
        let limit = Order::limit(PortfolioId(1), "SPY", dec!(1), dec!(400));
        assert_eq!(limit.limit_price, Some(dec!(400)));
        assert_eq!(limit.stop_price, None);

        let stop = Order::stop_market(PortfolioId(1), "SPY", dec!(-1), dec!(380));
        assert_eq!(stop.stop_price, Some(dec!(380)));
        assert_eq!(stop.order_type, OrderType::StopMarket);
    }

    #[test]
    fn test_equality_includes_dispatch_state() {
        let a = Order::market(PortfolioId(0), "SPY", dec!(5)).with_tag("t");
        let mut b = a.clone();
        assert_eq!(a, b);

        b.ticket = Some(OrderId(7));
        assert_ne!(a, b);

        let mut c = a.clone();
        c.ticket = Some(OrderId(7));
        assert_eq!(b, c);
    }

    #[test]
    fn test_usable_as_map_key() {
        let mut order = Order::market(PortfolioId(0), "SPY", dec!(5));
        order.ticket = Some(OrderId(1));

        let mut fills = HashMap::new();
        fills.insert(order.clone(), dec!(5));

        assert_eq!(fills.get(&order), Some(&dec!(5)));
    }

    #[test]
    fn test_direction() {
        assert_eq!(Order::market(PortfolioId(0), "SPY", dec!(5)).direction(), Decimal::ONE);
        assert_eq!(
            Order::market(PortfolioId(0), "SPY", dec!(-5)).direction(),
            Decimal::NEGATIVE_ONE
        );
    }
}
