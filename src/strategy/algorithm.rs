//! The handle a strategy trades through.

use crate::broker::Order;
use crate::context::RunContext;
use crate::host::Host;
use crate::portfolio::Portfolio;
use rust_decimal::Decimal;

/// Strategy logic driven by the manager.
///
/// Every hook receives an [`Algorithm`] bound to the strategy's own ledger.
/// Orders placed through it are queued and executed once all strategies
/// have run.
pub trait Strategy {
    fn name(&self) -> &str;

    fn initialize(&mut self, _algo: &mut Algorithm<'_>) {}

    fn on_data(&mut self, _algo: &mut Algorithm<'_>) {}

    fn on_end_of_day(&mut self, _algo: &mut Algorithm<'_>) {}

    fn on_end_of_algorithm(&mut self, _algo: &mut Algorithm<'_>) {}
}

/// Operations available to a strategy during one hook call.
pub struct Algorithm<'a> {
    portfolio: &'a mut Portfolio,
    host: &'a dyn Host,
    context: &'a mut RunContext,
}

impl<'a> Algorithm<'a> {
    pub fn new(portfolio: &'a mut Portfolio, host: &'a dyn Host, context: &'a mut RunContext) -> Self {
        Self {
            portfolio,
            host,
            context,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.portfolio
    }

    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.host.price(symbol)
    }

    pub fn is_warming_up(&self) -> bool {
        self.context.is_warming_up()
    }

    /// Ask for `days` of warm-up before trading starts.
    pub fn set_warm_up(&mut self, days: u32) {
        self.context.set_warm_up_from_strategy(days);
    }

    fn place(&mut self, order: Order) -> bool {
        let lot_size = self.host.symbol_properties(&order.symbol).lot_size;
        self.portfolio.enqueue(order, lot_size)
    }

    /// Move `symbol` to `target` of this ledger's total value.
    pub fn set_holdings(&mut self, symbol: &str, target: Decimal, tag: &str) -> bool {
        match self
            .portfolio
            .order_for_target(symbol, target, self.host, tag)
        {
            Some(order) => self.place(order),
            None => false,
        }
    }

    pub fn market_order(&mut self, symbol: &str, quantity: Decimal, tag: &str) -> bool {
        let order = Order::market(self.portfolio.id(), symbol, quantity).with_tag(tag);
        self.place(order)
    }

    pub fn limit_order(&mut self, symbol: &str, quantity: Decimal, limit_price: Decimal, tag: &str) -> bool {
        let order = Order::limit(self.portfolio.id(), symbol, quantity, limit_price).with_tag(tag);
        self.place(order)
    }

    pub fn stop_market_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        stop_price: Decimal,
        tag: &str,
    ) -> bool {
        let order =
            Order::stop_market(self.portfolio.id(), symbol, quantity, stop_price).with_tag(tag);
        self.place(order)
    }

    pub fn stop_limit_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
        tag: &str,
    ) -> bool {
        let order = Order::stop_limit(self.portfolio.id(), symbol, quantity, stop_price, limit_price)
            .with_tag(tag);
        self.place(order)
    }

    pub fn market_on_open_order(&mut self, symbol: &str, quantity: Decimal, tag: &str) -> bool {
        let order = Order::market_on_open(self.portfolio.id(), symbol, quantity).with_tag(tag);
        self.place(order)
    }

    pub fn market_on_close_order(&mut self, symbol: &str, quantity: Decimal, tag: &str) -> bool {
        let order = Order::market_on_close(self.portfolio.id(), symbol, quantity).with_tag(tag);
        self.place(order)
    }

    pub fn option_exercise_order(&mut self, symbol: &str, quantity: Decimal, tag: &str) -> bool {
        let order = Order::option_exercise(self.portfolio.id(), symbol, quantity).with_tag(tag);
        self.place(order)
    }

    /// Close `symbol`, or every holding when `None`.
    pub fn liquidate(&mut self, symbol: Option<&str>, tag: &str) -> usize {
        self.portfolio.liquidate(symbol, tag, self.host)
    }
}
