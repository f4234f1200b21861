//! In-process paper host for simulation and tests.
//!
//! Plays the role of the trading platform: quotes, symbol properties, a
//! real account, and an order book that hands out tickets and later turns
//! them into fill events.

use super::traits::Host;
use super::types::*;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// One recorded submission call.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub order_id: OrderId,
    pub symbol: String,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub asynchronous: bool,
    pub tag: String,
}

/// Paper trading host.
pub struct PaperHost {
    quote_currency: String,
    prices: HashMap<String, Decimal>,
    properties: HashMap<String, SymbolProperties>,
    fee_schedules: HashMap<String, FeeSchedule>,
    default_fee_schedule: FeeSchedule,
    /// Status given to new tickets (Filled = synchronous venue)
    default_status: OrderStatus,
    rejected_symbols: HashSet<String>,
    next_order_id: u64,
    tickets: BTreeMap<OrderId, OrderTicket>,
    submissions: Vec<Submission>,
    cash: BTreeMap<String, Decimal>,
    holdings: BTreeMap<String, Holding>,
    now: DateTime<Utc>,
}

impl PaperHost {
    /// Create a paper host whose real account holds `cash` in USD.
    pub fn new(cash: Decimal) -> Self {
        Self::with_quote_currency(cash, "USD")
    }

    pub fn with_quote_currency(cash: Decimal, quote_currency: &str) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(quote_currency.to_string(), cash);

        Self {
            quote_currency: quote_currency.to_string(),
            prices: HashMap::new(),
            properties: HashMap::new(),
            fee_schedules: HashMap::new(),
            default_fee_schedule: FeeSchedule::free(),
            default_status: OrderStatus::Submitted,
            rejected_symbols: HashSet::new(),
            next_order_id: 1,
            tickets: BTreeMap::new(),
            submissions: Vec::new(),
            cash: balances,
            holdings: BTreeMap::new(),
            now: Utc::now(),
        }
    }

    pub fn set_price(&mut self, symbol: &str, price: Decimal) {
        self.prices.insert(symbol.to_string(), price);
    }

    pub fn set_lot_size(&mut self, symbol: &str, lot_size: Decimal) {
        let quote_currency = self.quote_currency.clone();
        self.set_symbol_properties(
            symbol,
            SymbolProperties {
                lot_size,
                quote_currency,
            },
        );
    }

    pub fn set_symbol_properties(&mut self, symbol: &str, properties: SymbolProperties) {
        self.properties.insert(symbol.to_string(), properties);
    }

    pub fn set_fee_schedule(&mut self, symbol: &str, schedule: FeeSchedule) {
        self.fee_schedules.insert(symbol.to_string(), schedule);
    }

    pub fn set_default_fee_schedule(&mut self, schedule: FeeSchedule) {
        self.default_fee_schedule = schedule;
    }

    /// Status assigned to new tickets. `Filled` makes every submission fill
    /// synchronously.
    pub fn set_default_order_status(&mut self, status: OrderStatus) {
        self.default_status = status;
    }

    /// Make every submission for `symbol` fail.
    pub fn reject_symbol(&mut self, symbol: &str) {
        self.rejected_symbols.insert(symbol.to_string());
    }

    pub fn set_cash(&mut self, currency: &str, amount: Decimal) {
        self.cash.insert(currency.to_string(), amount);
    }

    pub fn set_holding(&mut self, symbol: &str, quantity: Decimal, average_price: Decimal) {
        if quantity == Decimal::ZERO {
            self.holdings.remove(symbol);
            return;
        }
        self.holdings.insert(
            symbol.to_string(),
            Holding {
                symbol: symbol.to_string(),
                quantity,
                average_price,
            },
        );
    }

    pub fn set_time(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Every submission made so far, oldest first.
    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn open_order_ids(&self) -> Vec<OrderId> {
        self.tickets
            .values()
            .filter(|t| t.status.is_open())
            .map(|t| t.order_id)
            .collect()
    }

    /// Fill every working order at the current price.
    pub fn fill_open_orders(&mut self) -> Vec<OrderEvent> {
        self.open_order_ids()
            .into_iter()
            .filter_map(|id| self.set_order_status(id, OrderStatus::Filled, None))
            .collect()
    }

    /// Move a ticket to `status` and produce the matching event.
    ///
    /// Fill statuses fill `quantity` (default: the whole order) at the
    /// current price and charge the symbol's fee schedule.
    pub fn set_order_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
        quantity: Option<Decimal>,
    ) -> Option<OrderEvent> {
        let (symbol, order_quantity) = {
            let ticket = self.tickets.get(&order_id)?;
            (ticket.symbol.clone(), ticket.quantity)
        };

        let (fill_quantity, fill_price, fee) = if status.is_fill() {
            let fill_quantity = quantity.unwrap_or(order_quantity);
            let fill_price = self.price(&symbol).unwrap_or(Decimal::ZERO);
            let fee = self
                .fee_schedule(&symbol)
                .order_fee(fill_quantity * fill_price);
            self.settle(&symbol, fill_quantity, fill_price, fee);
            (fill_quantity, fill_price, fee)
        } else {
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
        };

        if let Some(ticket) = self.tickets.get_mut(&order_id) {
            ticket.status = status;
            ticket.fill_quantity += fill_quantity;
            ticket.fill_price = fill_price;
            ticket.fee += fee;
        }

        debug!(%order_id, %symbol, status = ?status, %fill_quantity, %fill_price, "Paper order status");

        Some(OrderEvent {
            order_id,
            symbol,
            status,
            fill_quantity,
            fill_price,
            fee,
            time: self.now,
        })
    }

    /// Apply a fill to the real account.
    fn settle(&mut self, symbol: &str, quantity: Decimal, price: Decimal, fee: Decimal) {
        *self
            .cash
            .entry(self.quote_currency.clone())
            .or_insert(Decimal::ZERO) -= quantity * price + fee;

        let holding = self
            .holdings
            .entry(symbol.to_string())
            .or_insert_with(|| Holding {
                symbol: symbol.to_string(),
                quantity: Decimal::ZERO,
                average_price: Decimal::ZERO,
            });

        let total = holding.quantity + quantity;
        if quantity > Decimal::ZERO {
            holding.average_price = if total > Decimal::ZERO {
                (holding.quantity.max(Decimal::ZERO) * holding.average_price + quantity * price)
                    / (holding.quantity.max(Decimal::ZERO) + quantity)
            } else {
                Decimal::ZERO
            };
        }
        holding.quantity = total;

        if holding.quantity == Decimal::ZERO {
            self.holdings.remove(symbol);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn submit(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        order_type: OrderType,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
        asynchronous: bool,
        tag: &str,
    ) -> Result<OrderTicket> {
        if self.rejected_symbols.contains(symbol) {
            bail!("paper host rejects orders for {symbol}");
        }

        let order_id = OrderId(self.next_order_id);
        self.next_order_id += 1;

        self.submissions.push(Submission {
            order_id,
            symbol: symbol.to_string(),
            quantity,
            order_type,
            limit_price,
            stop_price,
            asynchronous,
            tag: tag.to_string(),
        });
        self.tickets.insert(
            order_id,
            OrderTicket::pending(order_id, symbol, quantity, order_type, OrderStatus::New),
        );

        let ticket = if self.default_status.is_fill() {
            self.set_order_status(order_id, self.default_status, None);
            self.tickets.get(&order_id).cloned()
        } else {
            if let Some(ticket) = self.tickets.get_mut(&order_id) {
                ticket.status = self.default_status;
            }
            self.tickets.get(&order_id).cloned()
        };

        info!(%order_id, %symbol, %quantity, %order_type, "Paper order accepted");

        ticket.ok_or_else(|| anyhow::anyhow!("ticket {order_id} vanished"))
    }
}

impl Host for PaperHost {
    fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }

    fn symbol_properties(&self, symbol: &str) -> SymbolProperties {
        self.properties
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| SymbolProperties {
                lot_size: Decimal::ONE,
                quote_currency: self.quote_currency.clone(),
            })
    }

    fn fee_schedule(&self, symbol: &str) -> FeeSchedule {
        self.fee_schedules
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| self.default_fee_schedule.clone())
    }

    fn account(&self) -> AccountSnapshot {
        AccountSnapshot {
            cash: self.cash.clone(),
            holdings: self.holdings.values().cloned().collect(),
        }
    }

    fn market_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        asynchronous: bool,
        tag: &str,
    ) -> Result<OrderTicket> {
        self.submit(symbol, quantity, OrderType::Market, None, None, asynchronous, tag)
    }

    fn limit_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        limit_price: Decimal,
        tag: &str,
    ) -> Result<OrderTicket> {
        self.submit(symbol, quantity, OrderType::Limit, Some(limit_price), None, false, tag)
    }

    fn stop_market_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        stop_price: Decimal,
        tag: &str,
    ) -> Result<OrderTicket> {
        self.submit(symbol, quantity, OrderType::StopMarket, None, Some(stop_price), false, tag)
    }

    fn stop_limit_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
        tag: &str,
    ) -> Result<OrderTicket> {
        self.submit(
            symbol,
            quantity,
            OrderType::StopLimit,
            Some(limit_price),
            Some(stop_price),
            false,
            tag,
        )
    }

    fn market_on_open_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        tag: &str,
    ) -> Result<OrderTicket> {
        self.submit(symbol, quantity, OrderType::MarketOnOpen, None, None, false, tag)
    }

    fn market_on_close_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        tag: &str,
    ) -> Result<OrderTicket> {
        self.submit(symbol, quantity, OrderType::MarketOnClose, None, None, false, tag)
    }

    fn option_exercise_order(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        tag: &str,
    ) -> Result<OrderTicket> {
        self.submit(symbol, quantity, OrderType::OptionExercise, None, None, false, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn host_with_price(symbol: &str, price: Decimal) -> PaperHost {
        let mut host = PaperHost::new(dec!(10000));
        host.set_price(symbol, price);
        host
    }

    #[test]
    fn test_submission_returns_pending_ticket() {
        let mut host = host_with_price("AAPL", dec!(100));

        let ticket = host.market_order("AAPL", dec!(5), false, "entry").unwrap();

        assert_eq!(ticket.order_id, OrderId(1));
        assert_eq!(ticket.status, OrderStatus::Submitted);
        assert_eq!(ticket.fill_quantity, Decimal::ZERO);
        assert_eq!(host.submissions().len(), 1);
        assert_eq!(host.submissions()[0].tag, "entry");
        assert_eq!(host.open_order_ids(), vec![OrderId(1)]);
    }

    #[test]
    fn test_order_ids_increase() {
        let mut host = host_with_price("AAPL", dec!(100));

        let first = host.market_order("AAPL", dec!(1), false, "").unwrap();
        let second = host.limit_order("AAPL", dec!(1), dec!(99), "").unwrap();

        assert!(second.order_id > first.order_id);
        assert_eq!(host.submissions()[1].limit_price, Some(dec!(99)));
    }

    #[test]
    fn test_synchronous_fill_settles_account() {
        let mut host = host_with_price("AAPL", dec!(100));
        host.set_default_order_status(OrderStatus::Filled);
        host.set_default_fee_schedule(FeeSchedule::new(dec!(0.01)));

        let ticket = host.market_order("AAPL", dec!(5), false, "").unwrap();

        assert_eq!(ticket.status, OrderStatus::Filled);
        assert_eq!(ticket.fill_quantity, dec!(5));
        assert_eq!(ticket.fill_price, dec!(100));
        assert_eq!(ticket.fee, dec!(5));

        let account = host.account();
        assert_eq!(account.cash_in("USD"), dec!(10000) - dec!(500) - dec!(5));
        assert_eq!(account.holdings[0].quantity, dec!(5));
        assert!(host.open_order_ids().is_empty());
    }

    #[test]
    fn test_fill_open_orders_emits_events() {
        let mut host = host_with_price("AAPL", dec!(100));
        host.market_order("AAPL", dec!(2), false, "").unwrap();
        host.market_order("AAPL", dec!(-1), true, "").unwrap();

        let events = host.fill_open_orders();

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.status == OrderStatus::Filled));
        assert_eq!(events[1].fill_quantity, dec!(-1));
        assert_eq!(host.account().holdings[0].quantity, dec!(1));
    }

    #[test]
    fn test_buy_back_of_short_holding_closes_it() {
        let mut host = host_with_price("Z", dec!(12));
        host.set_default_order_status(OrderStatus::Filled);
        host.set_holding("Z", dec!(-3), dec!(10));

        host.market_order("Z", dec!(3), false, "").unwrap();

        assert!(host.account().holdings.is_empty());
        assert_eq!(host.account().cash_in("USD"), dec!(10000) - dec!(36));
    }

    #[test]
    fn test_oversell_then_buy_back() {
        let mut host = host_with_price("AAPL", dec!(100));
        host.set_default_order_status(OrderStatus::Filled);

        host.market_order("AAPL", dec!(-1), true, "").unwrap();
        host.market_order("AAPL", dec!(2), false, "").unwrap();

        let account = host.account();
        let holding = &account.holdings[0];
        assert_eq!(holding.quantity, dec!(1));
        assert_eq!(holding.average_price, dec!(100));
    }

    #[test]
    fn test_cancel_produces_empty_fill() {
        let mut host = host_with_price("AAPL", dec!(100));
        let ticket = host.market_order("AAPL", dec!(2), false, "").unwrap();

        let event = host
            .set_order_status(ticket.order_id, OrderStatus::Canceled, None)
            .unwrap();

        assert_eq!(event.fill_quantity, Decimal::ZERO);
        assert_eq!(host.account().cash_in("USD"), dec!(10000));
    }

    #[test]
    fn test_rejected_symbol_errors() {
        let mut host = host_with_price("AAPL", dec!(100));
        host.reject_symbol("AAPL");

        assert!(host.market_order("AAPL", dec!(1), false, "").is_err());
        assert!(host.submissions().is_empty());
    }

    #[test]
    fn test_unknown_symbol_defaults() {
        let host = PaperHost::new(dec!(1));

        assert_eq!(host.price("NOPE"), None);
        assert_eq!(host.symbol_properties("NOPE").lot_size, Decimal::ONE);
        assert_eq!(host.fee_schedule("NOPE"), FeeSchedule::free());
    }
}
