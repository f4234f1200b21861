//! A strategy's private cash and holdings.

use super::position::Position;
use super::sizing::{self, SizingInput};
use super::PortfolioId;
use crate::broker::Order;
use crate::error::AccountingResult;
use crate::host::Host;
use crate::utils::decimal::{is_below_lot, percentage_change};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Virtual ledger owned by one strategy (or by the house).
#[derive(Debug, Clone)]
pub struct Portfolio {
    id: PortfolioId,
    name: String,
    positions: BTreeMap<String, Position>,
    cash: Decimal,
    /// Cost basis for performance; zero until the ledger is funded
    initial_value: Decimal,
    total_fees: Decimal,
    /// Orders waiting for the next execution cycle
    pending: Vec<Order>,
}

impl Portfolio {
    pub fn new(id: PortfolioId, name: &str, cash: Decimal) -> Self {
        Self {
            id,
            name: name.to_string(),
            positions: BTreeMap::new(),
            cash,
            initial_value: cash,
            total_fees: Decimal::ZERO,
            pending: Vec::new(),
        }
    }

    pub fn id(&self) -> PortfolioId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn set_cash(&mut self, cash: Decimal) {
        self.cash = cash;
    }

    pub fn initial_value(&self) -> Decimal {
        self.initial_value
    }

    pub fn set_initial_value(&mut self, value: Decimal) {
        self.initial_value = value;
    }

    pub fn total_fees(&self) -> Decimal {
        self.total_fees
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Held quantity of `symbol` (zero when not held).
    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn is_invested(&self) -> bool {
        !self.positions.is_empty()
    }

    /// Replace whatever is held in `position.symbol`.
    pub fn insert_position(&mut self, position: Position) {
        if position.is_closed() {
            self.positions.remove(&position.symbol);
        } else {
            self.positions.insert(position.symbol.clone(), position);
        }
    }

    /// Mark price used for valuation; falls back to cost basis when the host
    /// has no usable quote.
    fn mark_price(position: &Position, host: &dyn Host) -> Decimal {
        host.price(&position.symbol)
            .filter(|p| *p > Decimal::ZERO)
            .unwrap_or(position.average_price)
    }

    pub fn total_holdings_value(&self, host: &dyn Host) -> Decimal {
        self.positions
            .values()
            .map(|p| p.market_value(Self::mark_price(p, host)))
            .sum()
    }

    pub fn total_holdings_cost(&self) -> Decimal {
        self.positions.values().map(Position::total_cost).sum()
    }

    pub fn unrealized_profit(&self, host: &dyn Host) -> Decimal {
        self.total_holdings_value(host) - self.total_holdings_cost()
    }

    /// Holdings at market plus cash.
    pub fn total_value(&self, host: &dyn Host) -> Decimal {
        self.total_holdings_value(host) + self.cash
    }

    pub fn profit(&self, host: &dyn Host) -> Decimal {
        if self.initial_value == Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.total_value(host) - self.initial_value
    }

    /// Return on the initial cost basis in percent; 0 for an unfunded ledger.
    pub fn performance(&self, host: &dyn Host) -> Decimal {
        percentage_change(self.total_value(host), self.initial_value)
    }

    /// Book a fill against this ledger.
    ///
    /// Cash moves by `quantity × price + fees`. Positions that return to
    /// zero are removed.
    pub fn fill(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        fees: Decimal,
    ) -> AccountingResult<()> {
        let position = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::flat(symbol));

        if let Err(e) = position.fill(quantity, price) {
            if position.is_closed() {
                self.positions.remove(symbol);
            }
            warn!(portfolio = %self.name, %symbol, %quantity, "Order removed too many positions");
            return Err(e);
        }
        position.fees += fees;

        let remaining = position.quantity;
        if position.is_closed() {
            self.positions.remove(symbol);
        }

        self.cash -= quantity * price + fees;
        self.total_fees += fees;

        debug!(
            portfolio = %self.name,
            %symbol,
            %quantity,
            %price,
            %fees,
            %remaining,
            cash = %self.cash,
            "Fill booked"
        );

        Ok(())
    }

    /// Move `quantity` units out of this ledger at cost, without touching
    /// cash. Used when inventory is re-attributed to another ledger.
    pub(crate) fn release(&mut self, symbol: &str, quantity: Decimal) -> AccountingResult<()> {
        let position = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::flat(symbol));

        let average_price = position.average_price;
        let result = position.fill(-quantity, average_price);
        if position.is_closed() {
            self.positions.remove(symbol);
        }
        result
    }

    /// Queue an order for the next execution cycle.
    ///
    /// Orders smaller than one lot are dropped with a warning; returns
    /// whether the order was queued.
    pub fn enqueue(&mut self, order: Order, lot_size: Decimal) -> bool {
        if is_below_lot(order.quantity, lot_size) {
            warn!(
                portfolio = %self.name,
                %order,
                %lot_size,
                "Avoiding submitting order that has zero quantity"
            );
            return false;
        }

        debug!(portfolio = %self.name, %order, "Order queued");
        self.pending.push(order);
        true
    }

    pub fn pending_orders(&self) -> &[Order] {
        &self.pending
    }

    /// Hand every queued order to the caller.
    pub fn take_pending(&mut self) -> Vec<Order> {
        std::mem::take(&mut self.pending)
    }

    /// Queue market orders that close `symbol`, or every holding when
    /// `symbol` is `None`. Returns the number of orders queued.
    pub fn liquidate(&mut self, symbol: Option<&str>, tag: &str, host: &dyn Host) -> usize {
        let targets: Vec<(String, Decimal)> = match symbol {
            Some(symbol) => self
                .positions
                .get(symbol)
                .map(|p| vec![(p.symbol.clone(), p.quantity)])
                .unwrap_or_default(),
            None => self
                .positions
                .values()
                .filter(|p| p.quantity > Decimal::ZERO)
                .map(|p| (p.symbol.clone(), p.quantity))
                .collect(),
        };

        let mut queued = 0;
        for (symbol, quantity) in targets {
            let lot_size = host.symbol_properties(&symbol).lot_size;
            let order = Order::market(self.id, &symbol, -quantity).with_tag(tag);
            if self.enqueue(order, lot_size) {
                queued += 1;
            }
        }
        queued
    }

    /// Signed quantity that moves `symbol` to `target` of this ledger's
    /// total value, net of fees.
    pub fn target_quantity(&self, symbol: &str, target: Decimal, host: &dyn Host) -> Decimal {
        let price = host.price(symbol).filter(|p| *p > Decimal::ZERO);
        if price.is_none() {
            warn!(portfolio = %self.name, %symbol, "Could not get price - NO ORDER");
        }

        sizing::solve_quantity(&SizingInput {
            held: self.quantity(symbol),
            price,
            total_value: self.total_value(host),
            target,
            lot_size: host.symbol_properties(symbol).lot_size,
            fees: host.fee_schedule(symbol),
        })
    }

    /// Market order that moves `symbol` to `target`, if any trade is needed.
    pub fn order_for_target(
        &self,
        symbol: &str,
        target: Decimal,
        host: &dyn Host,
        tag: &str,
    ) -> Option<Order> {
        let quantity = self.target_quantity(symbol, target, host);
        if quantity == Decimal::ZERO {
            return None;
        }
        Some(Order::market(self.id, symbol, quantity).with_tag(tag))
    }
}

impl fmt::Display for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positions: Vec<String> = self.positions.values().map(|p| p.to_string()).collect();
        write!(f, "Portfolio({})", positions.join(", "))
    }
}
