//! Two-phase order execution across all strategy ledgers.
//!
//! Each cycle first satisfies queued market buys from house inventory
//! (shares the real account already holds but no strategy owns), then
//! forwards whatever is left to the host. Forwarded orders are tracked by
//! host order id until a terminal fill event routes them back to the ledger
//! that raised them.

use super::order::Order;
use super::reconciler::mirror_account;
use crate::config::BrokerConfig;
use crate::error::{AccountingError, AccountingResult};
use crate::host::{Host, OrderEvent, OrderId, OrderStatus, OrderTicket, OrderType};
use crate::portfolio::{Portfolio, PortfolioId};
use crate::utils::decimal::{is_below_lot, round_down_to_lot, snap_to_zero, VALUE_EPSILON};
use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, info, warn};

/// What one execution cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    /// Orders (fully or partly) filled from house inventory
    pub internal_fills: usize,
    /// Orders registered as in-flight with the host
    pub forwarded: usize,
    /// Orders the host filled synchronously on submission
    pub filled_on_submit: usize,
    /// Orders the host refused
    pub rejected: usize,
}

impl ExecutionSummary {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Netting engine holding the house ledger and every strategy ledger.
pub struct Broker {
    config: BrokerConfig,
    house: Portfolio,
    portfolios: Vec<Portfolio>,
    /// Host order id -> order awaiting a terminal event
    submitted: HashMap<OrderId, Order>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            house: Portfolio::new(PortfolioId::HOUSE, "house", Decimal::ZERO),
            portfolios: Vec::new(),
            submitted: HashMap::new(),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Create a strategy ledger funded with `cash`.
    pub fn register_portfolio(&mut self, name: &str, cash: Decimal) -> PortfolioId {
        let id = PortfolioId(self.portfolios.len());
        self.portfolios.push(Portfolio::new(id, name, cash));
        info!(portfolio = %name, %id, %cash, "Registered portfolio");
        id
    }

    pub fn portfolio(&self, id: PortfolioId) -> Option<&Portfolio> {
        if id.is_house() {
            return Some(&self.house);
        }
        self.portfolios.get(id.0)
    }

    pub fn portfolio_mut(&mut self, id: PortfolioId) -> Option<&mut Portfolio> {
        if id.is_house() {
            return Some(&mut self.house);
        }
        self.portfolios.get_mut(id.0)
    }

    fn ledger_mut(&mut self, id: PortfolioId) -> AccountingResult<&mut Portfolio> {
        self.portfolio_mut(id)
            .ok_or(AccountingError::UnknownPortfolio(id))
    }

    /// Strategy ledgers, in registration order.
    pub fn portfolios(&self) -> &[Portfolio] {
        &self.portfolios
    }

    pub fn house(&self) -> &Portfolio {
        &self.house
    }

    pub(crate) fn replace_house(&mut self, house: Portfolio) {
        self.house = house;
    }

    /// Orders forwarded to the host and still awaiting a terminal event.
    pub fn in_flight(&self) -> &HashMap<OrderId, Order> {
        &self.submitted
    }

    /// Queue `order` on the ledger it belongs to.
    pub fn add_order(&mut self, order: Order, host: &dyn Host) -> AccountingResult<bool> {
        let lot_size = host.symbol_properties(&order.symbol).lot_size;
        let ledger = self.ledger_mut(order.portfolio)?;
        Ok(ledger.enqueue(order, lot_size))
    }

    /// Run one execution cycle over every ledger's queued orders.
    pub fn execute_orders(&mut self, host: &mut dyn Host) -> AccountingResult<ExecutionSummary> {
        let mut summary = ExecutionSummary::default();

        let queued: Vec<Order> = self
            .portfolios
            .iter_mut()
            .flat_map(|p| p.take_pending())
            .collect();
        if queued.is_empty() {
            return Ok(summary);
        }

        let orders = self.minimize_orders(queued);
        let residual = self.net_against_house(orders, &*host, &mut summary)?;
        self.forward_to_host(residual, host, &mut summary)?;

        info!(
            internal = summary.internal_fills,
            forwarded = summary.forwarded,
            filled_on_submit = summary.filled_on_submit,
            rejected = summary.rejected,
            in_flight = self.submitted.len(),
            "Execution cycle complete"
        );

        Ok(summary)
    }

    /// Hook for cancelling or merging redundant orders before execution.
    fn minimize_orders(&self, orders: Vec<Order>) -> Vec<Order> {
        orders
    }

    /// Fill market buys from house inventory; returns what is left over.
    fn net_against_house(
        &mut self,
        orders: Vec<Order>,
        host: &dyn Host,
        summary: &mut ExecutionSummary,
    ) -> AccountingResult<Vec<Order>> {
        let mut remaining = Vec::with_capacity(orders.len());

        for mut order in orders {
            let available = self.house.quantity(&order.symbol);
            let nettable = order.order_type.is_immediate()
                && order.is_buy()
                && available > Decimal::ZERO;
            if !nettable {
                remaining.push(order);
                continue;
            }

            let price = match host.price(&order.symbol).filter(|p| *p > Decimal::ZERO) {
                Some(price) => price,
                None => {
                    debug!(%order, "No price for internal fill, forwarding");
                    remaining.push(order);
                    continue;
                }
            };

            let quantity = order.quantity.min(available);
            self.house.fill(&order.symbol, -quantity, price, Decimal::ZERO)?;
            self.ledger_mut(order.portfolio)?
                .fill(&order.symbol, quantity, price, Decimal::ZERO)?;
            order.quantity = snap_to_zero(order.quantity - quantity);
            summary.internal_fills += 1;

            info!(
                portfolio = %order.portfolio,
                symbol = %order.symbol,
                %quantity,
                %price,
                residual = %order.quantity,
                "Filled from house inventory"
            );

            if order.quantity == Decimal::ZERO {
                continue;
            }

            // House inventory may hold fractional lots; only whole lots go out
            let lot_size = host.symbol_properties(&order.symbol).lot_size;
            let tradable = round_down_to_lot(order.quantity, lot_size);
            if is_below_lot(tradable, lot_size) {
                warn!(%order, %lot_size, "Residual below lot size after netting, dropping");
                continue;
            }
            order.quantity = tradable;
            remaining.push(order);
        }

        if self.config.zero_house_cash_after_netting {
            self.house.set_cash(Decimal::ZERO);
        }

        Ok(remaining)
    }

    /// Submit residual orders to the host.
    fn forward_to_host(
        &mut self,
        orders: Vec<Order>,
        host: &mut dyn Host,
        summary: &mut ExecutionSummary,
    ) -> AccountingResult<()> {
        for mut order in orders {
            let price = host.price(&order.symbol).unwrap_or(Decimal::ZERO);
            info!(
                portfolio = %order.portfolio,
                tag = %order.tag,
                estimated_value = %(order.quantity * price),
                "Submitting a {} (est: ${:.2}/share)",
                order,
                price
            );

            let ticket = match submit(host, &order) {
                Ok(ticket) => ticket,
                Err(e) => {
                    error!(%order, error = %e, "Host rejected order submission");
                    summary.rejected += 1;
                    continue;
                }
            };

            order.ticket = Some(ticket.order_id);

            if ticket.status.is_terminal() {
                self.settle(&order, ticket.status, ticket.fill_quantity, ticket.fill_price, ticket.fee)?;
                summary.filled_on_submit += 1;
            } else {
                debug!(order_id = %ticket.order_id, %order, "Order in flight");
                self.submitted.insert(ticket.order_id, order);
                summary.forwarded += 1;
            }
        }

        Ok(())
    }

    /// Route a fill/status event back to the ledger that raised the order.
    ///
    /// Returns `false` when the event belongs to no in-flight order (already
    /// settled, netted internally, or not ours).
    pub fn handle_order_event(&mut self, event: &OrderEvent) -> AccountingResult<bool> {
        if !self.submitted.contains_key(&event.order_id) {
            debug!(order_id = %event.order_id, status = ?event.status, "No in-flight order for event");
            return Ok(false);
        }

        if !event.status.is_terminal() {
            if event.status == OrderStatus::Unknown {
                error!(order_id = %event.order_id, "Unexpected order status, keeping order in flight");
            } else {
                debug!(order_id = %event.order_id, status = ?event.status, "Order still working");
            }
            return Ok(true);
        }

        let Some(order) = self.submitted.remove(&event.order_id) else {
            return Ok(false);
        };
        self.settle(
            &order,
            event.status,
            event.fill_quantity,
            event.fill_price,
            event.fee,
        )?;
        Ok(true)
    }

    /// Book a terminal outcome on the originating ledger.
    fn settle(
        &mut self,
        order: &Order,
        status: OrderStatus,
        fill_quantity: Decimal,
        fill_price: Decimal,
        fee: Decimal,
    ) -> AccountingResult<()> {
        match status {
            OrderStatus::Filled | OrderStatus::PartiallyFilled => {}
            OrderStatus::Canceled => info!(%order, "Order canceled"),
            _ => error!(%order, status = ?status, "Order ended without a fill"),
        }

        if fill_quantity == Decimal::ZERO && fee == Decimal::ZERO {
            return Ok(());
        }

        self.ledger_mut(order.portfolio)?
            .fill(&order.symbol, fill_quantity, fill_price, fee)?;

        info!(
            portfolio = %order.portfolio,
            symbol = %order.symbol,
            quantity = %fill_quantity,
            price = %fill_price,
            %fee,
            status = ?status,
            "Order settled"
        );
        Ok(())
    }

    /// Combined total value of every strategy ledger.
    pub fn allocated_value(&self, host: &dyn Host) -> Decimal {
        self.portfolios.iter().map(|p| p.total_value(host)).sum()
    }

    /// Fail if strategy ledgers claim more than the real account holds.
    pub fn self_check(&self, host: &dyn Host) -> AccountingResult<()> {
        let real = mirror_account(&host.account(), host, &self.config.quote_currency)
            .total_value(host);
        let allocated = self.allocated_value(host);

        debug!(%real, %allocated, "Capital self-check");
        if allocated > real + VALUE_EPSILON {
            error!(%real, %allocated, "Insufficient funds in real portfolio");
            return Err(AccountingError::InsufficientCapital { real, allocated });
        }
        Ok(())
    }
}

impl fmt::Display for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queued: usize = self.portfolios.iter().map(|p| p.pending_orders().len()).sum();
        write!(
            f,
            "To Submit: {} orders; Submitted: {} orders; House: {}",
            queued,
            self.submitted.len(),
            self.house
        )
    }
}

/// Dispatch `order` through the host call matching its type.
fn submit(host: &mut dyn Host, order: &Order) -> Result<OrderTicket> {
    let symbol = order.symbol.as_str();
    let quantity = order.quantity;
    let tag = order.tag.as_str();

    match order.order_type {
        OrderType::Market => host.market_order(symbol, quantity, quantity < Decimal::ZERO, tag),
        OrderType::Limit => {
            let limit = order.limit_price.ok_or_else(|| anyhow!("limit order without limit price"))?;
            host.limit_order(symbol, quantity, limit, tag)
        }
        OrderType::StopMarket => {
            let stop = order.stop_price.ok_or_else(|| anyhow!("stop order without stop price"))?;
            host.stop_market_order(symbol, quantity, stop, tag)
        }
        OrderType::StopLimit => {
            let stop = order.stop_price.ok_or_else(|| anyhow!("stop-limit order without stop price"))?;
            let limit = order
                .limit_price
                .ok_or_else(|| anyhow!("stop-limit order without limit price"))?;
            host.stop_limit_order(symbol, quantity, stop, limit, tag)
        }
        OrderType::MarketOnOpen => host.market_on_open_order(symbol, quantity, tag),
        OrderType::MarketOnClose => host.market_on_close_order(symbol, quantity, tag),
        OrderType::OptionExercise => host.option_exercise_order(symbol, quantity, tag),
    }
}
