//! Capital (re)distribution from the real account to strategy ledgers.
//!
//! Runs once when warm-up completes and again after a brokerage reconnect.
//! The house ledger is rebuilt from the real account, every strategy's
//! existing inventory is carved out of it, and each strategy is topped up
//! with cash so its total value approaches its configured fraction of the
//! real account.

use super::netting::Broker;
use crate::error::{AccountingError, AccountingResult};
use crate::host::{AccountSnapshot, Host};
use crate::portfolio::{Portfolio, PortfolioId, Position};
use crate::utils::decimal::VALUE_EPSILON;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Capital assigned to one strategy during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationRow {
    pub portfolio: PortfolioId,
    pub name: String,
    pub fraction: Decimal,
    pub holdings_value: Decimal,
    pub cash: Decimal,
    pub total_value: Decimal,
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Total value of the real account
    pub real_total: Decimal,
    pub allocations: Vec<AllocationRow>,
    /// Value left in the house after every strategy is funded
    pub unallocated: Decimal,
}

impl ReconcileReport {
    pub fn allocated_total(&self) -> Decimal {
        self.allocations.iter().map(|a| a.total_value).sum()
    }
}

/// Rebuild a house ledger from the real account.
///
/// Quote-currency cash becomes ledger cash. Every other cash balance is held
/// as a position in `<CURRENCY><QUOTE>` priced at the host's quote for that
/// pair. Short holdings and holdings quoted in another currency are not
/// modeled and are skipped.
pub(crate) fn mirror_account(
    snapshot: &AccountSnapshot,
    host: &dyn Host,
    quote_currency: &str,
) -> Portfolio {
    let mut house = Portfolio::new(PortfolioId::HOUSE, "house", snapshot.cash_in(quote_currency));

    for (currency, amount) in &snapshot.cash {
        if currency == quote_currency || *amount == Decimal::ZERO {
            continue;
        }
        if *amount < Decimal::ZERO {
            warn!(%currency, %amount, "Skipping negative currency balance");
            continue;
        }

        let symbol = format!("{currency}{quote_currency}");
        match host.price(&symbol).filter(|p| *p > Decimal::ZERO) {
            Some(price) => house.insert_position(Position::new(&symbol, *amount, price)),
            None => warn!(%symbol, %amount, "No conversion price for currency balance, skipping"),
        }
    }

    for holding in &snapshot.holdings {
        if holding.quantity < Decimal::ZERO {
            warn!(symbol = %holding.symbol, quantity = %holding.quantity, "Skipping short holding");
            continue;
        }
        let quoted_in = host.symbol_properties(&holding.symbol).quote_currency;
        if quoted_in != quote_currency {
            warn!(
                symbol = %holding.symbol,
                %quoted_in,
                "Skipping holding quoted in another currency"
            );
            continue;
        }
        house.insert_position(Position::new(
            &holding.symbol,
            holding.quantity,
            holding.average_price,
        ));
    }

    house
}

/// Distributes real-account capital across strategy ledgers.
#[derive(Debug, Clone)]
pub struct AllocationReconciler {
    quote_currency: String,
    /// Target share of the real account per ledger
    allocations: BTreeMap<PortfolioId, Decimal>,
}

impl AllocationReconciler {
    pub fn new(quote_currency: &str) -> Self {
        Self {
            quote_currency: quote_currency.to_string(),
            allocations: BTreeMap::new(),
        }
    }

    pub fn with_allocation(mut self, portfolio: PortfolioId, fraction: Decimal) -> Self {
        self.set_allocation(portfolio, fraction);
        self
    }

    pub fn set_allocation(&mut self, portfolio: PortfolioId, fraction: Decimal) {
        self.allocations.insert(portfolio, fraction);
    }

    pub fn allocation(&self, portfolio: PortfolioId) -> Decimal {
        self.allocations
            .get(&portfolio)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Resynchronize the house with the real account and re-fund every
    /// strategy ledger.
    ///
    /// Fails with [`AccountingError::InsufficientCapital`] when the
    /// strategies end up claiming more than the real account is worth.
    pub fn reconcile(&self, broker: &mut Broker, host: &dyn Host) -> AccountingResult<ReconcileReport> {
        let mut house = mirror_account(&host.account(), host, &self.quote_currency);
        let real_total = house.total_value(host);
        info!(%real_total, positions = house.positions().count(), "Reconciling with real account");

        let mut allocations = Vec::with_capacity(broker.portfolios().len());
        let ids: Vec<PortfolioId> = broker.portfolios().iter().map(Portfolio::id).collect();

        for id in ids {
            let fraction = self.allocation(id);
            let portfolio = broker
                .portfolio_mut(id)
                .ok_or(AccountingError::UnknownPortfolio(id))?;

            for position in portfolio.positions() {
                house.release(&position.symbol, position.quantity)?;
            }

            let holdings_value = portfolio.total_holdings_value(host);
            let cash = (fraction * real_total - holdings_value).max(Decimal::ZERO);
            portfolio.set_cash(cash);
            house.set_cash(house.cash() - cash);

            let total_value = portfolio.total_value(host);
            if portfolio.initial_value() == Decimal::ZERO {
                portfolio.set_initial_value(total_value);
            }

            info!(
                portfolio = %portfolio.name(),
                %fraction,
                %holdings_value,
                %cash,
                %total_value,
                "Allocated capital"
            );

            allocations.push(AllocationRow {
                portfolio: id,
                name: portfolio.name().to_string(),
                fraction,
                holdings_value,
                cash,
                total_value,
            });
        }

        let unallocated = house.total_value(host);
        broker.replace_house(house);

        let report = ReconcileReport {
            real_total,
            allocations,
            unallocated,
        };

        let allocated = report.allocated_total();
        if allocated > real_total + VALUE_EPSILON {
            error!(real = %real_total, %allocated, "Insufficient funds in real portfolio");
            return Err(AccountingError::InsufficientCapital {
                real: real_total,
                allocated,
            });
        }

        Ok(report)
    }
}
