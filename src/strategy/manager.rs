//! Runs several strategies side by side over one real account.
//!
//! The manager fans every host callback out to the registered strategies,
//! each trading through its own ledger, then runs a single execution cycle
//! so their orders are netted together.

use super::algorithm::{Algorithm, Strategy};
use super::benchmark::Benchmark;
use crate::broker::{AllocationReconciler, Broker, ExecutionSummary, ReconcileReport};
use crate::config::BrokerConfig;
use crate::context::RunContext;
use crate::error::{AccountingError, AccountingResult};
use crate::host::{Host, OrderEvent, OrderStatus};
use crate::portfolio::PortfolioId;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

/// One line of the performance report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRow {
    pub name: String,
    /// Ledger total value; `None` for benchmarks
    pub total_value: Option<Decimal>,
    /// Return in percent
    pub performance: Decimal,
}

struct Registered {
    strategy: Box<dyn Strategy>,
    portfolio: PortfolioId,
}

/// Fans host callbacks out to strategies and drives the broker.
pub struct StrategyManager {
    broker: Broker,
    reconciler: AllocationReconciler,
    context: RunContext,
    strategies: Vec<Registered>,
    benchmarks: Vec<Benchmark>,
    initial_cash: Decimal,
}

impl StrategyManager {
    pub fn new(config: BrokerConfig, context: RunContext, initial_cash: Decimal) -> Self {
        let reconciler = AllocationReconciler::new(&config.quote_currency);
        Self {
            broker: Broker::new(config),
            reconciler,
            context,
            strategies: Vec::new(),
            benchmarks: Vec::new(),
            initial_cash,
        }
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RunContext {
        &mut self.context
    }

    /// Register a strategy owning `fraction` of the account and run its
    /// `initialize` hook.
    pub fn register(
        &mut self,
        strategy: Box<dyn Strategy>,
        fraction: Decimal,
        host: &dyn Host,
    ) -> AccountingResult<PortfolioId> {
        let cash = fraction * self.initial_cash;
        let id = self.broker.register_portfolio(strategy.name(), cash);
        self.reconciler.set_allocation(id, fraction);
        self.strategies.push(Registered {
            strategy,
            portfolio: id,
        });

        self.run_hook(host, |strategy, algo| strategy.initialize(algo))?;
        Ok(id)
    }

    pub fn add_benchmark(&mut self, symbol: &str) {
        self.benchmarks.push(Benchmark::new(symbol));
    }

    /// Call `hook` for every strategy, each bound to its own ledger.
    fn run_hook<F>(&mut self, host: &dyn Host, mut hook: F) -> AccountingResult<()>
    where
        F: FnMut(&mut dyn Strategy, &mut Algorithm<'_>),
    {
        for entry in &mut self.strategies {
            let portfolio = self
                .broker
                .portfolio_mut(entry.portfolio)
                .ok_or(AccountingError::UnknownPortfolio(entry.portfolio))?;
            let mut algo = Algorithm::new(portfolio, host, &mut self.context);
            hook(entry.strategy.as_mut(), &mut algo);
        }
        Ok(())
    }

    pub fn on_data(&mut self, host: &mut dyn Host) -> AccountingResult<ExecutionSummary> {
        if self.context.is_warming_up() {
            return Ok(ExecutionSummary::default());
        }
        self.run_hook(&*host, |strategy, algo| strategy.on_data(algo))?;
        self.broker.execute_orders(host)
    }

    /// End-of-day hooks, then one performance row per strategy and benchmark.
    pub fn on_end_of_day(&mut self, host: &mut dyn Host) -> AccountingResult<ExecutionSummary> {
        if self.context.is_warming_up() {
            return Ok(ExecutionSummary::default());
        }
        self.run_hook(&*host, |strategy, algo| strategy.on_end_of_day(algo))?;
        let summary = self.broker.execute_orders(host)?;

        for row in self.performance_report(&*host) {
            info!(
                name = %row.name,
                performance = %row.performance.round_dp(2),
                total_value = ?row.total_value.map(|v| v.round_dp(2)),
                "Performance"
            );
        }
        Ok(summary)
    }

    pub fn on_end_of_algorithm(&mut self, host: &mut dyn Host) -> AccountingResult<ExecutionSummary> {
        info!("OnEndOfAlgorithm");
        self.run_hook(&*host, |strategy, algo| strategy.on_end_of_algorithm(algo))?;
        self.broker.execute_orders(host)
    }

    /// Route a host order event to the broker.
    pub fn on_order_event(&mut self, event: &OrderEvent) -> AccountingResult<bool> {
        if matches!(event.status, OrderStatus::New | OrderStatus::Submitted) {
            return Ok(false);
        }
        let matched = self.broker.handle_order_event(event)?;
        if !matched {
            debug!(order_id = %event.order_id, "Could not find matching order");
        }
        Ok(matched)
    }

    /// Warm-up is over: redistribute capital in live mode, verify it in
    /// backtests.
    pub fn on_warm_up_finished(&mut self, host: &dyn Host) -> AccountingResult<Option<ReconcileReport>> {
        self.context.finish_warm_up();
        info!(mode = %self.context.mode(), "Warm-up finished");
        self.resync(host)
    }

    /// The brokerage connection came back; the real account may have moved.
    pub fn on_reconnect(&mut self, host: &dyn Host) -> AccountingResult<Option<ReconcileReport>> {
        info!("Brokerage reconnected");
        self.resync(host)
    }

    fn resync(&mut self, host: &dyn Host) -> AccountingResult<Option<ReconcileReport>> {
        if self.context.is_live() {
            let report = self.reconciler.reconcile(&mut self.broker, host)?;
            return Ok(Some(report));
        }
        self.broker.self_check(host)?;
        Ok(None)
    }

    /// Current return of every strategy ledger and benchmark.
    pub fn performance_report(&mut self, host: &dyn Host) -> Vec<PerformanceRow> {
        let mut rows: Vec<PerformanceRow> = self
            .broker
            .portfolios()
            .iter()
            .map(|p| PerformanceRow {
                name: p.name().to_string(),
                total_value: Some(p.total_value(host)),
                performance: p.performance(host),
            })
            .collect();

        rows.extend(self.benchmarks.iter_mut().map(|b| PerformanceRow {
            name: b.symbol().to_string(),
            total_value: None,
            performance: b.performance(host),
        }));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunMode;
    use crate::host::PaperHost;
    use rust_decimal_macros::dec;
    use std::cell::RefCell;
    use std::rc::Rc;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    /// Buys a fixed quantity on every bar and records which hooks ran.
    struct Buyer {
        name: String,
        symbol: String,
        quantity: Decimal,
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Buyer {
        fn boxed(name: &str, quantity: Decimal, calls: &Rc<RefCell<Vec<&'static str>>>) -> Box<dyn Strategy> {
            Box::new(Self {
                name: name.to_string(),
                symbol: "X".to_string(),
                quantity,
                calls: Rc::clone(calls),
            })
        }
    }

    impl Strategy for Buyer {
        fn name(&self) -> &str {
            &self.name
        }

        fn initialize(&mut self, _algo: &mut Algorithm<'_>) {
            self.calls.borrow_mut().push("initialize");
        }

        fn on_data(&mut self, algo: &mut Algorithm<'_>) {
            self.calls.borrow_mut().push("on_data");
            algo.market_order(&self.symbol, self.quantity, "bar");
        }

        fn on_end_of_day(&mut self, _algo: &mut Algorithm<'_>) {
            self.calls.borrow_mut().push("on_end_of_day");
        }

        fn on_end_of_algorithm(&mut self, algo: &mut Algorithm<'_>) {
            self.calls.borrow_mut().push("on_end_of_algorithm");
            algo.liquidate(None, "end");
        }
    }

    fn test_host() -> PaperHost {
        let mut host = PaperHost::new(dec!(10_000));
        host.set_price("X", dec!(10));
        host
    }

    fn test_manager(mode: RunMode) -> StrategyManager {
        StrategyManager::new(BrokerConfig::default(), RunContext::new(mode), dec!(10_000))
    }

    // =========================================================================
    // Lifecycle Tests
    // =========================================================================

    #[test]
    fn test_register_funds_ledger_and_initializes() {
        let host = test_host();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut manager = test_manager(RunMode::Backtest);

        let id = manager
            .register(Buyer::boxed("alpha", dec!(1), &calls), dec!(0.25), &host)
            .unwrap();

        assert_eq!(manager.broker().portfolio(id).unwrap().cash(), dec!(2500));
        assert_eq!(*calls.borrow(), vec!["initialize"]);
    }

    #[test]
    fn test_on_data_runs_strategies_then_executes() {
        let mut host = test_host();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut manager = test_manager(RunMode::Backtest);
        manager.register(Buyer::boxed("alpha", dec!(1), &calls), dec!(0.5), &host).unwrap();
        manager.register(Buyer::boxed("beta", dec!(2), &calls), dec!(0.5), &host).unwrap();

        let summary = manager.on_data(&mut host).unwrap();

        assert_eq!(summary.forwarded, 2);
        assert_eq!(host.submissions().len(), 2);
        assert_eq!(calls.borrow().iter().filter(|c| **c == "on_data").count(), 2);
    }

    #[test]
    fn test_warm_up_skips_hooks_except_end_of_algorithm() {
        let mut host = test_host();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut manager = test_manager(RunMode::Backtest);
        manager.context_mut().set_warm_up(3);
        manager.register(Buyer::boxed("alpha", dec!(1), &calls), dec!(0.5), &host).unwrap();

        manager.on_data(&mut host).unwrap();
        manager.on_end_of_day(&mut host).unwrap();
        manager.on_end_of_algorithm(&mut host).unwrap();

        assert_eq!(*calls.borrow(), vec!["initialize", "on_end_of_algorithm"]);
        assert!(host.submissions().is_empty());
    }

    #[test]
    fn test_fill_events_reach_originating_ledger() {
        let mut host = test_host();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut manager = test_manager(RunMode::Backtest);
        let id = manager
            .register(Buyer::boxed("alpha", dec!(3), &calls), dec!(0.5), &host)
            .unwrap();

        manager.on_data(&mut host).unwrap();
        for event in host.fill_open_orders() {
            assert!(manager.on_order_event(&event).unwrap());
        }

        let ledger = manager.broker().portfolio(id).unwrap();
        assert_eq!(ledger.quantity("X"), dec!(3));
        assert_eq!(ledger.cash(), dec!(4970));
        assert!(manager.broker().in_flight().is_empty());
    }

    #[test]
    fn test_submitted_events_ignored() {
        let mut host = test_host();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut manager = test_manager(RunMode::Backtest);
        manager.register(Buyer::boxed("alpha", dec!(3), &calls), dec!(0.5), &host).unwrap();
        manager.on_data(&mut host).unwrap();
        let order_id = host.open_order_ids()[0];

        let event = host
            .set_order_status(order_id, OrderStatus::Submitted, None)
            .unwrap();

        assert!(!manager.on_order_event(&event).unwrap());
        assert_eq!(manager.broker().in_flight().len(), 1);
    }

    // =========================================================================
    // Warm-up Completion Tests
    // =========================================================================

    #[test]
    fn test_backtest_warm_up_runs_self_check() {
        let host = test_host();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut manager = test_manager(RunMode::Backtest);
        manager.context_mut().set_warm_up(1);
        manager.register(Buyer::boxed("alpha", dec!(1), &calls), dec!(0.5), &host).unwrap();

        let report = manager.on_warm_up_finished(&host).unwrap();

        assert!(report.is_none());
        assert!(!manager.context().is_warming_up());
    }

    #[test]
    fn test_backtest_self_check_detects_overallocation() {
        let host = test_host();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut manager = test_manager(RunMode::Backtest);
        manager.register(Buyer::boxed("alpha", dec!(1), &calls), dec!(0.8), &host).unwrap();
        manager.register(Buyer::boxed("beta", dec!(1), &calls), dec!(0.8), &host).unwrap();

        let err = manager.on_warm_up_finished(&host).unwrap_err();

        assert!(matches!(err, AccountingError::InsufficientCapital { .. }));
    }

    #[test]
    fn test_live_warm_up_reconciles_with_account() {
        let mut host = test_host();
        host.set_cash("USD", dec!(20_000));
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut manager = test_manager(RunMode::Live);
        let id = manager
            .register(Buyer::boxed("alpha", dec!(1), &calls), dec!(0.5), &host)
            .unwrap();

        let report = manager.on_reconnect(&host).unwrap().unwrap();

        assert_eq!(report.real_total, dec!(20_000));
        assert_eq!(manager.broker().portfolio(id).unwrap().cash(), dec!(10_000));
        assert_eq!(manager.broker().house().cash(), dec!(10_000));
    }

    // =========================================================================
    // Reporting Tests
    // =========================================================================

    #[test]
    fn test_performance_report_includes_benchmarks() {
        let mut host = test_host();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut manager = test_manager(RunMode::Backtest);
        manager.register(Buyer::boxed("alpha", dec!(1), &calls), dec!(0.5), &host).unwrap();
        manager.add_benchmark("X");

        manager.performance_report(&host);
        host.set_price("X", dec!(11));
        let rows = manager.performance_report(&host);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "alpha");
        assert_eq!(rows[0].total_value, Some(dec!(5000)));
        assert_eq!(rows[0].performance, Decimal::ZERO);
        assert_eq!(rows[1].name, "X");
        assert_eq!(rows[1].total_value, None);
        assert_eq!(rows[1].performance, dec!(10));
    }
}
