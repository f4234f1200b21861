//! Periodic rebalancing to fixed portfolio weights.

use super::algorithm::{Algorithm, Strategy};
use rust_decimal::Decimal;
use tracing::debug;

/// Rebalances to a fixed weight per symbol every `rebalance_every` bars and
/// liquidates when the run ends.
#[derive(Debug, Clone)]
pub struct TargetWeights {
    name: String,
    weights: Vec<(String, Decimal)>,
    rebalance_every: u32,
    warm_up_days: u32,
    bars: u32,
}

impl TargetWeights {
    pub fn new(name: &str, weights: Vec<(String, Decimal)>) -> Self {
        Self {
            name: name.to_string(),
            weights,
            rebalance_every: 1,
            warm_up_days: 0,
            bars: 0,
        }
    }

    /// Put `favourite_weight` in `symbols[favourite]` and spread
    /// `spread_weight` evenly over the rest.
    pub fn tilted(
        name: &str,
        symbols: &[String],
        favourite: usize,
        favourite_weight: Decimal,
        spread_weight: Decimal,
    ) -> Self {
        let others = Decimal::from(symbols.len().saturating_sub(1).max(1));
        let weights = symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| {
                let weight = if i == favourite {
                    favourite_weight
                } else {
                    spread_weight / others
                };
                (symbol.clone(), weight)
            })
            .collect();
        Self::new(name, weights)
    }

    pub fn with_rebalance_every(mut self, bars: u32) -> Self {
        self.rebalance_every = bars.max(1);
        self
    }

    pub fn with_warm_up(mut self, days: u32) -> Self {
        self.warm_up_days = days;
        self
    }

    pub fn weights(&self) -> &[(String, Decimal)] {
        &self.weights
    }
}

impl Strategy for TargetWeights {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, algo: &mut Algorithm<'_>) {
        if self.warm_up_days > 0 {
            algo.set_warm_up(self.warm_up_days);
        }
    }

    fn on_data(&mut self, algo: &mut Algorithm<'_>) {
        self.bars += 1;
        if (self.bars - 1) % self.rebalance_every != 0 {
            return;
        }

        let mut queued = 0;
        for (symbol, weight) in &self.weights {
            if algo.set_holdings(symbol, *weight, "rebalance") {
                queued += 1;
            }
        }
        debug!(strategy = %self.name, bar = self.bars, queued, "Rebalanced");
    }

    fn on_end_of_algorithm(&mut self, algo: &mut Algorithm<'_>) {
        algo.liquidate(None, "end of run");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RunContext, RunMode};
    use crate::host::PaperHost;
    use crate::portfolio::{Portfolio, PortfolioId};
    use rust_decimal_macros::dec;

    fn symbols() -> Vec<String> {
        vec!["SPY".to_string(), "TLT".to_string(), "GLD".to_string()]
    }

    #[test]
    fn test_tilted_weights() {
        let strategy = TargetWeights::tilted("t", &symbols(), 1, dec!(0.6), dec!(0.3));

        assert_eq!(
            strategy.weights(),
            &[
                ("SPY".to_string(), dec!(0.15)),
                ("TLT".to_string(), dec!(0.6)),
                ("GLD".to_string(), dec!(0.15)),
            ]
        );
    }

    #[test]
    fn test_rebalances_on_schedule() {
        let mut host = PaperHost::new(dec!(10_000));
        host.set_price("SPY", dec!(100));
        let mut portfolio = Portfolio::new(PortfolioId(0), "t", dec!(1000));
        let mut ctx = RunContext::new(RunMode::Backtest);
        let mut strategy =
            TargetWeights::new("t", vec![("SPY".to_string(), dec!(0.5))]).with_rebalance_every(2);

        for _ in 0..3 {
            let mut algo = Algorithm::new(&mut portfolio, &host, &mut ctx);
            strategy.on_data(&mut algo);
        }

        // bars 1 and 3 rebalance; nothing was executed in between
        assert_eq!(portfolio.pending_orders().len(), 2);
        assert_eq!(portfolio.pending_orders()[0].quantity, dec!(5));
    }

    #[test]
    fn test_initialize_requests_warm_up() {
        let host = PaperHost::new(dec!(10_000));
        let mut portfolio = Portfolio::new(PortfolioId(0), "t", dec!(1000));
        let mut ctx = RunContext::new(RunMode::Backtest);
        let mut strategy = TargetWeights::new("t", Vec::new()).with_warm_up(5);

        let mut algo = Algorithm::new(&mut portfolio, &host, &mut ctx);
        strategy.initialize(&mut algo);

        assert_eq!(ctx.warm_up(), Some(5));
    }
}
