//! Buy-and-hold reference series for performance reports.

use crate::host::Host;
use crate::utils::decimal::percentage_change;
use rust_decimal::Decimal;

/// Tracks the return of holding one symbol since it was first priced.
#[derive(Debug, Clone)]
pub struct Benchmark {
    symbol: String,
    base: Option<Decimal>,
}

impl Benchmark {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            base: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Return since the first observed price, in percent.
    pub fn performance(&mut self, host: &dyn Host) -> Decimal {
        let Some(price) = host.price(&self.symbol).filter(|p| *p > Decimal::ZERO) else {
            return Decimal::ZERO;
        };
        let base = *self.base.get_or_insert(price);
        percentage_change(price, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::PaperHost;
    use rust_decimal_macros::dec;

    #[test]
    fn test_first_price_becomes_base() {
        let mut host = PaperHost::new(Decimal::ZERO);
        let mut benchmark = Benchmark::new("SPY");

        assert_eq!(benchmark.performance(&host), Decimal::ZERO);

        host.set_price("SPY", dec!(200));
        assert_eq!(benchmark.performance(&host), Decimal::ZERO);

        host.set_price("SPY", dec!(220));
        assert_eq!(benchmark.performance(&host), dec!(10));

        host.set_price("SPY", dec!(150));
        assert_eq!(benchmark.performance(&host), dec!(-25));
    }
}
