//! Configuration management for the virtual ledger.
//!
//! Loads settings from an optional config file, `.env` and environment
//! variables (`VLEDGER__SECTION__KEY`).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::host::FeeSchedule;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Netting engine settings
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Capital split between strategies
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// Default fee schedule for the paper host
    #[serde(default)]
    pub fees: FeeConfig,
    /// Paper session parameters
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Currency cash balances are kept in
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,
    /// Reset house cash after every internal netting phase
    #[serde(default = "default_true")]
    pub zero_house_cash_after_netting: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Starting cash split between strategies in backtest mode
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyAllocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAllocation {
    pub name: String,
    /// Share of the account (0.0-1.0)
    pub fraction: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Fee as a fraction of notional (0.005 = 0.5%)
    #[serde(default = "default_fee_rate")]
    pub rate: Decimal,
    #[serde(default)]
    pub minimum: Decimal,
    #[serde(default)]
    pub maximum: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of bars in a paper session
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Delay between bars
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Bars per simulated trading day
    #[serde(default = "default_ticks_per_day")]
    pub ticks_per_day: u64,
    #[serde(default = "default_symbols")]
    pub symbols: Vec<SymbolConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    /// Opening price
    pub price: Decimal,
    #[serde(default = "default_lot_size")]
    pub lot_size: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_directory")]
    pub directory: String,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_quote_currency() -> String {
    "USD".to_string()
}

fn default_true() -> bool {
    true
}

fn default_initial_cash() -> Decimal {
    Decimal::new(100_000, 0)
}

fn default_strategies() -> Vec<StrategyAllocation> {
    vec![
        StrategyAllocation {
            name: "balanced".to_string(),
            fraction: Decimal::new(60, 2), // 0.60
        },
        StrategyAllocation {
            name: "concentrated".to_string(),
            fraction: Decimal::new(40, 2), // 0.40
        },
    ]
}

fn default_fee_rate() -> Decimal {
    Decimal::new(5, 3) // 0.005 (0.5%)
}

fn default_ticks() -> u64 {
    20
}

fn default_tick_interval_ms() -> u64 {
    250
}

fn default_ticks_per_day() -> u64 {
    5
}

fn default_symbols() -> Vec<SymbolConfig> {
    vec![
        SymbolConfig {
            symbol: "SPY".to_string(),
            price: Decimal::new(450, 0),
            lot_size: Decimal::ONE,
        },
        SymbolConfig {
            symbol: "TLT".to_string(),
            price: Decimal::new(95, 0),
            lot_size: Decimal::ONE,
        },
        SymbolConfig {
            symbol: "BTCUSD".to_string(),
            price: Decimal::new(40_000, 0),
            lot_size: Decimal::new(1, 4), // 0.0001
        },
    ]
}

fn default_lot_size() -> Decimal {
    Decimal::ONE
}

fn default_log_directory() -> String {
    "logs".to_string()
}

fn default_log_file_prefix() -> String {
    "virtual-ledger.log".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("virtual-ledger").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("VLEDGER"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        for strategy in &self.allocation.strategies {
            anyhow::ensure!(
                strategy.fraction > Decimal::ZERO && strategy.fraction <= Decimal::ONE,
                "allocation fraction for '{}' must be between 0 and 1",
                strategy.name
            );
        }

        let total: Decimal = self.allocation.strategies.iter().map(|s| s.fraction).sum();
        anyhow::ensure!(
            total <= Decimal::ONE,
            "allocation fractions sum to {total}, which exceeds 1"
        );

        anyhow::ensure!(
            self.allocation.initial_cash >= Decimal::ZERO,
            "initial_cash must not be negative"
        );

        anyhow::ensure!(
            self.fees.rate >= Decimal::ZERO && self.fees.rate < Decimal::ONE,
            "fee rate must be in [0, 1)"
        );

        anyhow::ensure!(
            self.fees.minimum >= Decimal::ZERO,
            "minimum fee must not be negative"
        );

        for symbol in &self.simulation.symbols {
            anyhow::ensure!(
                symbol.lot_size > Decimal::ZERO,
                "lot_size for {} must be positive",
                symbol.symbol
            );
            anyhow::ensure!(
                symbol.price > Decimal::ZERO,
                "price for {} must be positive",
                symbol.symbol
            );
        }

        anyhow::ensure!(
            self.simulation.ticks_per_day > 0,
            "ticks_per_day must be at least 1"
        );

        Ok(())
    }
}

impl FeeConfig {
    pub fn schedule(&self) -> FeeSchedule {
        let schedule = FeeSchedule::new(self.rate).with_minimum(self.minimum);
        match self.maximum {
            Some(maximum) => schedule.with_maximum(maximum),
            None => schedule,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            quote_currency: default_quote_currency(),
            zero_house_cash_after_netting: default_true(),
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            initial_cash: default_initial_cash(),
            strategies: default_strategies(),
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            rate: default_fee_rate(),
            minimum: Decimal::ZERO,
            maximum: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            tick_interval_ms: default_tick_interval_ms(),
            ticks_per_day: default_ticks_per_day(),
            symbols: default_symbols(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file_prefix: default_log_file_prefix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overallocation_is_rejected() {
        let mut config = Config::default();
        config.allocation.strategies.push(StrategyAllocation {
            name: "extra".to_string(),
            fraction: dec!(0.1),
        });

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds 1"));
    }

    #[test]
    fn test_zero_fraction_is_rejected() {
        let mut config = Config::default();
        config.allocation.strategies[0].fraction = Decimal::ZERO;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fee_rate_bounds() {
        let mut config = Config::default();
        config.fees.rate = Decimal::ONE;
        assert!(config.validate().is_err());

        config.fees.rate = dec!(-0.01);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_lot_size_is_rejected() {
        let mut config = Config::default();
        config.simulation.symbols[0].lot_size = Decimal::ZERO;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fee_schedule_from_config() {
        let fees = FeeConfig {
            rate: dec!(0.01),
            minimum: dec!(1),
            maximum: Some(dec!(5)),
        };

        let schedule = fees.schedule();

        assert_eq!(schedule.order_fee(dec!(50)), dec!(1));
        assert_eq!(schedule.order_fee(dec!(1000)), dec!(5));
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "broker": { "quote_currency": "EUR" }, "simulation": { "ticks": 3 } }"#,
        )
        .unwrap();

        assert_eq!(config.broker.quote_currency, "EUR");
        assert!(config.broker.zero_house_cash_after_netting);
        assert_eq!(config.simulation.ticks, 3);
        assert_eq!(config.simulation.symbols.len(), 3);
        assert_eq!(config.allocation.initial_cash, dec!(100000));
    }
}
