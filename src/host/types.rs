//! Value types exchanged with the trading host.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Order type understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    StopLimit,
    MarketOnOpen,
    MarketOnClose,
    OptionExercise,
}

impl OrderType {
    /// Orders that execute at the prevailing price and can therefore be
    /// satisfied from house inventory.
    pub fn is_immediate(&self) -> bool {
        matches!(self, OrderType::Market)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderType::Market => "Market",
            OrderType::Limit => "Limit",
            OrderType::StopMarket => "StopMarket",
            OrderType::StopLimit => "StopLimit",
            OrderType::MarketOnOpen => "MarketOnOpen",
            OrderType::MarketOnClose => "MarketOnClose",
            OrderType::OptionExercise => "OptionExercise",
        };
        f.write_str(name)
    }
}

/// Order status reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Submitted,
    PartiallyFilled,
    Filled,
    Canceled,
    Invalid,
    CancelPending,
    /// Anything the host reports that we do not model.
    Unknown,
}

impl OrderStatus {
    /// No further events are expected for an order in this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::PartiallyFilled
                | OrderStatus::Invalid
                | OrderStatus::Canceled
        )
    }

    /// The order is still working at the venue.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::Submitted | OrderStatus::CancelPending
        )
    }

    pub fn is_fill(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::PartiallyFilled)
    }
}

/// Identifier the host assigns to a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle returned by every submission call.
///
/// A ticket whose status is already terminal means the venue filled the
/// order synchronously and no event will follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub order_id: OrderId,
    pub symbol: String,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// Signed filled quantity (negative for sells)
    pub fill_quantity: Decimal,
    pub fill_price: Decimal,
    pub fee: Decimal,
}

impl OrderTicket {
    /// A pending ticket with nothing filled yet.
    pub fn pending(
        order_id: OrderId,
        symbol: &str,
        quantity: Decimal,
        order_type: OrderType,
        status: OrderStatus,
    ) -> Self {
        Self {
            order_id,
            symbol: symbol.to_string(),
            quantity,
            order_type,
            status,
            fill_quantity: Decimal::ZERO,
            fill_price: Decimal::ZERO,
            fee: Decimal::ZERO,
        }
    }
}

/// Asynchronous fill/status notification for a previously submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub symbol: String,
    pub status: OrderStatus,
    /// Signed filled quantity (negative for sells)
    pub fill_quantity: Decimal,
    pub fill_price: Decimal,
    pub fee: Decimal,
    pub time: DateTime<Utc>,
}

/// Per-symbol trading properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolProperties {
    /// Minimum tradable increment
    pub lot_size: Decimal,
    /// Currency the symbol is priced in (e.g. "USD")
    pub quote_currency: String,
}

impl Default for SymbolProperties {
    fn default() -> Self {
        Self {
            lot_size: Decimal::ONE,
            quote_currency: "USD".to_string(),
        }
    }
}

/// Percentage-of-notional fee bounded per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fee as a fraction of notional (0.005 = 0.5%)
    pub rate: Decimal,
    /// Minimum fee charged on any non-empty order
    #[serde(default)]
    pub minimum: Decimal,
    /// Optional cap per order
    #[serde(default)]
    pub maximum: Option<Decimal>,
}

impl FeeSchedule {
    pub fn new(rate: Decimal) -> Self {
        Self {
            rate,
            minimum: Decimal::ZERO,
            maximum: None,
        }
    }

    pub fn with_minimum(mut self, minimum: Decimal) -> Self {
        self.minimum = minimum;
        self
    }

    pub fn with_maximum(mut self, maximum: Decimal) -> Self {
        self.maximum = Some(maximum);
        self
    }

    /// No fees at all.
    pub fn free() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Flat 0.50% taker tier (first volume tier of retail crypto venues).
    pub fn crypto_taker() -> Self {
        Self::new(dec!(0.005))
    }

    /// Fee for an order of the given notional value.
    pub fn order_fee(&self, notional: Decimal) -> Decimal {
        let notional = notional.abs();
        if notional == Decimal::ZERO {
            return Decimal::ZERO;
        }

        let mut fee = (notional * self.rate).max(self.minimum);
        if let Some(maximum) = self.maximum {
            fee = fee.min(maximum);
        }
        fee
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::free()
    }
}

/// One non-cash holding in the real account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
}

/// Snapshot of the real brokerage account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Cash balance per currency code
    pub cash: BTreeMap<String, Decimal>,
    pub holdings: Vec<Holding>,
}

impl AccountSnapshot {
    pub fn cash_in(&self, currency: &str) -> Decimal {
        self.cash.get(currency).copied().unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::PartiallyFilled.is_terminal());
        assert!(OrderStatus::Invalid.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());

        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Submitted.is_terminal());
        assert!(!OrderStatus::CancelPending.is_terminal());
        assert!(!OrderStatus::Unknown.is_terminal());
        assert!(!OrderStatus::Unknown.is_open());
    }

    #[test]
    fn test_fee_schedule_bounds() {
        let schedule = FeeSchedule::new(dec!(0.01))
            .with_minimum(dec!(1))
            .with_maximum(dec!(5));

        assert_eq!(schedule.order_fee(dec!(10)), dec!(1)); // 0.10 -> min
        assert_eq!(schedule.order_fee(dec!(300)), dec!(3));
        assert_eq!(schedule.order_fee(dec!(-300)), dec!(3));
        assert_eq!(schedule.order_fee(dec!(10000)), dec!(5)); // 100 -> max
        assert_eq!(schedule.order_fee(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_crypto_taker_fee() {
        assert_eq!(FeeSchedule::crypto_taker().order_fee(dec!(1000)), dec!(5));
    }

    #[test]
    fn test_order_type_display() {
        assert_eq!(OrderType::StopLimit.to_string(), "StopLimit");
        assert!(OrderType::Market.is_immediate());
        assert!(!OrderType::MarketOnClose.is_immediate());
    }
}
