//! Fee-aware conversion of a target allocation into an order quantity.
//!
//! The raw quantity `|target - current| / price` is floored to whole lots,
//! then shrunk until the order plus its worst-case fee fits inside the
//! budgeted order value. Every iteration removes at least one lot, so the
//! loop is bounded by the initial lot count.

use crate::host::FeeSchedule;
use crate::utils::decimal::{whole_lots, QUANTITY_EPSILON};
use rust_decimal::Decimal;
use tracing::debug;

/// Everything the solver needs about one ledger and one symbol.
#[derive(Debug, Clone)]
pub struct SizingInput {
    /// Quantity currently held by the ledger
    pub held: Decimal,
    /// Current price; `None` or zero means the symbol cannot be sized
    pub price: Option<Decimal>,
    /// Ledger total value (holdings at market + cash)
    pub total_value: Decimal,
    /// Target fraction of total value to hold in the symbol
    pub target: Decimal,
    pub lot_size: Decimal,
    pub fees: FeeSchedule,
}

fn effective_lot(lot_size: Decimal) -> Decimal {
    if lot_size > Decimal::ZERO {
        lot_size
    } else {
        QUANTITY_EPSILON
    }
}

/// Signed order quantity that moves the ledger toward `input.target`.
///
/// Returns zero when no price is available or not even one lot is
/// affordable after fees. A zero target always returns `-held`.
pub fn solve_quantity(input: &SizingInput) -> Decimal {
    let price = match input.price {
        Some(price) if price > Decimal::ZERO => price,
        _ => return Decimal::ZERO,
    };

    if input.target == Decimal::ZERO {
        return -input.held;
    }

    let target_value = input.target * input.total_value;
    let current_value = input.held * price;
    let buying = target_value > current_value;
    let budget = (target_value - current_value).abs();

    let lot = effective_lot(input.lot_size);
    let mut lots = whole_lots(budget / price, lot);
    if !buying {
        // A ledger never sells more than it holds
        lots = lots.min(whole_lots(input.held.max(Decimal::ZERO), lot));
    }

    let mut iterations = 0u32;
    let quantity = loop {
        if lots <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let quantity = lots * lot;
        let notional = quantity * price;
        let fee = input.fees.order_fee(notional);
        if notional + fee <= budget {
            break quantity;
        }

        let fee_in_lots = whole_lots(fee / price, lot).max(Decimal::ONE);
        lots -= fee_in_lots;
        iterations += 1;
    };

    debug!(
        %budget,
        %price,
        %quantity,
        iterations,
        buying,
        "Sized order for target allocation"
    );

    if buying {
        quantity
    } else {
        -quantity
    }
}
