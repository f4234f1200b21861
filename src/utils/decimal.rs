//! Decimal arithmetic utilities for ledger and sizing calculations.
//!
//! Lot-size rounding works on whole lot counts so sub-unit lot sizes
//! (e.g. 0.00000001 BTC) never accumulate rounding drift.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Quantities closer to zero than this are treated as exactly zero.
pub const QUANTITY_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 8);

/// Tolerance for comparing aggregate monetary values.
pub const VALUE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Number of whole lots contained in `value` (floored toward zero).
///
/// A zero or negative lot size means "no lot constraint" and returns `value`
/// truncated to an integer count of single units.
pub fn whole_lots(value: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size <= Decimal::ZERO {
        return value.trunc();
    }
    (value / lot_size).trunc()
}

/// Round toward zero to a multiple of `lot_size`.
pub fn round_down_to_lot(value: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size <= Decimal::ZERO {
        return value;
    }
    whole_lots(value, lot_size) * lot_size
}

/// True when `quantity` is too small to be a tradable order.
pub fn is_below_lot(quantity: Decimal, lot_size: Decimal) -> bool {
    let threshold = if lot_size > Decimal::ZERO {
        lot_size
    } else {
        QUANTITY_EPSILON
    };
    quantity.abs() < threshold
}

/// Snap values within [`QUANTITY_EPSILON`] of zero to exactly zero.
pub fn snap_to_zero(quantity: Decimal) -> Decimal {
    if quantity.abs() <= QUANTITY_EPSILON {
        Decimal::ZERO
    } else {
        quantity
    }
}

/// Percentage change from `base` to `value` (e.g. 110 vs 100 = 10).
pub fn percentage_change(value: Decimal, base: Decimal) -> Decimal {
    if base == Decimal::ZERO {
        return Decimal::ZERO;
    }
    (value / base - Decimal::ONE) * dec!(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_down_to_lot() {
        assert_eq!(round_down_to_lot(dec!(1.567), dec!(0.001)), dec!(1.567));
        assert_eq!(round_down_to_lot(dec!(1.567), dec!(0.01)), dec!(1.56));
        assert_eq!(round_down_to_lot(dec!(1.567), dec!(0.1)), dec!(1.5));
        assert_eq!(round_down_to_lot(dec!(7), dec!(5)), dec!(5));
    }

    #[test]
    fn test_round_down_to_lot_negative_truncates_toward_zero() {
        assert_eq!(round_down_to_lot(dec!(-1.567), dec!(0.1)), dec!(-1.5));
    }

    #[test]
    fn test_sub_unit_lot_has_no_drift() {
        // 0.3 / 0.1 is exactly 3 lots in decimal, unlike binary floats
        assert_eq!(whole_lots(dec!(0.3), dec!(0.1)), dec!(3));
        assert_eq!(round_down_to_lot(dec!(0.3), dec!(0.1)), dec!(0.3));
        assert_eq!(whole_lots(dec!(0.00000003), dec!(0.00000001)), dec!(3));
    }

    #[test]
    fn test_is_below_lot() {
        assert!(is_below_lot(dec!(0.5), dec!(1)));
        assert!(is_below_lot(dec!(-0.5), dec!(1)));
        assert!(!is_below_lot(dec!(1), dec!(1)));
        assert!(is_below_lot(Decimal::ZERO, Decimal::ZERO));
    }

    #[test]
    fn test_snap_to_zero() {
        assert_eq!(snap_to_zero(dec!(0.000000001)), Decimal::ZERO);
        assert_eq!(snap_to_zero(dec!(-0.000000001)), Decimal::ZERO);
        assert_eq!(snap_to_zero(dec!(0.001)), dec!(0.001));
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(dec!(110), dec!(100)), dec!(10));
        assert_eq!(percentage_change(dec!(90), dec!(100)), dec!(-10));
        assert_eq!(percentage_change(dec!(90), Decimal::ZERO), Decimal::ZERO);
    }
}
