//! Decimal arithmetic at a fixed working precision.
//!
//! Every monetary value and quantity is a [`Decimal`]. Products are rounded to
//! [`SIGNIFICANT_DIGITS`]; sums and differences are exact, so a lot balance
//! decremented many times still adds back up to its buy quantity.

use rust_decimal::Decimal;

/// Significant digits kept after a multiplication.
pub const SIGNIFICANT_DIGITS: u32 = 24;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("decimal overflow computing {lhs} {op} {rhs}")]
    Overflow {
        lhs: Decimal,
        op: &'static str,
        rhs: Decimal,
    },
}

/// Round to the working precision.
pub fn round(value: Decimal) -> Decimal {
    value
        .round_sf(SIGNIFICANT_DIGITS)
        .unwrap_or(value)
        .normalize()
}

pub fn mul(lhs: Decimal, rhs: Decimal) -> Result<Decimal, ArithmeticError> {
    lhs.checked_mul(rhs)
        .map(round)
        .ok_or(ArithmeticError::Overflow { lhs, op: "*", rhs })
}

pub fn add(lhs: Decimal, rhs: Decimal) -> Result<Decimal, ArithmeticError> {
    lhs.checked_add(rhs)
        .ok_or(ArithmeticError::Overflow { lhs, op: "+", rhs })
}

pub fn sub(lhs: Decimal, rhs: Decimal) -> Result<Decimal, ArithmeticError> {
    lhs.checked_sub(rhs)
        .ok_or(ArithmeticError::Overflow { lhs, op: "-", rhs })
}

/// Format a quantity with up to 8 decimal places and no trailing zeros.
pub fn format_quantity(qty: Decimal) -> String {
    let s = format!("{:.8}", qty);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn mul_keeps_exact_products() {
        assert_eq!(mul(dec!(2.5), dec!(100)).unwrap(), dec!(250));
        assert_eq!(mul(dec!(0.1), dec!(0.2)).unwrap(), dec!(0.02));
    }

    #[test]
    fn mul_rounds_to_working_precision() {
        let product = mul(dec!(0.333333333333333333333333333), dec!(1)).unwrap();
        assert_eq!(product.to_string().trim_start_matches("0.").len(), 24);
    }

    #[test]
    fn overflow_is_reported() {
        let err = mul(Decimal::MAX, dec!(2)).unwrap_err();
        assert!(matches!(err, ArithmeticError::Overflow { op: "*", .. }));
    }

    #[test]
    fn repeated_subtraction_conserves_balance() {
        let start = dec!(1.000000000000000001);
        let mut balance = start;
        let mut taken = Decimal::ZERO;
        for _ in 0..1000 {
            let part = dec!(0.000000000000000001);
            balance = sub(balance, part).unwrap();
            taken = add(taken, part).unwrap();
        }
        assert_eq!(balance + taken, start);
    }

    #[test]
    fn quantity_formatting_trims_zeros() {
        assert_eq!(format_quantity(dec!(1.50000000)), "1.5");
        assert_eq!(format_quantity(dec!(2)), "2");
        assert_eq!(format_quantity(dec!(0.12345678)), "0.12345678");
    }
}
