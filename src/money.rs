//! Currency amounts. Stored and summed as integer minor units (pesewas);
//! decimal strings only exist at the API boundary.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("amount is not a valid decimal number")]
    Malformed,
    #[error("amount must not be negative")]
    Negative,
    #[error("amount has more than two decimal places")]
    Precision,
    #[error("amount is out of range")]
    OutOfRange,
}

/// Parse a decimal amount string ("25.50") into minor units (2550).
pub fn parse_amount(raw: &str) -> Result<i64, MoneyError> {
    let amount: Decimal = raw.trim().parse().map_err(|_| MoneyError::Malformed)?;
    if amount.is_sign_negative() {
        return Err(MoneyError::Negative);
    }
    let minor = amount
        .checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))
        .ok_or(MoneyError::OutOfRange)?;
    if !minor.fract().is_zero() {
        return Err(MoneyError::Precision);
    }
    minor.to_i64().ok_or(MoneyError::OutOfRange)
}

/// Render minor units as a two-decimal amount string.
pub fn format_amount(minor: i64) -> String {
    Decimal::new(minor, 2).to_string()
}

pub fn line_total_minor(quantity: i32, unit_price_minor: i64) -> i64 {
    unit_price_minor.saturating_mul(i64::from(quantity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_decimal_amounts() {
        assert_eq!(parse_amount("25.50"), Ok(2550));
        assert_eq!(parse_amount("0.05"), Ok(5));
        assert_eq!(parse_amount("10"), Ok(1000));
        assert_eq!(parse_amount(" 5.5 "), Ok(550));
        assert_eq!(parse_amount("0"), Ok(0));
    }

    #[test]
    fn rejects_bad_amounts() {
        assert_eq!(parse_amount("ten cedis"), Err(MoneyError::Malformed));
        assert_eq!(parse_amount(""), Err(MoneyError::Malformed));
        assert_eq!(parse_amount("-1.00"), Err(MoneyError::Negative));
        assert_eq!(parse_amount("1.005"), Err(MoneyError::Precision));
    }

    #[test]
    fn formats_with_two_decimals() {
        assert_eq!(format_amount(2550), "25.50");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(0), "0.00");
    }

    #[test]
    fn totals_never_drift() {
        // (qty 2, 10.00) + (qty 1, 5.50) = 25.50, bit-exact on every pass.
        for _ in 0..1000 {
            let total = line_total_minor(2, 1000) + line_total_minor(1, 550);
            assert_eq!(total, 2550);
            assert_eq!(format_amount(total), "25.50");
        }
    }

    #[test]
    fn round_trips_through_parse_and_format() {
        for raw in ["25.50", "0.05", "19999.99"] {
            let minor = parse_amount(raw).unwrap();
            assert_eq!(format_amount(minor), raw);
        }
    }
}
