//! Converts between decimal amounts and the integer minor units (cents)
//! stored in the database, and formats cents for display.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

/// Convert a decimal amount to integer cents, truncating past two decimal
/// places.
///
/// The conversion goes through [`Decimal`] so that the binary representation
/// of values such as `466.73` does not flip the truncation:
///
/// - `466.73` becomes `46673`, never `46672`.
/// - `4669.736` becomes `466973` (the mill digit is dropped, not rounded).
///
/// Non-finite input is treated as zero.
pub fn to_cents(amount: f64) -> i64 {
    let Some(decimal) = Decimal::from_f64(amount) else {
        return 0;
    };

    (decimal * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .unwrap_or(0)
}

/// Convert integer cents back to a decimal amount.
pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Convert a computed decimal amount to cents, rounding to the nearest cent.
///
/// Balance arithmetic runs in `f64`, which leaves sub-cent binary noise on
/// results such as `0.58 - 0.28`. That noise sits many orders of magnitude
/// below half a cent, so rounding recovers the exact value. User input still
/// goes through the truncating [to_cents].
pub fn to_cents_rounded(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Format cents as a display string with thousands separators and exactly
/// two decimal places, e.g. `-1,234.56`.
pub fn format_cents(cents: i64) -> String {
    static FMT: OnceLock<Formatter> = OnceLock::new();

    let fmt = FMT.get_or_init(|| {
        Formatter::new()
            .separator(',')
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    if cents == 0 {
        // Zero is hardcoded as "0", so we must specify the formatted string for zero
        return "0.00".to_owned();
    }

    let number = from_cents(cents);

    let mut formatted_string = if number < 0.0 {
        format!("-{}", fmt.fmt_string(number.abs()))
    } else {
        fmt.fmt_string(number)
    };

    // numfmt omits the last trailing zero, so we must add it ourselves
    // For example, "12.30" is rendered as "12.3" so we append "0".
    if formatted_string.as_bytes()[formatted_string.len() - 3] != b'.' {
        formatted_string = format!("{formatted_string}0");
    }

    formatted_string
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod from_cents_tests {
    use super::{from_cents, to_cents};

    #[test]
    fn converts_back_to_decimal() {
        let want = 466.73;

        let got = from_cents(46673);

        assert_eq!(want, got, "want {want}, got {got}");
    }

    #[test]
    fn round_trips_two_decimal_amounts() {
        for amount in [0.0, 0.01, 12.34, 466.73, 99999.99, -12.34] {
            assert_eq!(amount, from_cents(to_cents(amount)));
        }
    }
}

#[cfg(test)]
mod to_cents_rounded_tests {
    use super::to_cents_rounded;

    #[test]
    fn absorbs_binary_noise_below_a_cent() {
        // 0.58 - 0.28 is 0.29999999999999993 in f64
        assert_eq!(30, to_cents_rounded(0.58 - 0.28));
        // 2.0 - 1.7 is 0.30000000000000004 in f64
        assert_eq!(30, to_cents_rounded(2.0 - 1.7));
    }

    #[test]
    fn rounds_negative_amounts_to_the_nearest_cent() {
        assert_eq!(-200, to_cents_rounded(-2.0000000000000004));
    }
}
