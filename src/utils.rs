use alloy_primitives::U256;

use crate::entity::amount::pow10;
use crate::entity::{PAYMENT_DECIMALS, SALE_TOKEN_DECIMALS};

// Exact base-10 formatting of smallest-unit integers. Payment amounts must
// reconcile exactly with on-chain balances, so everything here stays on
// integer digit strings; no float touches this path.

/// Render a smallest-unit integer as an exact decimal string, e.g.
/// (1_500_000, 6) -> "1.500000". Inverse of `Amount::parse` for any
/// precision >= the exponent.
pub fn format_units(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    if decimals == 0 {
        return digits;
    }

    let d = decimals as usize;
    if digits.len() > d {
        let (int_part, frac_part) = digits.split_at(digits.len() - d);
        format!("{}.{}", int_part, frac_part)
    } else {
        format!("0.{:0>width$}", digits, width = d)
    }
}

/// Round a plain decimal string half-up at `dp` fractional digits, with
/// trailing zeros stripped. Carries propagate across the decimal point:
/// "0.999996" at dp=5 becomes "1".
pub fn round_decimal_str(s: &str, dp: usize) -> String {
    let (int_raw, frac_raw) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };

    if frac_raw.len() <= dp {
        let frac = frac_raw.trim_end_matches('0');
        return if frac.is_empty() {
            int_raw.to_string()
        } else {
            format!("{}.{}", int_raw, frac)
        };
    }

    let next = frac_raw.as_bytes()[dp];
    let mut carry = u32::from(next >= b'5');

    let mut frac_digits: Vec<u32> = frac_raw[..dp]
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .collect();
    for digit in frac_digits.iter_mut() {
        if carry == 0 {
            break;
        }
        let x = *digit + carry;
        if x >= 10 {
            *digit = x - 10;
            carry = 1;
        } else {
            *digit = x;
            carry = 0;
        }
    }

    let int_part = if carry > 0 {
        (U256::from_str_radix(int_raw, 10).unwrap_or(U256::ZERO) + U256::from(1u64)).to_string()
    } else {
        int_raw.to_string()
    };

    let frac: String = frac_digits.iter().rev().map(|d| d.to_string()).collect();
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int_part
    } else {
        format!("{}.{}", int_part, frac)
    }
}

/// Insert thousands separators into a plain integer string
pub fn add_thousands(int_part: &str) -> String {
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3);
    let len = int_part.len();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a smallest-unit integer for display: exact value rounded half-up
/// at `dp` digits, trailing zeros stripped, thousands separators in the
/// integer part.
pub fn format_amount(raw: U256, decimals: u8, dp: usize) -> String {
    let rounded = round_decimal_str(&format_units(raw, decimals), dp);
    match rounded.split_once('.') {
        Some((i, f)) => format!("{}.{}", add_thousands(i), f),
        None => add_thousands(&rounded),
    }
}

/// Payment-token amounts render at 2 fractional digits
pub fn format_payment(raw: U256) -> String {
    format_amount(raw, PAYMENT_DECIMALS, 2)
}

/// Prices keep the full payment-token precision
pub fn format_price(raw: U256) -> String {
    format_amount(raw, PAYMENT_DECIMALS, 6)
}

/// Sale-token amounts: 4 digits at or above one whole token, 6 below,
/// which keeps sub-unit prices readable without cluttering large balances.
pub fn format_sale_token(raw: U256) -> String {
    let dp = if raw >= pow10(SALE_TOKEN_DECIMALS) { 4 } else { 6 };
    format_amount(raw, SALE_TOKEN_DECIMALS, dp)
}

/// Quoted outputs always render at 4 digits
pub fn format_quote(raw: U256) -> String {
    format_amount(raw, SALE_TOKEN_DECIMALS, 4)
}

// Shorten address for display
pub fn shorten_address(address: &str) -> String {
    if address.len() <= 12 {
        return address.to_string();
    }

    let start = &address[..6];
    let end = &address[address.len() - 4..];

    format!("{}...{}", start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Amount;

    #[test]
    fn formats_exact_units() {
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.500000");
        assert_eq!(format_units(U256::from(42u64), 6), "0.000042");
        assert_eq!(format_units(U256::from(7u64), 0), "7");
    }

    #[test]
    fn round_trips_through_parse() {
        for raw in [0u64, 1, 999_999, 1_000_000, 123_456_789_012] {
            let raw = U256::from(raw);
            let s = format_units(raw, 6);
            assert_eq!(Amount::parse(&s, 6).unwrap().raw(), raw);
        }
    }

    #[test]
    fn carry_propagates_into_integer_part() {
        // 0.999996 at 5 places rounds all the way up to 1
        assert_eq!(format_amount(U256::from(999_996u64), 6, 5), "1");
    }

    #[test]
    fn rounding_is_idempotent() {
        let once = round_decimal_str("142.857142", 4);
        assert_eq!(once, "142.8571");
        assert_eq!(round_decimal_str(&once, 4), once);
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_decimal_str("0.125", 2), "0.13");
        assert_eq!(round_decimal_str("0.124", 2), "0.12");
        assert_eq!(round_decimal_str("9.999", 2), "10");
    }

    #[test]
    fn strips_trailing_zeros_and_groups_thousands() {
        assert_eq!(format_payment(U256::from(1_234_567_000_000u64)), "1,234,567");
        assert_eq!(format_payment(U256::from(1_234_560_000u64)), "1,234.56");
    }

    #[test]
    fn sale_token_precision_depends_on_magnitude() {
        // 2.5 tokens -> 4 digits
        let two_and_a_half = U256::from(2_500_000_000_000_000_000u64);
        assert_eq!(format_sale_token(two_and_a_half), "2.5");
        // 0.1234567 tokens -> 6 digits
        let fraction = U256::from(123_456_700_000_000_000u64);
        assert_eq!(format_sale_token(fraction), "0.123457");
    }

    #[test]
    fn shortens_long_addresses() {
        assert_eq!(
            shorten_address("0xd27131870F189249F9C7F57E985486a0568F64EF"),
            "0xd271...64EF"
        );
        assert_eq!(shorten_address("0xabc"), "0xabc");
    }
}
