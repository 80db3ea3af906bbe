use alloy_primitives::U256;
use lazy_static::lazy_static;
use regex::Regex;

use crate::entity::SaleError;

/// Decimal exponent of the payment stablecoin
pub const PAYMENT_DECIMALS: u8 = 6;
/// Decimal exponent of the sale token
pub const SALE_TOKEN_DECIMALS: u8 = 18;

/// An exact on-chain quantity: a smallest-unit integer paired with its
/// decimal exponent. All arithmetic stays on integers; mixing amounts of
/// different exponents requires an explicit `rescale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    raw: U256,
    decimals: u8,
}

impl Amount {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn zero(decimals: u8) -> Self {
        Self {
            raw: U256::ZERO,
            decimals,
        }
    }

    pub fn raw(&self) -> U256 {
        self.raw
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// Re-express this amount at a different decimal exponent. Scaling down
    /// truncates toward zero; scaling up past the U256 range is an error,
    /// never a wrapped value.
    pub fn rescale(&self, decimals: u8) -> Result<Amount, SaleError> {
        let raw = if decimals >= self.decimals {
            self.raw
                .checked_mul(pow10(decimals - self.decimals))
                .ok_or_else(|| {
                    SaleError::InvalidAmount(format!("{} overflows at {} decimals", self.raw, decimals))
                })?
        } else {
            self.raw / pow10(self.decimals - decimals)
        };
        Ok(Amount { raw, decimals })
    }

    /// Parse a user-entered decimal string (e.g. "12.5") into smallest units.
    /// Rejects malformed input and more fractional digits than the exponent
    /// allows.
    pub fn parse(input: &str, decimals: u8) -> Result<Amount, SaleError> {
        lazy_static! {
            static ref AMOUNT_RE: Regex = Regex::new(r"^(\d+)(?:\.(\d*))?$").unwrap();
        }

        let trimmed = input.trim();
        let caps = AMOUNT_RE
            .captures(trimmed)
            .ok_or_else(|| SaleError::InvalidAmount(trimmed.to_string()))?;

        let int_part = caps.get(1).map(|m| m.as_str()).unwrap_or("0");
        let frac_part = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        if frac_part.len() > decimals as usize {
            return Err(SaleError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                trimmed, decimals
            )));
        }

        let int_units = U256::from_str_radix(int_part, 10)
            .map_err(|_| SaleError::InvalidAmount(trimmed.to_string()))?;

        let frac_units = if frac_part.is_empty() {
            U256::ZERO
        } else {
            let scale = pow10(decimals - frac_part.len() as u8);
            U256::from_str_radix(frac_part, 10)
                .map_err(|_| SaleError::InvalidAmount(trimmed.to_string()))?
                * scale
        };

        let raw = int_units
            .checked_mul(pow10(decimals))
            .and_then(|units| units.checked_add(frac_units))
            .ok_or_else(|| SaleError::InvalidAmount(format!("{} is too large", trimmed)))?;

        Ok(Amount { raw, decimals })
    }
}

/// 10^n as a U256
pub fn pow10(n: u8) -> U256 {
    U256::from(10u64).pow(U256::from(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_input() {
        let a = Amount::parse("50", PAYMENT_DECIMALS).unwrap();
        assert_eq!(a.raw(), U256::from(50_000_000u64));

        let b = Amount::parse("0.35", PAYMENT_DECIMALS).unwrap();
        assert_eq!(b.raw(), U256::from(350_000u64));

        let c = Amount::parse("12.", PAYMENT_DECIMALS).unwrap();
        assert_eq!(c.raw(), U256::from(12_000_000u64));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Amount::parse("", PAYMENT_DECIMALS).is_err());
        assert!(Amount::parse("-1", PAYMENT_DECIMALS).is_err());
        assert!(Amount::parse("1,5", PAYMENT_DECIMALS).is_err());
        assert!(Amount::parse("1.2345678", PAYMENT_DECIMALS).is_err());
    }

    #[test]
    fn rescales_between_exponents() {
        let usdc = Amount::parse("1.5", PAYMENT_DECIMALS).unwrap();
        let wide = usdc.rescale(SALE_TOKEN_DECIMALS).unwrap();
        assert_eq!(wide.raw(), U256::from(1_500_000_000_000_000_000u64));
        assert_eq!(wide.rescale(PAYMENT_DECIMALS).unwrap(), usdc);
    }

    #[test]
    fn rejects_values_past_the_u256_range() {
        // 75 nines fit in a U256 on their own but not once scaled to
        // smallest units; the result must be an error, not a wrapped value
        let huge = "9".repeat(75);
        assert!(matches!(
            Amount::parse(&huge, PAYMENT_DECIMALS),
            Err(SaleError::InvalidAmount(_))
        ));

        let max = Amount::new(U256::MAX, PAYMENT_DECIMALS);
        assert!(max.rescale(SALE_TOKEN_DECIMALS).is_err());
    }
}
