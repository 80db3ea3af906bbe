use alloy_primitives::U256;

use crate::entity::amount::{pow10, Amount, SALE_TOKEN_DECIMALS};

/// Result of pricing a payment-token input against the current sale price.
/// Recomputed on every refresh and input change, never cached across a
/// price change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuoteResult {
    Quote { input: Amount, output: Amount },
    #[default]
    Unavailable,
}

impl QuoteResult {
    /// `output = input * 10^18 / price`, all in smallest units. A missing or
    /// zero price or input yields `Unavailable`, never a misleading zero.
    pub fn compute(price: Option<U256>, input: Option<Amount>) -> QuoteResult {
        let (price, input) = match (price, input) {
            (Some(p), Some(a)) if !p.is_zero() && !a.is_zero() => (p, a),
            _ => return QuoteResult::Unavailable,
        };

        let out = input.raw() * pow10(SALE_TOKEN_DECIMALS) / price;
        QuoteResult::Quote {
            input,
            output: Amount::new(out, SALE_TOKEN_DECIMALS),
        }
    }

    pub fn output(&self) -> Option<Amount> {
        match self {
            QuoteResult::Quote { output, .. } => Some(*output),
            QuoteResult::Unavailable => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PAYMENT_DECIMALS;
    use crate::utils::format_quote;

    #[test]
    fn quotes_fifty_usdc_at_35_cents() {
        // price 0.35 USDC per token, input 50 USDC
        let price = U256::from(350_000u64);
        let input = Amount::parse("50", PAYMENT_DECIMALS).unwrap();

        let quote = QuoteResult::compute(Some(price), Some(input));
        let output = quote.output().unwrap();
        assert_eq!(format_quote(output.raw()), "142.8571");
    }

    #[test]
    fn zero_price_or_input_is_unavailable() {
        let input = Amount::parse("50", PAYMENT_DECIMALS).unwrap();
        assert_eq!(
            QuoteResult::compute(Some(U256::ZERO), Some(input)),
            QuoteResult::Unavailable
        );
        assert_eq!(
            QuoteResult::compute(None, Some(input)),
            QuoteResult::Unavailable
        );
        assert_eq!(
            QuoteResult::compute(
                Some(U256::from(350_000u64)),
                Some(Amount::zero(PAYMENT_DECIMALS))
            ),
            QuoteResult::Unavailable
        );
    }
}
