// src/math.rs
use rust_decimal::{Decimal, RoundingStrategy};

use crate::shared::errors::IntentError;
use crate::shared::types::{Amount, Protocol, TokenUse};

/// Precision used by the router for ratios (fee rate, price, slippage, share)
pub const RATIO_DECIMALS: u8 = 18;

/// Precision of the minimum-receive figure shown to the user
pub const DISPLAY_DECIMALS: u32 = 6;

/// Slippage tolerance used when a swap intent names none, in percent
pub const DEFAULT_SWAP_SLIPPAGE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Slippage tolerance used when a liquidity intent names none, in percent
pub const DEFAULT_LIQUIDITY_SLIPPAGE: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

/// Platform tokens charged for issuing a new token
pub const TOKEN_ISSUANCE_FEE: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Largest percentage transfer or burn charge a new token may carry
pub const MAX_TOKEN_CHARGE_PERCENT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Platform service fee is one thousandth of the received amount
const SERVICE_FEE_DIVISOR: u32 = 1000;

/// Slippage percentage must be within (0, 100)
pub fn validate_slippage(slippage: Decimal) -> Result<(), IntentError> {
    if slippage <= Decimal::ZERO || slippage >= Decimal::ONE_HUNDRED {
        return Err(IntentError::InvalidSlippage(slippage.to_string()));
    }
    Ok(())
}

/// Calculate minimum output amount with slippage protection
pub fn calculate_min_receive(receive: Decimal, slippage_pct: Decimal) -> Decimal {
    receive * (Decimal::ONE - slippage_pct / Decimal::ONE_HUNDRED)
}

/// Minimum receive as the `nat` passed to the swap method
pub fn min_receive_amount(receive: &TokenUse, slippage_pct: Decimal) -> Result<Amount, IntentError> {
    Amount::from_decimal(calculate_min_receive(receive.amount, slippage_pct), receive.token.decimals)
}

/// Scale a ratio (fee rate, price, share, slippage fraction) to router precision
pub fn to_ratio_units(value: Decimal) -> Result<u128, IntentError> {
    if value.is_sign_negative() {
        return Err(IntentError::InvalidRatio(value.to_string()));
    }
    Amount::from_decimal(value, RATIO_DECIMALS)
        .map(|a| a.value)
        .map_err(|_| IntentError::InvalidRatio(value.to_string()))
}

/// Fixed fees are charged as-is, proportional fees as a fraction of the amount
pub fn compute_fee(amount: Decimal, fee: Decimal, is_fixed: bool) -> Decimal {
    if is_fixed {
        fee
    } else {
        amount * fee
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TokenFeeBreakdown {
    pub transfer_fee: Decimal,
    pub burn_fee: Decimal,
}

impl TokenFeeBreakdown {
    pub fn total(&self) -> Decimal {
        self.transfer_fee + self.burn_fee
    }
}

/// Fees charged on the paying side of a swap.
/// ICRC-1 tokens are transferred twice: into the sub-account, then into the pool.
pub fn pay_token_fees(pay: &TokenUse) -> TokenFeeBreakdown {
    if pay.amount.is_zero() {
        return TokenFeeBreakdown::default();
    }
    let fees = &pay.token.fees;
    let mut transfer_fee = compute_fee(pay.amount, fees.transfer_fee, fees.is_transfer_fee_fixed);
    if pay.token.protocol == Protocol::Icrc1 {
        transfer_fee *= Decimal::TWO;
    }
    TokenFeeBreakdown {
        transfer_fee,
        burn_fee: compute_fee(pay.amount, fees.burn_fee, fees.is_burn_fee_fixed),
    }
}

/// Fees charged on the receiving side of a swap
pub fn receive_token_fees(receive: &TokenUse) -> TokenFeeBreakdown {
    if receive.amount.is_zero() {
        return TokenFeeBreakdown::default();
    }
    let fees = &receive.token.fees;
    TokenFeeBreakdown {
        transfer_fee: compute_fee(receive.amount, fees.transfer_fee, fees.is_transfer_fee_fixed),
        burn_fee: compute_fee(receive.amount, fees.burn_fee, fees.is_burn_fee_fixed),
    }
}

/// Platform service fee, shown with two decimals
pub fn service_fee(receive: Decimal) -> Decimal {
    (receive / Decimal::from(SERVICE_FEE_DIVISOR))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::{Token, TokenFees};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn token(protocol: Protocol, fees: TokenFees) -> Token {
        Token {
            canister_id: "ryjl3-tyaaa-aaaaa-aaaba-cai".parse().unwrap(),
            symbol: "ICP".to_string(),
            decimals: 8,
            protocol,
            fees,
        }
    }

    #[test]
    fn test_calculate_min_receive() {
        let min = calculate_min_receive(dec("95"), dec("0.5"));
        assert_eq!(min, dec("94.525"));

        let min = calculate_min_receive(dec("100"), dec("1"));
        assert_eq!(min, dec("99"));
    }

    #[test]
    fn test_validate_slippage() {
        assert!(validate_slippage(dec("0.5")).is_ok());
        assert!(validate_slippage(dec("99.9")).is_ok());
        assert!(validate_slippage(dec("0")).is_err());
        assert!(validate_slippage(dec("100")).is_err());
        assert!(validate_slippage(dec("-1")).is_err());
        assert_eq!(DEFAULT_SWAP_SLIPPAGE, dec("0.5"));
        assert_eq!(DEFAULT_LIQUIDITY_SLIPPAGE, dec("0.1"));
        assert_eq!(TOKEN_ISSUANCE_FEE, dec("10000"));
    }

    #[test]
    fn test_to_ratio_units() {
        assert_eq!(to_ratio_units(dec("0.003")).unwrap(), 3_000_000_000_000_000);
        assert_eq!(to_ratio_units(dec("1")).unwrap(), 1_000_000_000_000_000_000);
        assert!(to_ratio_units(dec("-0.1")).is_err());
    }

    #[test]
    fn test_compute_fee() {
        assert_eq!(compute_fee(dec("100"), dec("0.0001"), true), dec("0.0001"));
        assert_eq!(compute_fee(dec("100"), dec("0.01"), false), dec("1"));
    }

    #[test]
    fn test_icrc1_pay_fee_doubles_transfer_fee() {
        let fees = TokenFees {
            transfer_fee: dec("0.0001"),
            is_transfer_fee_fixed: true,
            burn_fee: dec("0.002"),
            is_burn_fee_fixed: false,
        };
        let pay = TokenUse::new(token(Protocol::Icrc1, fees.clone()), dec("10"));
        let breakdown = pay_token_fees(&pay);
        assert_eq!(breakdown.transfer_fee, dec("0.0002"));
        assert_eq!(breakdown.burn_fee, dec("0.02"));

        let pay = TokenUse::new(token(Protocol::Dip20, fees), dec("10"));
        assert_eq!(pay_token_fees(&pay).transfer_fee, dec("0.0001"));
    }

    #[test]
    fn test_service_fee() {
        assert_eq!(service_fee(dec("95")), dec("0.10"));
        assert_eq!(service_fee(dec("1234")), dec("1.23"));
    }
}
