//! Intent validation before a batch is built

use rust_decimal::Decimal;

use crate::domain::intent::{CreateTokenIntent, Intent, PoolTemplate, SwapIntent};
use crate::math::{
    pay_token_fees, receive_token_fees, service_fee, validate_slippage, MAX_TOKEN_CHARGE_PERCENT,
};
use crate::shared::errors::IntentError;
use crate::shared::types::TokenUse;

const MAX_SYMBOL_LEN: usize = 16;
const MAX_TOKEN_DECIMALS: u8 = 18;

/// Rejects intents the router would refuse or that cannot cover their fees
pub struct TransactionValidator;

impl TransactionValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, intent: &Intent) -> Result<(), IntentError> {
        match intent {
            Intent::Swap(swap) => self.validate_swap(swap),
            Intent::AddLiquidity(i) => {
                check_amount(&i.base)?;
                if !i.pool.single {
                    check_amount(&i.quote)?;
                }
                validate_slippage(i.slippage)
            }
            Intent::CreatePool(i) => {
                check_amount(&i.base)?;
                if i.template == PoolTemplate::Dual {
                    check_amount(&i.quote)?;
                }
                if i.fee_rate < Decimal::ZERO || i.fee_rate >= Decimal::ONE_HUNDRED {
                    return Err(IntentError::InvalidRatio(i.fee_rate.to_string()));
                }
                if i.initial_price <= Decimal::ZERO {
                    return Err(IntentError::InvalidRatio(i.initial_price.to_string()));
                }
                Ok(())
            }
            Intent::RemoveLiquidity(i) => {
                if i.share <= Decimal::ZERO || i.share > Decimal::ONE_HUNDRED {
                    return Err(IntentError::InvalidRatio(i.share.to_string()));
                }
                validate_slippage(i.slippage)
            }
            Intent::CreateToken(i) => self.validate_create_token(i),
            Intent::Withdraw(i) => check_amount(&i.token),
        }
    }

    fn validate_create_token(&self, token: &CreateTokenIntent) -> Result<(), IntentError> {
        let symbol_len = token.symbol.trim().chars().count();
        if !(1..=MAX_SYMBOL_LEN).contains(&symbol_len) {
            return Err(IntentError::InvalidToken(format!(
                "symbol must be 1 to {} characters",
                MAX_SYMBOL_LEN
            )));
        }
        if token.logo.trim().is_empty() {
            return Err(IntentError::InvalidToken("logo is required".to_string()));
        }
        if token.decimals > MAX_TOKEN_DECIMALS {
            return Err(IntentError::InvalidToken(format!(
                "decimals {} above {}",
                token.decimals, MAX_TOKEN_DECIMALS
            )));
        }
        if token.total_supply <= Decimal::ZERO {
            return Err(IntentError::ZeroAmount(token.symbol.clone()));
        }
        for charge in [token.transfer_fee, token.burn_fee].into_iter().flatten() {
            let limit = if charge.fixed {
                token.total_supply
            } else {
                MAX_TOKEN_CHARGE_PERCENT
            };
            if charge.amount < Decimal::ZERO || charge.amount > limit {
                return Err(IntentError::InvalidRatio(charge.amount.to_string()));
            }
        }
        Ok(())
    }

    fn validate_swap(&self, swap: &SwapIntent) -> Result<(), IntentError> {
        check_amount(&swap.pay)?;
        validate_slippage(swap.slippage)?;
        if swap.path.is_empty() {
            return Err(IntentError::EmptyPath);
        }

        let pay_fees = pay_token_fees(&swap.pay).total();
        if swap.pay.amount < pay_fees {
            return Err(IntentError::BelowFees {
                symbol: swap.pay.symbol().to_string(),
                fees: pay_fees.to_string(),
            });
        }

        let receive_fees = swap.trading_fee
            + service_fee(swap.receive.amount)
            + receive_token_fees(&swap.receive).total();
        if swap.receive.amount < receive_fees {
            return Err(IntentError::BelowFees {
                symbol: swap.receive.symbol().to_string(),
                fees: receive_fees.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for TransactionValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn check_amount(token: &TokenUse) -> Result<(), IntentError> {
    if token.amount <= Decimal::ZERO {
        return Err(IntentError::ZeroAmount(token.symbol().to_string()));
    }
    if let Some(balance) = token.balance {
        if token.amount > balance {
            return Err(IntentError::InsufficientBalance {
                symbol: token.symbol().to_string(),
                balance: balance.to_string(),
            });
        }
    }
    Ok(())
}
