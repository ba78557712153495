//! Common types used across the application

use std::fmt;

use candid::{Nat, Principal};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::errors::IntentError;

/// Parse a textual principal such as `ryjl3-tyaaa-aaaaa-aaaba-cai`, checksum included
pub fn parse_principal(text: &str) -> Result<Principal, IntentError> {
    Principal::from_text(text.trim())
        .map_err(|e| IntentError::InvalidCanisterId(format!("{}: {}", text, e)))
}

/// Candid `nat` arguments travel to the signer as decimal strings
pub fn nat_arg(value: impl Into<Nat>) -> Value {
    Value::String(value.into().0.to_str_radix(10))
}

/// Token standard, decides how the token is moved before a terminal action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "DIP20", alias = "dip20")]
    Dip20,
    #[serde(rename = "ICRC-1", alias = "icrc1", alias = "ICRC1")]
    Icrc1,
}

/// Per-token fee schedule; a proportional fee is a fraction of the amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenFees {
    #[serde(default)]
    pub transfer_fee: Decimal,
    #[serde(default = "default_fixed")]
    pub is_transfer_fee_fixed: bool,
    #[serde(default)]
    pub burn_fee: Decimal,
    #[serde(default = "default_fixed")]
    pub is_burn_fee_fixed: bool,
}

fn default_fixed() -> bool {
    true
}

impl Default for TokenFees {
    fn default() -> Self {
        Self {
            transfer_fee: Decimal::ZERO,
            is_transfer_fee_fixed: true,
            burn_fee: Decimal::ZERO,
            is_burn_fee_fixed: true,
        }
    }
}

/// Token representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub canister_id: Principal,
    pub symbol: String,
    pub decimals: u8,
    pub protocol: Protocol,
    #[serde(default)]
    pub fees: TokenFees,
}

/// A token together with what the user wants to do with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUse {
    #[serde(flatten)]
    pub token: Token,
    /// Human-readable amount the user entered
    pub amount: Decimal,
    #[serde(default)]
    pub balance: Option<Decimal>,
}

impl TokenUse {
    pub fn new(token: Token, amount: Decimal) -> Self {
        Self { token, amount, balance: None }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn symbol(&self) -> &str {
        &self.token.symbol
    }

    pub fn to_amount(&self) -> Result<Amount, IntentError> {
        Amount::from_decimal(self.amount, self.token.decimals)
    }
}

/// Largest scale a `Decimal` can carry
const MAX_DECIMALS: u8 = 28;

/// Amount in base units (`nat`) with its precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount {
    pub value: u128,
    pub decimals: u8,
}

impl Amount {
    pub fn zero(decimals: u8) -> Self {
        Self { value: 0, decimals }
    }

    /// Scale a human amount into base units, truncating extra precision
    pub fn from_decimal(amount: Decimal, decimals: u8) -> Result<Self, IntentError> {
        if amount.is_sign_negative() {
            return Err(IntentError::NegativeAmount(amount.to_string()));
        }
        if decimals > MAX_DECIMALS {
            return Err(IntentError::AmountOverflow(amount.to_string(), decimals));
        }
        let scale = Decimal::from_i128_with_scale(10i128.pow(decimals as u32), 0);
        let value = amount
            .checked_mul(scale)
            .map(|v| v.trunc())
            .and_then(|v| v.to_u128())
            .ok_or_else(|| IntentError::AmountOverflow(amount.to_string(), decimals))?;
        Ok(Self { value, decimals })
    }

    pub fn to_decimal(&self) -> Decimal {
        // values past Decimal's 96-bit mantissa do not occur for real token supplies
        let mantissa = i128::try_from(self.value).unwrap_or(i128::MAX);
        Decimal::try_from_i128_with_scale(mantissa, self.decimals as u32)
            .unwrap_or(Decimal::MAX)
            .normalize()
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }
}

impl From<Amount> for Nat {
    fn from(amount: Amount) -> Self {
        Nat::from(amount.value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

/// Drop digits past `dp` decimal places without rounding
pub fn truncate_decimal(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero).normalize()
}
