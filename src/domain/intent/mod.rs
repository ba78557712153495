//! Intent domain - what the user asked the exchange to do

use candid::Principal;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::math::{
    compute_fee, min_receive_amount, to_ratio_units, validate_slippage, DEFAULT_LIQUIDITY_SLIPPAGE,
    DEFAULT_SWAP_SLIPPAGE, TOKEN_ISSUANCE_FEE,
};
use crate::shared::errors::IntentError;
use crate::shared::types::{nat_arg, Amount, Token, TokenUse};

/// Pool flavour; decides the create/add method names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Public,
    Private,
    #[serde(alias = "anchored")]
    Stable,
}

impl PoolKind {
    pub fn create_method(&self) -> &'static str {
        match self {
            PoolKind::Public => "createCommonPool",
            PoolKind::Private => "createPrivatePool",
            PoolKind::Stable => "createStablePool",
        }
    }

    pub fn add_liquidity_method(&self) -> &'static str {
        match self {
            PoolKind::Public => "addLiquidity",
            PoolKind::Private => "addPrivateLiquidity",
            PoolKind::Stable => "addStableLiquidity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolTemplate {
    Single,
    #[default]
    Dual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolSide {
    Base,
    Quote,
}

/// An existing pool the user acts on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRef {
    pub canister_id: Principal,
    pub kind: PoolKind,
    #[serde(default)]
    pub single: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapIntent {
    pub pay: TokenUse,
    pub receive: TokenUse,
    /// Slippage tolerance in percent
    #[serde(default = "swap_slippage")]
    pub slippage: Decimal,
    /// Pools the router quoted for this trade
    pub path: Vec<Principal>,
    #[serde(default)]
    pub direction: u64,
    /// Pool trading fee quoted alongside the path, in receive-token units
    #[serde(default)]
    pub trading_fee: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddLiquidityIntent {
    pub pool: PoolRef,
    pub base: TokenUse,
    pub quote: TokenUse,
    #[serde(default = "liquidity_slippage")]
    pub slippage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePoolIntent {
    pub kind: PoolKind,
    #[serde(default)]
    pub template: PoolTemplate,
    pub base: TokenUse,
    pub quote: TokenUse,
    /// Trading fee rate in percent, e.g. `0.3`
    pub fee_rate: Decimal,
    /// Initial price `i`
    pub initial_price: Decimal,
    /// Volatility coefficient `k`
    pub volatility: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveLiquidityIntent {
    pub pool: PoolRef,
    pub base: TokenUse,
    pub quote: TokenUse,
    /// Share of the position being removed, in percent
    pub share: Decimal,
    #[serde(default = "liquidity_slippage")]
    pub slippage: Decimal,
    /// Side withdrawn from a private pool
    #[serde(default)]
    pub side: Option<PoolSide>,
}

/// Transfer or burn charge of a newly issued token
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenCharge {
    /// Token amount when `fixed`, otherwise a percentage of each transfer
    pub amount: Decimal,
    #[serde(default)]
    pub fixed: bool,
}

impl TokenCharge {
    /// Fixed charges in base units of the new token, percentages as router ratios
    fn to_units(self, decimals: u8) -> Result<u128, IntentError> {
        if self.fixed {
            Amount::from_decimal(self.amount, decimals).map(|a| a.value)
        } else {
            to_ratio_units(self.amount / Decimal::ONE_HUNDRED)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTokenIntent {
    /// Falls back to the symbol when absent
    #[serde(default)]
    pub name: Option<String>,
    pub symbol: String,
    /// Logo URL or data URI
    pub logo: String,
    #[serde(default = "token_decimals")]
    pub decimals: u8,
    pub total_supply: Decimal,
    /// Whether the issuer may mint after creation
    #[serde(default)]
    pub mint_on: bool,
    #[serde(default)]
    pub transfer_fee: Option<TokenCharge>,
    #[serde(default)]
    pub burn_fee: Option<TokenCharge>,
    /// Platform token the issuance fee is paid in
    pub platform: Token,
}

impl CreateTokenIntent {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.symbol)
    }

    /// Issuance fee plus the platform token's own transfer and burn charges
    pub fn issuance_allowance(&self) -> Result<Amount, IntentError> {
        let fees = &self.platform.fees;
        let total = TOKEN_ISSUANCE_FEE
            + compute_fee(TOKEN_ISSUANCE_FEE, fees.transfer_fee, fees.is_transfer_fee_fixed)
            + compute_fee(TOKEN_ISSUANCE_FEE, fees.burn_fee, fees.is_burn_fee_fixed);
        Amount::from_decimal(total, self.platform.decimals)
    }
}

/// Move a sub-wallet balance back to the main wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawIntent {
    pub token: TokenUse,
}

/// A normalized user intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum Intent {
    Swap(SwapIntent),
    AddLiquidity(AddLiquidityIntent),
    CreatePool(CreatePoolIntent),
    RemoveLiquidity(RemoveLiquidityIntent),
    CreateToken(CreateTokenIntent),
    Withdraw(WithdrawIntent),
}

/// Which assets have to move before the terminal action
#[derive(Debug, Clone, PartialEq)]
pub enum AssetLegs<'a> {
    Dual {
        base: (&'a TokenUse, Amount),
        quote: (&'a TokenUse, Amount),
    },
    Single((&'a TokenUse, Amount)),
    /// Allowance for a platform fee charged by the router
    ServiceFee((&'a Token, Amount)),
    /// The terminal call moves everything itself
    None,
}

impl Intent {
    pub fn flow_name(&self) -> &'static str {
        match self {
            Intent::Swap(_) => "swap",
            Intent::AddLiquidity(_) => "add liquidity",
            Intent::CreatePool(_) => "create pool",
            Intent::RemoveLiquidity(_) => "remove liquidity",
            Intent::CreateToken(_) => "create token",
            Intent::Withdraw(_) => "withdraw",
        }
    }

    pub fn is_swap(&self) -> bool {
        matches!(self, Intent::Swap(_))
    }

    /// Terminal canister method name
    pub fn method(&self) -> &'static str {
        match self {
            Intent::Swap(_) => "swap",
            Intent::AddLiquidity(i) => i.pool.kind.add_liquidity_method(),
            Intent::CreatePool(i) => i.kind.create_method(),
            Intent::RemoveLiquidity(_) => "removeLiquidity",
            Intent::CreateToken(_) => "createToken",
            Intent::Withdraw(_) => "withdrawal",
        }
    }

    pub fn is_single_asset(&self) -> bool {
        match self {
            Intent::Swap(_) => false,
            Intent::AddLiquidity(i) => i.pool.single,
            Intent::CreatePool(i) => i.template == PoolTemplate::Single,
            Intent::RemoveLiquidity(i) => i.pool.single || i.pool.kind == PoolKind::Private,
            Intent::CreateToken(_) | Intent::Withdraw(_) => false,
        }
    }

    /// Assets and amounts moved by the preparatory steps, base first
    pub fn asset_legs(&self) -> Result<AssetLegs<'_>, IntentError> {
        match self {
            Intent::Swap(i) => Ok(AssetLegs::Dual {
                base: (&i.pay, i.pay.to_amount()?),
                quote: (&i.receive, min_receive_amount(&i.receive, i.slippage)?),
            }),
            Intent::AddLiquidity(AddLiquidityIntent { base, quote, .. })
            | Intent::CreatePool(CreatePoolIntent { base, quote, .. }) => {
                if self.is_single_asset() {
                    Ok(AssetLegs::Single((base, base.to_amount()?)))
                } else {
                    Ok(AssetLegs::Dual {
                        base: (base, base.to_amount()?),
                        quote: (quote, quote.to_amount()?),
                    })
                }
            }
            Intent::RemoveLiquidity(i) => {
                let (base, quote) = i.withdraw_amounts()?;
                if i.pool.kind == PoolKind::Private {
                    return Ok(match i.private_side() {
                        PoolSide::Base => AssetLegs::Single((&i.base, base)),
                        PoolSide::Quote => AssetLegs::Single((&i.quote, quote)),
                    });
                }
                if i.pool.single {
                    Ok(AssetLegs::Single((&i.base, base)))
                } else {
                    Ok(AssetLegs::Dual {
                        base: (&i.base, base),
                        quote: (&i.quote, quote),
                    })
                }
            }
            Intent::CreateToken(i) => Ok(AssetLegs::ServiceFee((&i.platform, i.issuance_allowance()?))),
            Intent::Withdraw(_) => Ok(AssetLegs::None),
        }
    }

    /// Terminal method arguments in canister order
    pub fn terminal_args(&self, deadline: u64) -> Result<Vec<Value>, IntentError> {
        match self {
            Intent::Swap(i) => {
                validate_slippage(i.slippage)?;
                if i.path.is_empty() {
                    return Err(IntentError::EmptyPath);
                }
                let pay_amount = i.pay.to_amount()?;
                let min_receive = min_receive_amount(&i.receive, i.slippage)?;
                Ok(vec![
                    json!(i.pay.token.canister_id),
                    json!(i.receive.token.canister_id),
                    nat_arg(pay_amount),
                    nat_arg(min_receive),
                    json!(i.path),
                    nat_arg(i.direction),
                    nat_arg(deadline),
                ])
            }
            Intent::AddLiquidity(i) => {
                let base_amount = i.base.to_amount()?;
                let quote_amount = if i.pool.single {
                    Amount::zero(i.quote.token.decimals)
                } else {
                    i.quote.to_amount()?
                };
                let mut args = vec![json!(i.pool.canister_id), nat_arg(base_amount), nat_arg(quote_amount)];
                if i.pool.kind != PoolKind::Private {
                    validate_slippage(i.slippage)?;
                    args.push(nat_arg(to_ratio_units(i.slippage)?));
                }
                args.push(nat_arg(deadline));
                Ok(args)
            }
            Intent::CreatePool(i) => {
                let base_amount = i.base.to_amount()?;
                let quote_amount = if i.template == PoolTemplate::Single {
                    Amount::zero(i.quote.token.decimals)
                } else {
                    i.quote.to_amount()?
                };
                Ok(vec![
                    json!(i.base.token.canister_id),
                    json!(i.quote.token.canister_id),
                    nat_arg(base_amount),
                    nat_arg(quote_amount),
                    nat_arg(to_ratio_units(i.fee_rate / Decimal::ONE_HUNDRED)?),
                    nat_arg(to_ratio_units(i.initial_price)?),
                    nat_arg(to_ratio_units(i.volatility)?),
                    nat_arg(deadline),
                ])
            }
            Intent::RemoveLiquidity(i) => {
                validate_slippage(i.slippage)?;
                if i.share <= Decimal::ZERO || i.share > Decimal::ONE_HUNDRED {
                    return Err(IntentError::InvalidRatio(i.share.to_string()));
                }
                let (base, quote) = i.withdraw_amounts()?;
                Ok(vec![
                    nat_arg(to_ratio_units(i.share / Decimal::ONE_HUNDRED)?),
                    json!(i.pool.canister_id),
                    nat_arg(base),
                    nat_arg(quote),
                    nat_arg(to_ratio_units(i.slippage / Decimal::ONE_HUNDRED)?),
                    nat_arg(deadline),
                ])
            }
            Intent::CreateToken(i) => {
                let supply = Amount::from_decimal(i.total_supply, i.decimals)?;
                let charge = |c: Option<TokenCharge>| c.map_or(Ok(0), |c| c.to_units(i.decimals));
                Ok(vec![
                    json!(i.display_name()),
                    json!(i.logo),
                    json!(i.symbol),
                    json!(i.decimals),
                    nat_arg(supply),
                    nat_arg(charge(i.transfer_fee)?),
                    json!(i.mint_on),
                    nat_arg(charge(i.burn_fee)?),
                    json!(i.transfer_fee.is_some_and(|c| c.fixed)),
                    json!(i.burn_fee.is_some_and(|c| c.fixed)),
                ])
            }
            Intent::Withdraw(i) => Ok(vec![json!(i.token.token.canister_id), nat_arg(i.token.to_amount()?)]),
        }
    }
}

impl RemoveLiquidityIntent {
    fn private_side(&self) -> PoolSide {
        self.side.unwrap_or(PoolSide::Base)
    }

    /// Base and quote amounts; the side not being withdrawn is zero
    pub fn withdraw_amounts(&self) -> Result<(Amount, Amount), IntentError> {
        let private = self.pool.kind == PoolKind::Private;
        let base = if private && self.private_side() == PoolSide::Quote {
            Amount::zero(self.base.token.decimals)
        } else {
            self.base.to_amount()?
        };
        let quote = if self.pool.single || (private && self.private_side() == PoolSide::Base) {
            Amount::zero(self.quote.token.decimals)
        } else {
            self.quote.to_amount()?
        };
        Ok((base, quote))
    }
}

fn swap_slippage() -> Decimal {
    DEFAULT_SWAP_SLIPPAGE
}

fn liquidity_slippage() -> Decimal {
    DEFAULT_LIQUIDITY_SLIPPAGE
}

fn token_decimals() -> u8 {
    18
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::{Protocol, Token};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn token_use(canister: &str, symbol: &str, amount: &str) -> TokenUse {
        TokenUse::new(
            Token {
                canister_id: canister.parse().unwrap(),
                symbol: symbol.to_string(),
                decimals: 8,
                protocol: Protocol::Dip20,
                fees: Default::default(),
            },
            dec(amount),
        )
    }

    fn remove_intent(kind: PoolKind, single: bool, side: Option<PoolSide>) -> Intent {
        Intent::RemoveLiquidity(RemoveLiquidityIntent {
            pool: PoolRef {
                canister_id: "2ouva-viaaa-aaaaq-aaamq-cai".parse().unwrap(),
                kind,
                single,
            },
            base: token_use("ryjl3-tyaaa-aaaaa-aaaba-cai", "ICP", "10"),
            quote: token_use("mxzaz-hqaaa-aaaar-qaada-cai", "ckBTC", "2"),
            share: dec("50"),
            slippage: dec("0.1"),
            side,
        })
    }

    #[test]
    fn test_method_names() {
        assert_eq!(PoolKind::Public.create_method(), "createCommonPool");
        assert_eq!(PoolKind::Private.create_method(), "createPrivatePool");
        assert_eq!(PoolKind::Stable.create_method(), "createStablePool");
        assert_eq!(PoolKind::Stable.add_liquidity_method(), "addStableLiquidity");
    }

    #[test]
    fn test_private_remove_zeroes_other_side() {
        let intent = remove_intent(PoolKind::Private, false, Some(PoolSide::Quote));
        let args = intent.terminal_args(7).unwrap();
        assert_eq!(args[0], json!("500000000000000000"));
        assert_eq!(args[2], json!("0"));
        assert_eq!(args[3], json!("200000000"));
        assert_eq!(args[4], json!("1000000000000000"));
        assert_eq!(args[5], json!("7"));
        assert!(intent.is_single_asset());
    }

    #[test]
    fn test_public_remove_is_dual() {
        let intent = remove_intent(PoolKind::Public, false, None);
        assert!(!intent.is_single_asset());
        assert!(matches!(intent.asset_legs().unwrap(), AssetLegs::Dual { .. }));
    }

    #[test]
    fn test_remove_rejects_share_out_of_range() {
        let mut intent = remove_intent(PoolKind::Public, false, None);
        if let Intent::RemoveLiquidity(i) = &mut intent {
            i.share = dec("120");
        }
        assert!(matches!(intent.terminal_args(0), Err(IntentError::InvalidRatio(_))));
    }

    fn create_token(transfer_fee: Option<TokenCharge>, burn_fee: Option<TokenCharge>) -> CreateTokenIntent {
        CreateTokenIntent {
            name: None,
            symbol: "MOON".to_string(),
            logo: "https://example.org/moon.png".to_string(),
            decimals: 8,
            total_supply: dec("1000000"),
            mint_on: false,
            transfer_fee,
            burn_fee,
            platform: token_use("ryjl3-tyaaa-aaaaa-aaaba-cai", "IEXT", "0").token,
        }
    }

    #[test]
    fn test_create_token_charge_encoding() {
        let intent = Intent::CreateToken(create_token(
            Some(TokenCharge { amount: dec("0.5"), fixed: true }),
            Some(TokenCharge { amount: dec("1"), fixed: false }),
        ));
        assert_eq!(intent.method(), "createToken");
        let args = intent.terminal_args(0).unwrap();
        assert_eq!(args.len(), 10);
        // name falls back to the symbol
        assert_eq!(args[0], json!("MOON"));
        assert_eq!(args[3], json!(8));
        assert_eq!(args[4], json!("100000000000000"));
        // fixed fee in base units, percentage burn as a 1e18 ratio
        assert_eq!(args[5], json!("50000000"));
        assert_eq!(args[7], json!("10000000000000000"));
        assert_eq!(args[8], json!(true));
        assert_eq!(args[9], json!(false));
    }

    #[test]
    fn test_create_token_without_charges() {
        let intent = Intent::CreateToken(create_token(None, None));
        let args = intent.terminal_args(0).unwrap();
        assert_eq!(args[5], json!("0"));
        assert_eq!(args[7], json!("0"));
        assert_eq!(args[8], json!(false));
        assert_eq!(args[9], json!(false));
    }

    #[test]
    fn test_issuance_allowance_covers_platform_fees() {
        let mut token = create_token(None, None);
        token.platform.fees.transfer_fee = dec("0.01");
        token.platform.fees.burn_fee = dec("0.001");
        token.platform.fees.is_burn_fee_fixed = false;
        // 10000 + 0.01 fixed + 10000 * 0.001
        let allowance = token.issuance_allowance().unwrap();
        assert_eq!(allowance.to_decimal(), dec("10010.01"));

        match Intent::CreateToken(token.clone()).asset_legs().unwrap() {
            AssetLegs::ServiceFee((platform, amount)) => {
                assert_eq!(platform.symbol, "IEXT");
                assert_eq!(amount, allowance);
            }
            other => panic!("unexpected legs {:?}", other),
        }
    }

    #[test]
    fn test_withdraw_args() {
        let intent = Intent::Withdraw(WithdrawIntent {
            token: token_use("mxzaz-hqaaa-aaaar-qaada-cai", "ckBTC", "0.25"),
        });
        assert_eq!(intent.method(), "withdrawal");
        assert_eq!(intent.asset_legs().unwrap(), AssetLegs::None);
        let args = intent.terminal_args(0).unwrap();
        assert_eq!(args, vec![json!("mxzaz-hqaaa-aaaar-qaada-cai"), json!("25000000")]);
    }

    #[test]
    fn test_intent_from_toml() {
        let raw = r#"
            flow = "add_liquidity"

            [pool]
            canister_id = "2ouva-viaaa-aaaaq-aaamq-cai"
            kind = "private"

            [base]
            canister_id = "ryjl3-tyaaa-aaaaa-aaaba-cai"
            symbol = "ICP"
            decimals = 8
            protocol = "DIP20"
            amount = "1.5"

            [quote]
            canister_id = "mxzaz-hqaaa-aaaar-qaada-cai"
            symbol = "ckBTC"
            decimals = 8
            protocol = "ICRC-1"
            amount = "0.01"
        "#;
        let intent: Intent = toml::from_str(raw).unwrap();
        assert_eq!(intent.method(), "addPrivateLiquidity");
        match &intent {
            Intent::AddLiquidity(i) => assert_eq!(i.slippage, dec("0.1")),
            other => panic!("unexpected intent {:?}", other),
        }
        // private pools take no slippage argument
        assert_eq!(intent.terminal_args(1).unwrap().len(), 4);
    }
}
