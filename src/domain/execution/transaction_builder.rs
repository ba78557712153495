//! Transaction building and construction

use candid::Principal;
use serde_json::json;
use tracing::debug;

use super::{FailureHook, StepKind, SuccessHook, TransactionBatch, TransactionStep};
use crate::domain::intent::{AssetLegs, Intent};
use crate::shared::errors::IntentError;
use crate::shared::types::{nat_arg, Amount, Protocol, Token};
use crate::shared::utils::generate_id;

/// Everything a batch needs besides the intent itself
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Router canister that receives transfers and executes terminal methods
    pub router: Principal,
    /// User's sub-account at the router, required for ICRC-1 transfers
    pub transfer_account: Option<String>,
    /// Deadline in nanoseconds since the epoch
    pub deadline: u64,
}

/// Builds ordered transaction batches from intents
pub struct TransactionBuilder {
    context: BuildContext,
}

impl TransactionBuilder {
    pub fn new(context: BuildContext) -> Self {
        Self { context }
    }

    /// Preparatory steps first (base before quote), then the terminal step
    pub fn build_steps(&self, intent: &Intent) -> Result<TransactionBatch, IntentError> {
        let mut steps = Vec::with_capacity(3);

        match intent.asset_legs()? {
            AssetLegs::Dual { base, quote } => {
                steps.push(self.preparatory_step(intent, &base.0.token, base.1, true)?);
                steps.push(self.preparatory_step(intent, &quote.0.token, quote.1, false)?);
            }
            AssetLegs::Single((token, amount)) => {
                steps.push(self.preparatory_step(intent, &token.token, amount, true)?);
            }
            AssetLegs::ServiceFee((token, amount)) => {
                steps.push(self.approve_step(token, amount, &self.context.router));
            }
            AssetLegs::None => {}
        }

        steps.push(TransactionStep {
            target: self.context.router,
            method: intent.method().to_string(),
            args: intent.terminal_args(self.context.deadline)?,
            kind: StepKind::Terminal,
            label: terminal_label(intent),
            on_success: if intent.is_swap() {
                SuccessHook::AwaitSwapStatus
            } else {
                SuccessHook::Finish
            },
            on_fail: FailureHook::Abort,
        });

        let batch = TransactionBatch::new(generate_id(), intent.flow_name().to_string(), steps);
        debug!(
            "Built {} batch {} with {} steps",
            batch.flow,
            batch.id,
            batch.len()
        );
        Ok(batch)
    }

    fn preparatory_step(
        &self,
        intent: &Intent,
        token: &Token,
        amount: Amount,
        is_base: bool,
    ) -> Result<TransactionStep, IntentError> {
        match intent {
            // the receive side of a swap and both sides of a removal are authorised, not moved
            // an ICRC-2 receive ledger bills the approve fee to the user, who may hold none
            Intent::Swap(_) if !is_base => Ok(self.approve_step(token, amount, &self.context.router)),
            Intent::RemoveLiquidity(i) => Ok(self.approve_step(token, amount, &i.pool.canister_id)),
            _ => self.fund_step(token, amount),
        }
    }

    /// Move tokens to the router: DIP20 allowance, ICRC-1 transfer into the sub-account
    fn fund_step(&self, token: &Token, amount: Amount) -> Result<TransactionStep, IntentError> {
        let protocol = token.protocol;
        let (method, args) = match protocol {
            Protocol::Dip20 => ("approve", vec![json!(self.context.router), nat_arg(amount)]),
            Protocol::Icrc1 => {
                let subaccount = self
                    .context
                    .transfer_account
                    .clone()
                    .ok_or_else(|| IntentError::MissingTransferAccount(token.symbol.clone()))?;
                (
                    "icrc1_transfer",
                    vec![json!({
                        "to": { "owner": self.context.router, "subaccount": subaccount },
                        "amount": nat_arg(amount),
                        "fee": null,
                        "memo": null,
                        "from_subaccount": null,
                        "created_at_time": null,
                    })],
                )
            }
        };
        let kind = match protocol {
            Protocol::Dip20 => StepKind::Approve {
                symbol: token.symbol.clone(),
                protocol,
            },
            Protocol::Icrc1 => StepKind::Transfer {
                symbol: token.symbol.clone(),
                protocol,
            },
        };
        Ok(TransactionStep {
            target: token.canister_id,
            method: method.to_string(),
            args,
            kind,
            label: format!("Approving {}", token.symbol),
            on_success: SuccessHook::Advance,
            on_fail: FailureHook::Abort,
        })
    }

    fn approve_step(&self, token: &Token, amount: Amount, spender: &Principal) -> TransactionStep {
        let protocol = token.protocol;
        let (method, args) = match protocol {
            Protocol::Dip20 => ("approve", vec![json!(spender), nat_arg(amount)]),
            Protocol::Icrc1 => (
                "icrc2_approve",
                vec![json!({
                    "spender": { "owner": spender, "subaccount": null },
                    "amount": nat_arg(amount),
                    "expected_allowance": null,
                    "expires_at": nat_arg(self.context.deadline),
                    "fee": null,
                    "memo": null,
                    "from_subaccount": null,
                    "created_at_time": null,
                })],
            ),
        };
        TransactionStep {
            target: token.canister_id,
            method: method.to_string(),
            args,
            kind: StepKind::Approve {
                symbol: token.symbol.clone(),
                protocol,
            },
            label: format!("Approving {}", token.symbol),
            on_success: SuccessHook::Advance,
            on_fail: FailureHook::Abort,
        }
    }
}

fn terminal_label(intent: &Intent) -> String {
    match intent {
        Intent::Swap(i) => format!("Swap {} to {}", i.pay.symbol(), i.receive.symbol()),
        Intent::AddLiquidity(i) => {
            format!("Adding liquidity {} + {}", i.base.symbol(), i.quote.symbol())
        }
        Intent::CreatePool(i) => format!("Creating pool {} + {}", i.base.symbol(), i.quote.symbol()),
        Intent::RemoveLiquidity(i) => {
            let text = "Removing Liquidity Position of";
            match intent.asset_legs() {
                Ok(AssetLegs::Single((token, _))) => format!("{} {}", text, token.symbol()),
                _ => format!("{} {} and {}", text, i.base.symbol(), i.quote.symbol()),
            }
        }
        Intent::CreateToken(i) => format!("Creating token {}", i.symbol),
        Intent::Withdraw(i) => format!("Withdrawing {}", i.token.symbol()),
    }
}
