//! Outcome notifications shown while and after a batch runs

use serde::Serialize;

use crate::domain::execution::BatchFailure;
use crate::domain::intent::{Intent, PoolTemplate};
use crate::shared::types::Protocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Loading,
    Success,
    Error,
}

/// Where the notification's action link leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpAction {
    ViewProgress,
    ViewTransactions,
    ViewMainWallet,
    ViewSubWallet,
}

impl FollowUpAction {
    pub fn text(&self) -> &'static str {
        match self {
            FollowUpAction::ViewProgress => "View progress",
            FollowUpAction::ViewTransactions => "View in transactions",
            FollowUpAction::ViewMainWallet => "View in main-wallet",
            FollowUpAction::ViewSubWallet => "View in sub-wallet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeNotification {
    pub batch_id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub description: Option<String>,
    pub action: Option<FollowUpAction>,
}

impl OutcomeNotification {
    pub fn is_terminal(&self) -> bool {
        self.kind != NotificationKind::Loading
    }
}

/// Messages for one flow, resolved against the batch outcome
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    batch_id: String,
    loading: String,
    success: String,
    error: String,
    success_action: FollowUpAction,
    refund: RefundPolicy,
}

/// Where failed swap funds end up
#[derive(Debug, Clone, Copy, PartialEq)]
enum RefundPolicy {
    None,
    Swap { pay_protocol: Protocol },
}

const MAIN_WALLET_REFUND: &str = "The tokens will be refunded to your main-wallet.";
const SUB_WALLET_REFUND: &str = "The tokens will be refunded to your sub-wallet.";
const SLIPPAGE_REFUND: &str =
    "Price deviation exceeds slippage tolerance. The tokens will be refunded to your main-wallet.";

impl NotificationTemplate {
    pub fn for_intent(batch_id: impl Into<String>, intent: &Intent) -> Self {
        let batch_id = batch_id.into();
        match intent {
            Intent::Swap(i) => {
                let base = format!(
                    "{} {} for {} {}",
                    i.pay.amount,
                    i.pay.symbol(),
                    i.receive.amount,
                    i.receive.symbol()
                );
                Self {
                    batch_id,
                    loading: format!("Swap {}", base),
                    success: format!("Swapped {}", base),
                    error: format!("Swap {} failed", base),
                    success_action: FollowUpAction::ViewTransactions,
                    refund: RefundPolicy::Swap {
                        pay_protocol: i.pay.token.protocol,
                    },
                }
            }
            Intent::AddLiquidity(i) => {
                let quote = if i.pool.single {
                    i.quote.symbol().to_string()
                } else {
                    format!("{} {}", i.quote.amount, i.quote.symbol())
                };
                let base = format!("{} {} + {}", i.base.amount, i.base.symbol(), quote);
                Self::plain(batch_id, format!("Add LP {}", base), format!("Add LP {}", base))
            }
            Intent::CreatePool(i) => {
                let quote = if i.template == PoolTemplate::Single {
                    i.quote.symbol().to_string()
                } else {
                    format!("{} {}", i.quote.amount, i.quote.symbol())
                };
                let base = format!("{} {} + {}", i.base.amount, i.base.symbol(), quote);
                Self::plain(batch_id, format!("Add LP {}", base), format!("Add LP {}", base))
            }
            Intent::RemoveLiquidity(i) => {
                let base = format!("LP of {} + {}", i.base.symbol(), i.quote.symbol());
                Self::plain(batch_id, format!("Remove {}", base), format!("Removed {}", base))
            }
            Intent::CreateToken(_) => Self {
                error: "Token creation failed".to_string(),
                ..Self::plain(
                    batch_id,
                    "Token Creating...".to_string(),
                    "Token created successful".to_string(),
                )
            },
            Intent::Withdraw(i) => {
                let base = format!("{} token", i.token.symbol());
                Self {
                    success_action: FollowUpAction::ViewMainWallet,
                    ..Self::plain(batch_id, format!("Withdraw {}", base), format!("Withdrawed {}", base))
                }
            }
        }
    }

    fn plain(batch_id: String, loading: String, success: String) -> Self {
        let error = format!("{} failed", loading);
        Self {
            batch_id,
            loading,
            success,
            error,
            success_action: FollowUpAction::ViewTransactions,
            refund: RefundPolicy::None,
        }
    }

    pub fn loading(&self) -> OutcomeNotification {
        self.build(NotificationKind::Loading, &self.loading, None, Some(FollowUpAction::ViewProgress))
    }

    pub fn success(&self) -> OutcomeNotification {
        self.build(
            NotificationKind::Success,
            &self.success,
            None,
            Some(self.success_action),
        )
    }

    pub fn error(&self, failure: &BatchFailure) -> OutcomeNotification {
        match self.refund {
            RefundPolicy::None => self.build(NotificationKind::Error, &self.error, None, None),
            RefundPolicy::Swap { pay_protocol } => {
                let (description, action) = if failure.is_slippage() {
                    (SLIPPAGE_REFUND, FollowUpAction::ViewMainWallet)
                } else if pay_protocol == Protocol::Icrc1 && !failure.is_rejection() {
                    (SUB_WALLET_REFUND, FollowUpAction::ViewSubWallet)
                } else {
                    (MAIN_WALLET_REFUND, FollowUpAction::ViewMainWallet)
                };
                self.build(
                    NotificationKind::Error,
                    &self.error,
                    Some(description.to_string()),
                    Some(action),
                )
            }
        }
    }

    fn build(
        &self,
        kind: NotificationKind,
        message: &str,
        description: Option<String>,
        action: Option<FollowUpAction>,
    ) -> OutcomeNotification {
        OutcomeNotification {
            batch_id: self.batch_id.clone(),
            kind,
            message: message.to_string(),
            description,
            action,
        }
    }
}
