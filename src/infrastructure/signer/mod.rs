//! Wallet signer boundary

pub mod http_signer;
pub mod scripted;

pub use http_signer::HttpSigner;
pub use scripted::{ScriptedSigner, ScriptedStep};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::execution::{OrderId, TransactionBatch};
use crate::shared::errors::SignerError;

/// Decoded reply of a successful step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StepReply {
    Empty,
    /// Order handle returned by the terminal swap step
    Order(OrderId),
    Value(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Succeeded(StepReply),
    Failed(SignerError),
}

/// Raised by the signer as each step's on-chain call resolves
#[derive(Debug, Clone, PartialEq)]
pub struct StepEvent {
    pub index: usize,
    pub outcome: StepOutcome,
}

impl StepEvent {
    pub fn succeeded(index: usize, reply: StepReply) -> Self {
        Self {
            index,
            outcome: StepOutcome::Succeeded(reply),
        }
    }

    pub fn failed(index: usize, error: SignerError) -> Self {
        Self {
            index,
            outcome: StepOutcome::Failed(error),
        }
    }
}

/// External wallet that signs and executes a batch in step order.
///
/// Implementations report every resolved step on `events` and must not start
/// step `i + 1` before step `i` succeeded. A step failure aborts the rest of
/// the batch. `Err` means the batch as a whole was refused.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn name(&self) -> &str;

    async fn submit_batch(
        &self,
        batch: &TransactionBatch,
        events: mpsc::UnboundedSender<StepEvent>,
    ) -> Result<(), SignerError>;
}
