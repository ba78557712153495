//! Execution domain - transaction batches and their lifecycle

mod transaction_builder;
mod transaction_validator;

pub use transaction_builder::{BuildContext, TransactionBuilder};
pub use transaction_validator::TransactionValidator;

use candid::Principal;
use serde::Serialize;
use serde_json::Value;

use crate::shared::errors::{ExecutionError, SignerError};
use crate::shared::types::Protocol;

/// Swap order handle returned by the router's `swap` method
pub type OrderId = u64;

/// What a step does on chain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Move tokens into the router's sub-account
    Transfer { symbol: String, protocol: Protocol },
    /// Allow a canister to move tokens
    Approve { symbol: String, protocol: Protocol },
    /// The user's actual action
    Terminal,
}

/// Reaction to a step's success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessHook {
    /// Preparatory step done, move to the next one
    Advance,
    /// Terminal step done, batch succeeded
    Finish,
    /// Terminal swap step done, resolve the order via status polling
    AwaitSwapStatus,
}

/// Reaction to a step's failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureHook {
    Abort,
}

/// One call handed to the wallet signer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionStep {
    pub target: Principal,
    pub method: String,
    pub args: Vec<Value>,
    pub kind: StepKind,
    pub label: String,
    pub on_success: SuccessHook,
    pub on_fail: FailureHook,
}

impl TransactionStep {
    pub fn is_terminal(&self) -> bool {
        self.kind == StepKind::Terminal
    }
}

/// Ordered steps submitted to the signer as one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionBatch {
    pub id: String,
    pub flow: String,
    steps: Vec<TransactionStep>,
}

impl TransactionBatch {
    pub(crate) fn new(id: String, flow: String, steps: Vec<TransactionStep>) -> Self {
        Self { id, flow, steps }
    }

    pub fn steps(&self) -> &[TransactionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn terminal(&self) -> Option<&TransactionStep> {
        self.steps.last().filter(|s| s.is_terminal())
    }

    pub fn labels(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.label.clone()).collect()
    }
}

/// Number of steps that reported success; drives progress indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressState {
    completed: usize,
    total: usize,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self { completed: 0, total }
    }

    /// Returns false once every step is already counted
    pub fn advance(&mut self) -> bool {
        if self.completed >= self.total {
            return false;
        }
        self.completed += 1;
        true
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Why a batch ended in failure
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    /// Index of the failing step, `None` when the signer rejected the batch as a whole
    pub step: Option<usize>,
    pub error: ExecutionError,
}

impl BatchFailure {
    pub fn is_rejection(&self) -> bool {
        matches!(&self.error, ExecutionError::Signer(e) if e.is_rejection())
    }

    pub fn is_slippage(&self) -> bool {
        matches!(self.error, ExecutionError::Signer(SignerError::SlippageExceeded(_)))
    }
}

/// Per-batch state machine
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BatchState {
    #[default]
    Idle,
    Building,
    AwaitingSigner,
    StepExecuting(usize),
    Polling { order: OrderId, attempt: u32 },
    Succeeded,
    Failed(BatchFailure),
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Succeeded | BatchState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            BatchState::Idle => "idle",
            BatchState::Building => "building",
            BatchState::AwaitingSigner => "awaiting-signer",
            BatchState::StepExecuting(_) => "step-executing",
            BatchState::Polling { .. } => "polling",
            BatchState::Succeeded => "succeeded",
            BatchState::Failed(_) => "failed",
        }
    }
}

/// Published to observers on every transition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchSnapshot {
    pub batch_id: Option<String>,
    pub state: BatchState,
    pub progress: ProgressState,
}

/// Final result of one batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub batch_id: String,
    pub progress: ProgressState,
    pub state: BatchState,
    /// Swap order returned by the terminal step
    pub order: Option<OrderId>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.state == BatchState::Succeeded
    }

    pub fn failure(&self) -> Option<&BatchFailure> {
        match &self.state {
            BatchState::Failed(f) => Some(f),
            _ => None,
        }
    }
}
