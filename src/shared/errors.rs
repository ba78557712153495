//! Error handling for the application

use thiserror::Error;

/// Errors reported by the wallet signer for a whole batch or a single step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignerError {
    #[error("User rejected the request")]
    UserRejected,

    #[error("Price deviation exceeds slippage tolerance: {0}")]
    SlippageExceeded(String),

    #[error("Signer error: {0}")]
    Other(String),
}

impl SignerError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, SignerError::UserRejected)
    }
}

/// Intent validation and amount conversion errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntentError {
    #[error("Invalid canister id: {0}")]
    InvalidCanisterId(String),

    #[error("Negative amount: {0}")]
    NegativeAmount(String),

    #[error("Amount {0} does not fit into base units with {1} decimals")]
    AmountOverflow(String, u8),

    #[error("Amount of {0} is zero")]
    ZeroAmount(String),

    #[error("Amount of {symbol} exceeds balance {balance}")]
    InsufficientBalance { symbol: String, balance: String },

    #[error("Amount of {symbol} does not cover fees of {fees}")]
    BelowFees { symbol: String, fees: String },

    #[error("Invalid slippage: {0}")]
    InvalidSlippage(String),

    #[error("Invalid ratio: {0}")]
    InvalidRatio(String),

    #[error("Swap path is empty")]
    EmptyPath,

    #[error("Transfer account is required to move {0}")]
    MissingTransferAccount(String),

    #[error("Invalid token parameters: {0}")]
    InvalidToken(String),

    #[error("Invalid deadline: {0}")]
    InvalidDeadline(String),
}

/// Execution-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Signer rejected batch: {0}")]
    Signer(#[from] SignerError),

    #[error("Invalid intent: {0}")]
    Intent(#[from] IntentError),

    #[error("Status lookup failed: {0}")]
    StatusLookup(String),

    #[error("Swap order {0} failed")]
    SwapFailed(u64),

    #[error("Swap status still pending after {0} polls")]
    PollExhausted(u32),

    #[error("Status polling cancelled")]
    Cancelled,

    #[error("Batch finished with {resolved} of {total} steps resolved")]
    IncompleteBatch { resolved: usize, total: usize },

    #[error("Terminal swap step returned no order id")]
    MissingOrder,
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid intent: {0}")]
    Intent(#[from] IntentError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Transfer account is not set")]
    MissingTransferAccount,

    #[error("A {0} is already in progress")]
    Busy(String),

    #[error("Cannot load intent: {0}")]
    IntentFile(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<SignerError> for AppError {
    fn from(err: SignerError) -> Self {
        AppError::Execution(ExecutionError::Signer(err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}
