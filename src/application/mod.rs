//! Application layer - use cases and services

pub mod commands;
pub mod flows;
pub mod orchestrator;
pub mod polling;
pub mod state;

pub use commands::{CommandExecutor, Commands};
pub use flows::{FlowController, FlowRequest, FlowSettings, ModalState};
pub use orchestrator::TransactionOrchestrator;
pub use polling::{CancelToken, PollPolicy};
pub use state::{AppState, Session};
