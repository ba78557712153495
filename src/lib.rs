//! ICPL orchestrator - client-side transaction orchestration for a canister DEX
//! Built with Domain-Driven Design principles

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod math;
pub mod shared;

// Re-export main types for convenience
pub use application::{AppState, FlowController, TransactionOrchestrator};
pub use domain::execution::{BatchReport, TransactionBatch, TransactionBuilder};
pub use domain::intent::Intent;
pub use infrastructure::signer::WalletSigner;
