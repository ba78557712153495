//! Router canister queries

pub mod http_status;
pub mod scripted;

pub use http_status::HttpStatusLookup;
pub use scripted::ScriptedStatusLookup;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::execution::OrderId;
use crate::shared::errors::ExecutionError;

/// Settlement state of a swap order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Pending,
    Succeeded,
    Failed,
}

impl SwapStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SwapStatus::Pending)
    }
}

/// Status lookup for orders returned by the router's `swap` method
#[async_trait]
pub trait SwapStatusLookup: Send + Sync {
    async fn swap_status(&self, order: OrderId) -> Result<SwapStatus, ExecutionError>;
}
