//! In-memory swap status source for `--simulate` runs and tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use super::{SwapStatus, SwapStatusLookup};
use crate::domain::execution::OrderId;
use crate::shared::errors::ExecutionError;

/// Returns queued statuses in order, then `fallback` forever
pub struct ScriptedStatusLookup {
    statuses: Mutex<VecDeque<SwapStatus>>,
    fallback: SwapStatus,
    calls: AtomicU32,
}

impl ScriptedStatusLookup {
    pub fn new(statuses: Vec<SwapStatus>, fallback: SwapStatus) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            fallback,
            calls: AtomicU32::new(0),
        }
    }

    /// `pending` polls answered with Pending before the order settles as Succeeded
    pub fn settling_after(pending: usize) -> Self {
        let mut statuses = vec![SwapStatus::Pending; pending];
        statuses.push(SwapStatus::Succeeded);
        Self::new(statuses, SwapStatus::Succeeded)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwapStatusLookup for ScriptedStatusLookup {
    async fn swap_status(&self, _order: OrderId) -> Result<SwapStatus, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.statuses.lock().await.pop_front().unwrap_or(self.fallback))
    }
}
