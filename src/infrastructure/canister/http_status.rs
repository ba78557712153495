//! Swap status lookup over HTTP

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{SwapStatus, SwapStatusLookup};
use crate::domain::execution::OrderId;
use crate::shared::errors::{AppError, ExecutionError};

#[derive(Debug, Serialize)]
struct StatusRequest {
    order: OrderId,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: SwapStatus,
}

pub struct HttpStatusLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStatusLookup {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SwapStatusLookup for HttpStatusLookup {
    async fn swap_status(&self, order: OrderId) -> Result<SwapStatus, ExecutionError> {
        let response: StatusResponse = self
            .client
            .post(format!("{}/swap-status", self.endpoint))
            .json(&StatusRequest { order })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ExecutionError::StatusLookup(e.to_string()))?
            .json()
            .await
            .map_err(|e| ExecutionError::StatusLookup(format!("Invalid status response: {}", e)))?;

        debug!("Order {} status: {:?}", order, response.status);
        Ok(response.status)
    }
}
