//! Wallet signer reached over an HTTP bridge

use async_trait::async_trait;
use candid::Principal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{StepEvent, StepReply, WalletSigner};
use crate::domain::execution::TransactionBatch;
use crate::shared::errors::SignerError;

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    batch_id: &'a str,
    steps: Vec<WireStep<'a>>,
}

#[derive(Debug, Serialize)]
struct WireStep<'a> {
    target: &'a Principal,
    method: &'a str,
    args: &'a [Value],
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<WireResult>,
    #[serde(default)]
    error: Option<WireError>,
}

/// Structured error reported by the bridge
#[derive(Debug, Deserialize)]
struct WireError {
    code: String,
    #[serde(default)]
    detail: Option<String>,
}

impl From<WireError> for SignerError {
    fn from(err: WireError) -> Self {
        let detail = err.detail.unwrap_or_default();
        match err.code.as_str() {
            "user_rejected" => SignerError::UserRejected,
            "slippage_exceeded" => SignerError::SlippageExceeded(detail),
            _ if detail.is_empty() => SignerError::Other(err.code),
            _ => SignerError::Other(format!("{}: {}", err.code, detail)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResult {
    index: usize,
    #[serde(flatten)]
    status: WireStatus,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum WireStatus {
    Ok {
        #[serde(default)]
        reply: Option<Value>,
    },
    Err {
        error: WireError,
    },
}

/// Forwards batches to a signer bridge that fronts the wallet extension
pub struct HttpSigner {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSigner {
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, SignerError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SignerError::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl WalletSigner for HttpSigner {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit_batch(
        &self,
        batch: &TransactionBatch,
        events: mpsc::UnboundedSender<StepEvent>,
    ) -> Result<(), SignerError> {
        let request = BatchRequest {
            batch_id: &batch.id,
            steps: batch
                .steps()
                .iter()
                .map(|s| WireStep {
                    target: &s.target,
                    method: &s.method,
                    args: &s.args,
                })
                .collect(),
        };

        info!("Submitting batch {} to signer bridge {}", batch.id, self.endpoint);
        let response: BatchResponse = self
            .client
            .post(format!("{}/batch", self.endpoint))
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SignerError::Other(format!("Signer bridge request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| SignerError::Other(format!("Invalid signer bridge response: {}", e)))?;

        for result in response.results {
            let event = match result.status {
                WireStatus::Ok { reply } => StepEvent::succeeded(result.index, decode_reply(reply)),
                WireStatus::Err { error } => StepEvent::failed(result.index, error.into()),
            };
            debug!("Signer bridge reported {:?}", event);
            if events.send(event).is_err() {
                warn!("Batch {} observer dropped before all step results were delivered", batch.id);
                break;
            }
        }

        match response.error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

/// `{"order": n}` is a swap order handle, anything else is passed through
fn decode_reply(reply: Option<Value>) -> StepReply {
    match reply {
        None | Some(Value::Null) => StepReply::Empty,
        Some(value) => match value.get("order").and_then(Value::as_u64) {
            Some(order) => StepReply::Order(order),
            None => StepReply::Value(value),
        },
    }
}
