//! In-memory signer driven by a script.
//! Backs `--simulate` runs and the orchestrator tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use super::{StepEvent, StepReply, WalletSigner};
use crate::domain::execution::{OrderId, SuccessHook, TransactionBatch};
use crate::shared::errors::SignerError;

/// Scripted result for one step index
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedStep {
    Succeed(StepReply),
    Fail(SignerError),
}

/// Executes steps in order, honouring the failure-aborts-batch rule
pub struct ScriptedSigner {
    script: HashMap<usize, ScriptedStep>,
    reject: Option<SignerError>,
    order: OrderId,
    step_delay: Duration,
    invoked: Mutex<Vec<(usize, String)>>,
}

impl ScriptedSigner {
    /// Every step succeeds; the terminal swap step returns `order`
    pub fn succeeding(order: OrderId) -> Self {
        Self {
            script: HashMap::new(),
            reject: None,
            order,
            step_delay: Duration::ZERO,
            invoked: Mutex::new(Vec::new()),
        }
    }

    /// The whole batch is refused before any step runs
    pub fn rejecting(error: SignerError) -> Self {
        Self {
            reject: Some(error),
            ..Self::succeeding(0)
        }
    }

    pub fn with_step(mut self, index: usize, step: ScriptedStep) -> Self {
        self.script.insert(index, step);
        self
    }

    pub fn failing_at(self, index: usize, error: SignerError) -> Self {
        self.with_step(index, ScriptedStep::Fail(error))
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// `(index, method)` of every step that was executed
    pub async fn invoked(&self) -> Vec<(usize, String)> {
        self.invoked.lock().await.clone()
    }
}

#[async_trait]
impl WalletSigner for ScriptedSigner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit_batch(
        &self,
        batch: &TransactionBatch,
        events: mpsc::UnboundedSender<StepEvent>,
    ) -> Result<(), SignerError> {
        if let Some(error) = &self.reject {
            return Err(error.clone());
        }

        for (index, step) in batch.steps().iter().enumerate() {
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            self.invoked.lock().await.push((index, step.method.clone()));

            let scripted = self.script.get(&index).cloned().unwrap_or_else(|| {
                if step.on_success == SuccessHook::AwaitSwapStatus {
                    ScriptedStep::Succeed(StepReply::Order(self.order))
                } else {
                    ScriptedStep::Succeed(StepReply::Empty)
                }
            });
            debug!("Scripted signer: step {} {} -> {:?}", index, step.method, scripted);

            let (event, abort) = match scripted {
                ScriptedStep::Succeed(reply) => (StepEvent::succeeded(index, reply), false),
                ScriptedStep::Fail(error) => (StepEvent::failed(index, error), true),
            };
            if events.send(event).is_err() || abort {
                break;
            }
        }
        Ok(())
    }
}
