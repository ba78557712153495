//! Transaction orchestrator - turns intents into signed batches and tracks them to completion

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::polling::{CancelToken, PollPolicy};
use crate::domain::execution::{
    BatchFailure, BatchReport, BatchSnapshot, BatchState, BuildContext, OrderId, ProgressState,
    SuccessHook, TransactionBatch, TransactionBuilder, TransactionValidator,
};
use crate::domain::intent::Intent;
use crate::infrastructure::canister::{SwapStatus, SwapStatusLookup};
use crate::infrastructure::signer::{StepEvent, StepOutcome, StepReply, WalletSigner};
use crate::shared::errors::{ExecutionError, IntentError};

/// Drives one batch at a time through the signer and, for swaps, the status poll
pub struct TransactionOrchestrator {
    signer: Arc<dyn WalletSigner>,
    status: Arc<dyn SwapStatusLookup>,
    policy: PollPolicy,
    validator: TransactionValidator,
    snapshot: watch::Sender<BatchSnapshot>,
}

impl TransactionOrchestrator {
    pub fn new(
        signer: Arc<dyn WalletSigner>,
        status: Arc<dyn SwapStatusLookup>,
        policy: PollPolicy,
    ) -> Self {
        let (snapshot, _) = watch::channel(BatchSnapshot::default());
        Self {
            signer,
            status,
            policy,
            validator: TransactionValidator::new(),
            snapshot,
        }
    }

    /// Observe state and progress of the current batch
    pub fn subscribe(&self) -> watch::Receiver<BatchSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Validate the intent and lay out its steps; resets progress to zero
    pub fn build_steps(
        &self,
        intent: &Intent,
        context: BuildContext,
    ) -> Result<TransactionBatch, IntentError> {
        self.snapshot.send_replace(BatchSnapshot {
            batch_id: None,
            state: BatchState::Building,
            progress: ProgressState::default(),
        });

        let built = self
            .validator
            .validate(intent)
            .and_then(|_| TransactionBuilder::new(context).build_steps(intent));

        match built {
            Ok(batch) => {
                self.snapshot.send_replace(BatchSnapshot {
                    batch_id: Some(batch.id.clone()),
                    state: BatchState::Building,
                    progress: ProgressState::new(batch.len()),
                });
                Ok(batch)
            }
            Err(e) => {
                warn!("Rejected {} intent: {}", intent.flow_name(), e);
                self.set_state(BatchState::Failed(BatchFailure {
                    step: None,
                    error: ExecutionError::Intent(e.clone()),
                }));
                Err(e)
            }
        }
    }

    /// Hand the batch to the signer and follow its step events.
    ///
    /// Returns the order handle when the terminal step was a swap.
    pub async fn submit(&self, batch: &TransactionBatch) -> Result<Option<OrderId>, BatchFailure> {
        self.set_state(BatchState::AwaitingSigner);
        info!(
            "Submitting {} batch {} ({} steps) to {} signer",
            batch.flow,
            batch.id,
            batch.len(),
            self.signer.name()
        );

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let submission = self.signer.submit_batch(batch, events_tx);
        let drain = async {
            let mut tracker = StepTracker::new(batch);
            while let Some(event) = events_rx.recv().await {
                if tracker.apply(event) {
                    let state = tracker.state();
                    let progress = tracker.progress;
                    self.snapshot.send_modify(|s| {
                        if let Some(state) = state {
                            s.state = state;
                        }
                        s.progress = progress;
                    });
                }
            }
            tracker
        };
        let (result, tracker) = tokio::join!(submission, drain);

        if let Some(failure) = tracker.failure {
            return Err(failure);
        }
        if let Err(e) = result {
            return Err(BatchFailure {
                step: None,
                error: ExecutionError::Signer(e),
            });
        }
        if !tracker.finished {
            return Err(BatchFailure {
                step: Some(tracker.next),
                error: ExecutionError::IncompleteBatch {
                    resolved: tracker.progress.completed(),
                    total: batch.len(),
                },
            });
        }
        Ok(tracker.order)
    }

    /// Poll the router until the order settles: first query right away,
    /// then one per policy delay, never overlapping.
    pub async fn poll_outcome(&self, order: OrderId, cancel: &CancelToken) -> Result<(), ExecutionError> {
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts {
            if cancel.is_cancelled() {
                return Err(ExecutionError::Cancelled);
            }
            self.set_state(BatchState::Polling { order, attempt });

            let status = tokio::select! {
                _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
                status = self.status.swap_status(order) => status,
            };
            match status {
                Ok(SwapStatus::Succeeded) => {
                    info!("Swap order {} succeeded after {} polls", order, attempt);
                    return Ok(());
                }
                Ok(SwapStatus::Failed) => return Err(ExecutionError::SwapFailed(order)),
                Ok(SwapStatus::Pending) => debug!("Swap order {} pending (poll {})", order, attempt),
                Err(e) => {
                    warn!("Status poll {} for order {} failed: {}", attempt, order, e);
                    last_error = Some(e);
                }
            }

            if attempt == self.policy.max_attempts {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
                _ = tokio::time::sleep(self.policy.delay_for(attempt)) => {}
            }
        }

        if let Some(e) = last_error {
            warn!("Giving up on order {}, last lookup error: {}", order, e);
        }
        Err(ExecutionError::PollExhausted(self.policy.max_attempts))
    }

    /// Submit a built batch and resolve it to a terminal report.
    ///
    /// Failures never escape: they end up in the report's state.
    pub async fn run(&self, batch: &TransactionBatch, cancel: &CancelToken) -> BatchReport {
        let mut order = None;
        let state = match self.submit(batch).await {
            Err(failure) => BatchState::Failed(failure),
            Ok(None) => BatchState::Succeeded,
            Ok(Some(handle)) => {
                order = Some(handle);
                match self.poll_outcome(handle, cancel).await {
                    Ok(()) => BatchState::Succeeded,
                    Err(error) => BatchState::Failed(BatchFailure {
                        step: Some(batch.len().saturating_sub(1)),
                        error,
                    }),
                }
            }
        };

        match &state {
            BatchState::Failed(failure) => error!(
                "{} batch {} failed at step {:?}: {}",
                batch.flow, batch.id, failure.step, failure.error
            ),
            _ => info!("{} batch {} succeeded", batch.flow, batch.id),
        }
        self.set_state(state.clone());

        BatchReport {
            batch_id: batch.id.clone(),
            progress: self.snapshot.borrow().progress,
            state,
            order,
        }
    }

    /// Build, submit and resolve in one go
    pub async fn execute(
        &self,
        intent: &Intent,
        context: BuildContext,
        cancel: &CancelToken,
    ) -> Result<BatchReport, IntentError> {
        let batch = self.build_steps(intent, context)?;
        Ok(self.run(&batch, cancel).await)
    }

    fn set_state(&self, state: BatchState) {
        debug!("Batch state -> {}", state.name());
        self.snapshot.send_modify(|s| s.state = state);
    }
}

/// Applies step events in order; anything after a failure or out of sequence is dropped
struct StepTracker<'a> {
    batch: &'a TransactionBatch,
    next: usize,
    progress: ProgressState,
    failure: Option<BatchFailure>,
    order: Option<OrderId>,
    finished: bool,
}

impl<'a> StepTracker<'a> {
    fn new(batch: &'a TransactionBatch) -> Self {
        Self {
            batch,
            next: 0,
            progress: ProgressState::new(batch.len()),
            failure: None,
            order: None,
            finished: false,
        }
    }

    /// Returns false when the event was ignored
    fn apply(&mut self, event: StepEvent) -> bool {
        if self.failure.is_some() || self.finished {
            warn!(
                "Batch {} already resolved, ignoring event for step {}",
                self.batch.id, event.index
            );
            return false;
        }
        if event.index != self.next {
            warn!(
                "Batch {}: expected event for step {}, got step {}",
                self.batch.id, self.next, event.index
            );
            return false;
        }
        let Some(step) = self.batch.steps().get(event.index) else {
            warn!("Batch {} has no step {}", self.batch.id, event.index);
            return false;
        };

        match event.outcome {
            StepOutcome::Failed(e) => {
                error!("Step {} ({}) of batch {} failed: {}", event.index, step.label, self.batch.id, e);
                self.failure = Some(BatchFailure {
                    step: Some(event.index),
                    error: ExecutionError::Signer(e),
                });
            }
            StepOutcome::Succeeded(reply) => {
                debug!("Step {} ({}) of batch {} succeeded", event.index, step.label, self.batch.id);
                self.progress.advance();
                self.next += 1;

                match (step.on_success, reply) {
                    (SuccessHook::Advance, _) => {}
                    (SuccessHook::Finish, _) => self.finished = true,
                    (SuccessHook::AwaitSwapStatus, StepReply::Order(order)) => {
                        self.order = Some(order);
                        self.finished = true;
                    }
                    (SuccessHook::AwaitSwapStatus, other) => {
                        error!("Swap step of batch {} returned {:?} instead of an order", self.batch.id, other);
                        self.failure = Some(BatchFailure {
                            step: Some(event.index),
                            error: ExecutionError::MissingOrder,
                        });
                    }
                }
            }
        }
        true
    }

    /// State after the last applied event; `None` once the signer part is done
    fn state(&self) -> Option<BatchState> {
        match &self.failure {
            Some(failure) => Some(BatchState::Failed(failure.clone())),
            None if self.finished => None,
            None => Some(BatchState::StepExecuting(self.next)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::{AddLiquidityIntent, PoolKind, PoolRef, SwapIntent};
    use crate::infrastructure::canister::ScriptedStatusLookup;
    use crate::infrastructure::signer::ScriptedSigner;
    use crate::shared::errors::SignerError;
    use crate::shared::types::{Protocol, Token, TokenUse};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;
    use std::time::Duration;

    const ROUTER: &str = "2ouva-viaaa-aaaaq-aaamq-cai";
    const ICP: &str = "ryjl3-tyaaa-aaaaa-aaaba-cai";
    const CKBTC: &str = "mxzaz-hqaaa-aaaar-qaada-cai";
    const POOL: &str = "zfcdd-tqaaa-aaaaq-aaaga-cai";

    fn token_use(canister: &str, symbol: &str, amount: &str) -> TokenUse {
        TokenUse::new(
            Token {
                canister_id: canister.parse().unwrap(),
                symbol: symbol.to_string(),
                decimals: 8,
                protocol: Protocol::Dip20,
                fees: Default::default(),
            },
            Decimal::from_str(amount).unwrap(),
        )
    }

    fn swap_intent() -> Intent {
        Intent::Swap(SwapIntent {
            pay: token_use(ICP, "ICP", "100"),
            receive: token_use(CKBTC, "ckBTC", "95"),
            slippage: Decimal::from_str("0.5").unwrap(),
            path: vec![POOL.parse().unwrap()],
            direction: 0,
            trading_fee: Decimal::ZERO,
        })
    }

    fn add_liquidity_intent() -> Intent {
        Intent::AddLiquidity(AddLiquidityIntent {
            pool: PoolRef {
                canister_id: POOL.parse().unwrap(),
                kind: PoolKind::Public,
                single: false,
            },
            base: token_use(ICP, "ICP", "1"),
            quote: token_use(CKBTC, "ckBTC", "0.01"),
            slippage: Decimal::from_str("0.1").unwrap(),
        })
    }

    fn context() -> BuildContext {
        BuildContext {
            router: ROUTER.parse().unwrap(),
            transfer_account: None,
            deadline: 1,
        }
    }

    fn orchestrator(
        signer: Arc<dyn WalletSigner>,
        status: Arc<dyn SwapStatusLookup>,
    ) -> TransactionOrchestrator {
        TransactionOrchestrator::new(signer, status, PollPolicy::default())
    }

    /// Replays a fixed event sequence regardless of the batch
    struct ReplaySigner(Vec<StepEvent>);

    #[async_trait]
    impl WalletSigner for ReplaySigner {
        fn name(&self) -> &str {
            "replay"
        }

        async fn submit_batch(
            &self,
            _batch: &TransactionBatch,
            events: mpsc::UnboundedSender<StepEvent>,
        ) -> Result<(), SignerError> {
            for event in &self.0 {
                events.send(event.clone()).unwrap();
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_progress_matches_step_successes() {
        let signer = Arc::new(ScriptedSigner::succeeding(0));
        let status = Arc::new(ScriptedStatusLookup::settling_after(0));
        let orchestrator = orchestrator(signer.clone(), status.clone());

        let report = orchestrator
            .execute(&add_liquidity_intent(), context(), &CancelToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.progress.completed(), 3);
        assert_eq!(report.progress.total(), 3);
        assert_eq!(report.order, None);
        assert_eq!(signer.invoked().await.len(), 3);
        // non-swap batches never poll
        assert_eq!(status.calls(), 0);
        assert_eq!(orchestrator.snapshot().state, BatchState::Succeeded);
    }

    #[tokio::test]
    async fn test_rejection_executes_no_steps() {
        let signer = Arc::new(ScriptedSigner::rejecting(SignerError::UserRejected));
        let orchestrator = orchestrator(signer.clone(), Arc::new(ScriptedStatusLookup::settling_after(0)));

        let report = orchestrator
            .execute(&swap_intent(), context(), &CancelToken::new())
            .await
            .unwrap();

        let failure = report.failure().unwrap();
        assert!(failure.is_rejection());
        assert_eq!(failure.step, None);
        assert_eq!(report.progress.completed(), 0);
        assert!(signer.invoked().await.is_empty());
    }

    #[tokio::test]
    async fn test_first_step_failure_aborts_batch() {
        let signer = Arc::new(
            ScriptedSigner::succeeding(5).failing_at(0, SignerError::Other("insufficient allowance".into())),
        );
        let status = Arc::new(ScriptedStatusLookup::settling_after(0));
        let orchestrator = orchestrator(signer.clone(), status.clone());

        let report = orchestrator
            .execute(&swap_intent(), context(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.failure().map(|f| f.step), Some(Some(0)));
        assert_eq!(report.progress.completed(), 0);
        let invoked = signer.invoked().await;
        assert_eq!(invoked, vec![(0, "approve".to_string())]);
        assert_eq!(status.calls(), 0);
    }

    #[tokio::test]
    async fn test_events_after_failure_or_out_of_order_are_ignored() {
        let signer = Arc::new(ReplaySigner(vec![
            StepEvent::succeeded(1, StepReply::Empty),
            StepEvent::succeeded(0, StepReply::Empty),
            StepEvent::succeeded(0, StepReply::Empty),
            StepEvent::failed(1, SignerError::SlippageExceeded("1.2%".into())),
            StepEvent::succeeded(2, StepReply::Empty),
        ]));
        let orchestrator = orchestrator(signer, Arc::new(ScriptedStatusLookup::settling_after(0)));

        let report = orchestrator
            .execute(&add_liquidity_intent(), context(), &CancelToken::new())
            .await
            .unwrap();

        let failure = report.failure().unwrap();
        assert!(failure.is_slippage());
        assert_eq!(failure.step, Some(1));
        assert_eq!(report.progress.completed(), 1);
    }

    #[tokio::test]
    async fn test_silent_signer_reports_incomplete_batch() {
        let signer = Arc::new(ReplaySigner(vec![StepEvent::succeeded(0, StepReply::Empty)]));
        let orchestrator = orchestrator(signer, Arc::new(ScriptedStatusLookup::settling_after(0)));

        let report = orchestrator
            .execute(&add_liquidity_intent(), context(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.failure().map(|f| f.error.clone()),
            Some(ExecutionError::IncompleteBatch { resolved: 1, total: 3 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_polls_until_settled() {
        let signer = Arc::new(ScriptedSigner::succeeding(42));
        let status = Arc::new(ScriptedStatusLookup::settling_after(2));
        let orchestrator = orchestrator(signer, status.clone());

        let start = tokio::time::Instant::now();
        let report = orchestrator
            .execute(&swap_intent(), context(), &CancelToken::new())
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert!(report.is_success());
        assert_eq!(report.order, Some(42));
        assert_eq!(status.calls(), 3);
        // immediate first poll, then two 2s waits
        assert!(elapsed >= Duration::from_secs(4));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_swap_passes_minimum_receive() {
        let orchestrator = orchestrator(
            Arc::new(ScriptedSigner::succeeding(1)),
            Arc::new(ScriptedStatusLookup::settling_after(0)),
        );
        let batch = orchestrator.build_steps(&swap_intent(), context()).unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.terminal().unwrap().args[3], json!("9452500000"));
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.batch_id.as_deref(), Some(batch.id.as_str()));
        assert_eq!(snapshot.progress.completed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_swap_status_fails_batch() {
        let status = Arc::new(ScriptedStatusLookup::new(
            vec![SwapStatus::Pending],
            SwapStatus::Failed,
        ));
        let orchestrator = orchestrator(Arc::new(ScriptedSigner::succeeding(9)), status.clone());

        let report = orchestrator
            .execute(&swap_intent(), context(), &CancelToken::new())
            .await
            .unwrap();

        let failure = report.failure().unwrap();
        assert_eq!(failure.error, ExecutionError::SwapFailed(9));
        assert_eq!(failure.step, Some(2));
        assert_eq!(report.progress.completed(), 3);
        assert_eq!(status.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_gives_up_after_max_attempts() {
        let status = Arc::new(ScriptedStatusLookup::new(vec![], SwapStatus::Pending));
        let orchestrator = TransactionOrchestrator::new(
            Arc::new(ScriptedSigner::succeeding(3)),
            status.clone(),
            PollPolicy::fixed(Duration::from_secs(2), 4),
        );

        let result = orchestrator.poll_outcome(3, &CancelToken::new()).await;
        assert_eq!(result, Err(ExecutionError::PollExhausted(4)));
        assert_eq!(status.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let status = Arc::new(ScriptedStatusLookup::new(vec![], SwapStatus::Pending));
        let orchestrator = orchestrator(Arc::new(ScriptedSigner::succeeding(3)), status.clone());
        let cancel = CancelToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                cancel.cancel();
            })
        };

        let result = orchestrator.poll_outcome(3, &cancel).await;
        canceller.await.unwrap();

        assert_eq!(result, Err(ExecutionError::Cancelled));
        // polls at 0s, 2s and 4s
        assert_eq!(status.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_intent_is_rejected_before_submission() {
        let signer = Arc::new(ScriptedSigner::succeeding(0));
        let orchestrator = orchestrator(signer.clone(), Arc::new(ScriptedStatusLookup::settling_after(0)));
        let mut intent = swap_intent();
        if let Intent::Swap(swap) = &mut intent {
            swap.pay.amount = Decimal::ZERO;
        }

        let result = orchestrator.execute(&intent, context(), &CancelToken::new()).await;
        assert!(matches!(result, Err(IntentError::ZeroAmount(_))));
        assert!(signer.invoked().await.is_empty());
        assert!(matches!(orchestrator.snapshot().state, BatchState::Failed(_)));
    }
}
