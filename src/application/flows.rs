//! Flow controller - the modal entry points of swap and liquidity flows

use candid::Principal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{debug, info, warn};

use super::orchestrator::TransactionOrchestrator;
use super::polling::{CancelToken, PollPolicy};
use super::state::AppState;
use crate::domain::execution::{BatchReport, BuildContext, ProgressState};
use crate::domain::intent::Intent;
use crate::domain::notification::{NotificationTemplate, OutcomeNotification};
use crate::infrastructure::canister::SwapStatusLookup;
use crate::infrastructure::signer::WalletSigner;
use crate::shared::errors::AppError;
use crate::shared::utils::generate_deadline;

const NOTIFICATION_CAPACITY: usize = 64;

/// What the modal of a surface currently shows
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModalState {
    #[default]
    Closed,
    InProgress {
        flow: String,
        labels: Vec<String>,
        progress: ProgressState,
    },
}

/// Opens the modal of one flow on one surface
#[derive(Debug, Clone)]
pub struct FlowRequest {
    pub intent: Intent,
    /// The control that triggered the flow; one batch in flight per surface
    pub surface: String,
}

impl FlowRequest {
    pub fn new(intent: Intent) -> Self {
        let surface = match &intent {
            Intent::Swap(_) => "swap".to_string(),
            Intent::CreatePool(_) => "create-pool".to_string(),
            Intent::AddLiquidity(i) => format!("add-liquidity:{}", i.pool.canister_id),
            Intent::RemoveLiquidity(i) => format!("remove-liquidity:{}", i.pool.canister_id),
            Intent::CreateToken(_) => "create-token".to_string(),
            Intent::Withdraw(i) => format!("withdraw:{}", i.token.token.canister_id),
        };
        Self { intent, surface }
    }

    pub fn on_surface(mut self, surface: impl Into<String>) -> Self {
        self.surface = surface.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub router: Principal,
    pub deadline_window: chrono::Duration,
    pub poll_policy: PollPolicy,
}

impl FlowSettings {
    pub fn new(router: Principal) -> Self {
        Self {
            router,
            deadline_window: chrono::Duration::minutes(5),
            poll_policy: PollPolicy::default(),
        }
    }
}

struct Surface {
    orchestrator: TransactionOrchestrator,
    /// Single permit held while a batch runs
    busy: Arc<Semaphore>,
    modal: watch::Sender<ModalState>,
    cancel: RwLock<CancelToken>,
    /// Set by `drop_surface` while a batch is still running
    dropped: AtomicBool,
}

pub struct FlowController {
    signer: Arc<dyn WalletSigner>,
    status: Arc<dyn SwapStatusLookup>,
    state: AppState,
    settings: FlowSettings,
    surfaces: RwLock<HashMap<String, Arc<Surface>>>,
    notifications: broadcast::Sender<OutcomeNotification>,
}

impl FlowController {
    pub fn new(
        signer: Arc<dyn WalletSigner>,
        status: Arc<dyn SwapStatusLookup>,
        state: AppState,
        settings: FlowSettings,
    ) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            signer,
            status,
            state,
            settings,
            surfaces: RwLock::new(HashMap::new()),
            notifications,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<OutcomeNotification> {
        self.notifications.subscribe()
    }

    pub async fn subscribe_modal(&self, surface: &str) -> watch::Receiver<ModalState> {
        self.surface(surface).await.modal.subscribe()
    }

    /// Run one flow end to end.
    ///
    /// Session and busy-surface errors are returned before anything is
    /// built; once the batch exists every outcome is reported through the
    /// returned report and the notifications.
    pub async fn show_modal(&self, request: FlowRequest) -> Result<BatchReport, AppError> {
        let FlowRequest { intent, surface: name } = request;
        let session = self.state.snapshot();
        if !session.is_connected() {
            return Err(AppError::NotConnected);
        }
        // both flows settle against the user's sub-account at the router
        let needs_account = matches!(intent, Intent::CreatePool(_) | Intent::Withdraw(_));
        if needs_account && session.transfer_account.is_none() {
            return Err(AppError::MissingTransferAccount);
        }

        let (surface, busy, cancel) = self.claim_surface(&name, intent.flow_name()).await?;

        let built = generate_deadline(Utc::now(), self.settings.deadline_window).and_then(|deadline| {
            let context = BuildContext {
                router: self.settings.router,
                transfer_account: session.transfer_account,
                deadline,
            };
            surface.orchestrator.build_steps(&intent, context)
        });
        let batch = match built {
            Ok(batch) => batch,
            Err(e) => {
                self.release_surface(&name, &surface, busy).await;
                return Err(e.into());
            }
        };
        let template = NotificationTemplate::for_intent(batch.id.clone(), &intent);

        self.notify(template.loading());
        surface.modal.send_replace(ModalState::InProgress {
            flow: batch.flow.clone(),
            labels: batch.labels(),
            progress: ProgressState::new(batch.len()),
        });
        let mut progress_rx = surface.orchestrator.subscribe();
        let forward_progress = async {
            while progress_rx.changed().await.is_ok() {
                let snapshot = progress_rx.borrow_and_update().clone();
                surface.modal.send_if_modified(|modal| match modal {
                    ModalState::InProgress { progress, .. } if *progress != snapshot.progress => {
                        *progress = snapshot.progress;
                        true
                    }
                    _ => false,
                });
                if snapshot.state.is_terminal() {
                    break;
                }
            }
        };
        let (report, _) = tokio::join!(surface.orchestrator.run(&batch, &cancel), forward_progress);

        let outcome = match report.failure() {
            Some(failure) => template.error(failure),
            None => template.success(),
        };
        info!("{}: {}", name, outcome.message);
        self.notify(outcome);
        surface.modal.send_replace(ModalState::Closed);

        self.release_surface(&name, &surface, busy).await;
        Ok(report)
    }

    /// Hide the modal; on-chain calls already handed to the signer keep going
    pub async fn close_modal(&self, surface: &str) {
        if let Some(s) = self.surfaces.read().await.get(surface) {
            s.modal.send_replace(ModalState::Closed);
        }
    }

    /// The surface went away: stop its status poll and hide the modal.
    ///
    /// An idle surface is forgotten right away, a busy one once its batch ends.
    pub async fn drop_surface(&self, surface: &str) {
        let mut surfaces = self.surfaces.write().await;
        let Some(s) = surfaces.get(surface).cloned() else {
            return;
        };
        s.cancel.read().await.cancel();
        s.modal.send_replace(ModalState::Closed);
        if s.busy.available_permits() > 0 {
            surfaces.remove(surface);
        } else {
            s.dropped.store(true, Ordering::Release);
        }
    }

    pub async fn is_busy(&self, surface: &str) -> bool {
        match self.surfaces.read().await.get(surface) {
            Some(s) => s.busy.available_permits() == 0,
            None => false,
        }
    }

    async fn surface(&self, name: &str) -> Arc<Surface> {
        if let Some(surface) = self.surfaces.read().await.get(name) {
            return surface.clone();
        }
        self.surfaces
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(|| self.new_surface())
            .clone()
    }

    /// Take the surface's permit and install a fresh cancel token.
    ///
    /// Runs under the surfaces lock so a concurrent `drop_surface` sees
    /// either the previous token on an idle surface or the new one.
    async fn claim_surface(
        &self,
        name: &str,
        flow: &str,
    ) -> Result<(Arc<Surface>, OwnedSemaphorePermit, CancelToken), AppError> {
        let mut surfaces = self.surfaces.write().await;
        let surface = surfaces
            .entry(name.to_string())
            .or_insert_with(|| self.new_surface())
            .clone();
        let busy = surface.busy.clone().try_acquire_owned().map_err(|_| {
            warn!("Surface {} is busy, ignoring {} request", name, flow);
            AppError::Busy(flow.to_string())
        })?;

        let cancel = CancelToken::new();
        *surface.cancel.write().await = cancel.clone();
        surface.dropped.store(false, Ordering::Release);
        Ok((surface, busy, cancel))
    }

    /// Give the permit back; a surface dropped meanwhile is forgotten
    async fn release_surface(&self, name: &str, surface: &Arc<Surface>, busy: OwnedSemaphorePermit) {
        drop(busy);
        if !surface.dropped.load(Ordering::Acquire) {
            return;
        }
        let mut surfaces = self.surfaces.write().await;
        let idle = surfaces
            .get(name)
            .is_some_and(|s| Arc::ptr_eq(s, surface) && s.busy.available_permits() > 0);
        if idle {
            debug!("Forgetting dropped surface {}", name);
            surfaces.remove(name);
        }
    }

    fn new_surface(&self) -> Arc<Surface> {
        let (modal, _) = watch::channel(ModalState::Closed);
        Arc::new(Surface {
            orchestrator: TransactionOrchestrator::new(
                self.signer.clone(),
                self.status.clone(),
                self.settings.poll_policy.clone(),
            ),
            busy: Arc::new(Semaphore::new(1)),
            modal,
            cancel: RwLock::new(CancelToken::new()),
            dropped: AtomicBool::new(false),
        })
    }

    fn notify(&self, notification: OutcomeNotification) {
        // no receivers is fine
        let _ = self.notifications.send(notification);
    }
}
