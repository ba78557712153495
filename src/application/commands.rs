//! CLI commands and handlers
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::application::flows::{FlowController, FlowRequest, FlowSettings};
use crate::application::state::AppState;
use crate::config::AppCfg;
use crate::domain::execution::{BuildContext, TransactionBuilder, TransactionValidator};
use crate::domain::intent::Intent;
use crate::domain::notification::NotificationKind;
use crate::infrastructure::canister::{HttpStatusLookup, ScriptedStatusLookup, SwapStatusLookup};
use crate::infrastructure::signer::{HttpSigner, ScriptedSigner, WalletSigner};
use crate::math::{
    calculate_min_receive, pay_token_fees, receive_token_fees, service_fee, DISPLAY_DECIMALS,
};
use crate::shared::errors::AppError;
use crate::shared::types::truncate_decimal;
use crate::shared::utils::generate_deadline;

/// Order handle returned by the simulated signer
const SIMULATED_ORDER: u64 = 1;

/// Pending polls the simulated router answers before settling
const SIMULATED_PENDING_POLLS: usize = 2;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate an intent and print the batch it would submit
    Plan {
        /// Intent file (TOML, or JSON with a .json extension)
        #[arg(short, long)]
        intent: PathBuf,
    },

    /// Submit an intent to the wallet signer and follow it to the end
    Execute {
        /// Intent file (TOML, or JSON with a .json extension)
        #[arg(short, long)]
        intent: PathBuf,

        /// Use the in-memory signer and router instead of the bridge
        #[arg(long)]
        simulate: bool,
    },

    /// Query the settlement status of a swap order
    Status {
        /// Order id returned by the swap step
        #[arg(short, long)]
        order: u64,
    },
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(command: Commands, config: &AppCfg) -> Result<(), AppError> {
        match command {
            Commands::Plan { intent } => Self::execute_plan_command(&intent, config),
            Commands::Execute { intent, simulate } => {
                Self::execute_intent_command(&intent, simulate || config.simulate, config).await
            }
            Commands::Status { order } => Self::execute_status_command(order, config).await,
        }
    }

    fn execute_plan_command(path: &Path, config: &AppCfg) -> Result<(), AppError> {
        let intent = load_intent(path)?;
        TransactionValidator::new().validate(&intent)?;

        let builder = TransactionBuilder::new(BuildContext {
            router: config.router.clone(),
            transfer_account: config.transfer_account.clone(),
            deadline: generate_deadline(chrono::Utc::now(), config.deadline_window)?,
        });
        let batch = builder.build_steps(&intent)?;

        println!("📋 {} batch {} ({} steps)", batch.flow, batch.id, batch.len());
        for (i, step) in batch.steps().iter().enumerate() {
            println!("  {}. {} -> {}.{}", i + 1, step.label, step.target, step.method);
        }

        if let Intent::Swap(swap) = &intent {
            let min_receive = calculate_min_receive(swap.receive.amount, swap.slippage);
            println!(
                "💱 Minimum receive: {} {}",
                truncate_decimal(min_receive, DISPLAY_DECIMALS),
                swap.receive.symbol()
            );
            println!(
                "💸 Fees: {} {} paid, {} {} received, service fee {}",
                pay_token_fees(&swap.pay).total(),
                swap.pay.symbol(),
                receive_token_fees(&swap.receive).total(),
                swap.receive.symbol(),
                service_fee(swap.receive.amount)
            );
        }

        let json = serde_json::to_string_pretty(&batch)
            .map_err(|e| AppError::IntentFile(format!("Cannot render batch: {}", e)))?;
        println!("{}", json);
        Ok(())
    }

    async fn execute_intent_command(path: &Path, simulate: bool, config: &AppCfg) -> Result<(), AppError> {
        let intent = load_intent(path)?;

        let (signer, status): (Arc<dyn WalletSigner>, Arc<dyn SwapStatusLookup>) = if simulate {
            info!("Simulation mode: using the in-memory signer");
            (
                Arc::new(ScriptedSigner::succeeding(SIMULATED_ORDER)),
                Arc::new(ScriptedStatusLookup::settling_after(SIMULATED_PENDING_POLLS)),
            )
        } else {
            (
                Arc::new(HttpSigner::new(config.signer_url.clone(), config.signer_timeout)?),
                Arc::new(HttpStatusLookup::new(config.status_url.clone(), config.status_timeout)?),
            )
        };

        let state = AppState::new();
        match (&config.user_id, simulate) {
            (Some(user), _) => state.connect(user.clone()),
            (None, true) => state.connect("simulated-user"),
            (None, false) => {}
        }
        if let Some(account) = &config.transfer_account {
            state.set_transfer_account(account.clone());
        } else if simulate {
            state.set_transfer_account("simulated-subaccount");
        }

        let flows = FlowController::new(signer, status, state, flow_settings(config));
        let mut notifications = flows.subscribe_notifications();
        let printer = tokio::spawn(async move {
            while let Ok(notification) = notifications.recv().await {
                let icon = match notification.kind {
                    NotificationKind::Loading => "⏳",
                    NotificationKind::Success => "✅",
                    NotificationKind::Error => "❌",
                };
                println!("{} {}", icon, notification.message);
                if let Some(description) = &notification.description {
                    println!("   {}", description);
                }
                if let Some(action) = notification.action {
                    println!("   → {}", action.text());
                }
                if notification.is_terminal() {
                    break;
                }
            }
        });

        let report = flows.show_modal(FlowRequest::new(intent)).await?;
        if let Err(e) = printer.await {
            error!("Notification printer stopped: {}", e);
        }

        println!(
            "📊 Batch {} {}: {} of {} steps completed",
            report.batch_id,
            report.state.name(),
            report.progress.completed(),
            report.progress.total()
        );
        if let Some(order) = report.order {
            println!("🧾 Swap order: {}", order);
        }
        match report.failure() {
            Some(failure) => Err(AppError::Execution(failure.error.clone())),
            None => Ok(()),
        }
    }

    async fn execute_status_command(order: u64, config: &AppCfg) -> Result<(), AppError> {
        let lookup = HttpStatusLookup::new(config.status_url.clone(), config.status_timeout)?;
        let status = lookup
            .swap_status(order)
            .await
            .map_err(AppError::Execution)?;
        println!("🧾 Order {}: {:?}", order, status);
        Ok(())
    }
}

fn flow_settings(config: &AppCfg) -> FlowSettings {
    FlowSettings {
        router: config.router.clone(),
        deadline_window: config.deadline_window,
        poll_policy: config.poll_policy.clone(),
    }
}

/// Read an intent from TOML, or JSON when the file ends in `.json`
pub fn load_intent(path: &Path) -> Result<Intent, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::IntentFile(format!("{}: {}", path.display(), e)))?;
    parse_intent(&raw, path.extension().and_then(|e| e.to_str()) == Some("json"))
        .map_err(|e| AppError::IntentFile(format!("{}: {}", path.display(), e)))
}

fn parse_intent(raw: &str, json: bool) -> Result<Intent, String> {
    if json {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    } else {
        toml::from_str(raw).map_err(|e| e.to_string())
    }
}
