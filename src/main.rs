mod app;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use icpl_orchestrator::application::Commands;
use icpl_orchestrator::config::{AppCfg, Config};
use icpl_orchestrator::shared::types::parse_principal;
use icpl_orchestrator::shared::utils::deadline_window;

#[derive(Parser, Debug)]
#[command(name = "icpl", version, about = "Transaction orchestrator for ICPL swaps and liquidity pools")]
struct Args {
    /// Path to config file (optional)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Router canister id (overrides config)
    #[arg(long, global = true)]
    router: Option<String>,

    /// Wallet signer bridge URL (overrides config)
    #[arg(long, global = true)]
    signer_url: Option<String>,

    /// Swap status endpoint URL (overrides config)
    #[arg(long, global = true)]
    status_url: Option<String>,

    /// Connected user principal (overrides config)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Transfer sub-account at the router (overrides config)
    #[arg(long, global = true)]
    transfer_account: Option<String>,

    /// Delay between swap status polls in milliseconds (overrides config)
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Maximum number of swap status polls (overrides config)
    #[arg(long, global = true)]
    max_polls: Option<u32>,

    /// Deadline window in minutes (overrides config)
    #[arg(long, global = true)]
    deadline_minutes: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    // Priority: CLI args > config file > defaults
    let mut app_cfg = if let Some(config_path) = &args.config {
        let cfg = Config::from_file(config_path)?;
        let mut app_cfg = AppCfg::from_config(cfg, false)?;
        if let Some(router) = &args.router {
            app_cfg.router = parse_principal(router).context("invalid --router")?;
        }
        app_cfg
    } else {
        let router = args
            .router
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--router is required when not using --config"))?;
        AppCfg::from_cli_args(router, false)?
    };

    if let Some(signer_url) = args.signer_url {
        app_cfg.signer_url = signer_url;
    }
    if let Some(status_url) = args.status_url {
        app_cfg.status_url = status_url;
    }
    if let Some(user) = args.user {
        app_cfg.user_id = Some(user);
    }
    if let Some(transfer_account) = args.transfer_account {
        app_cfg.transfer_account = Some(transfer_account);
    }
    if let Some(interval) = args.poll_interval_ms {
        app_cfg.poll_policy.interval = Duration::from_millis(interval);
        app_cfg.poll_policy.max_interval = app_cfg.poll_policy.max_interval.max(app_cfg.poll_policy.interval);
    }
    if let Some(max_polls) = args.max_polls {
        app_cfg.poll_policy.max_attempts = max_polls.max(1);
    }
    if let Some(minutes) = args.deadline_minutes {
        app_cfg.deadline_window = deadline_window(minutes).context("invalid --deadline-minutes")?;
    }

    app::run(app_cfg, args.command).await
}
