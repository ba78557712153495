// src/app.rs
use anyhow::Result;
use tracing::{error, info};

use icpl_orchestrator::application::{CommandExecutor, Commands};
use icpl_orchestrator::config::AppCfg;

pub async fn run(app_cfg: AppCfg, command: Commands) -> Result<()> {
    info!("Starting ICPL orchestrator");
    info!("Configuration: {:?}", app_cfg);

    if app_cfg.simulate {
        info!("Simulation mode - nothing is sent to the wallet bridge");
    }

    match CommandExecutor::execute(command, &app_cfg).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("❌ {}", e);
            Err(e.into())
        }
    }
}
