use anyhow::{Context, Result};
use candid::Principal;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::Path};

use crate::application::polling::PollPolicy;
use crate::shared::types::parse_principal;
use crate::shared::utils::deadline_window;

const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:8787";

#[derive(Debug, Clone, Deserialize)]
pub struct SignerCfg {
    pub url: String,
    /// No timeout unless set; the user may take a while to approve
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusCfg {
    pub url: String,
    #[serde(default = "default_status_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingCfg {
    pub interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
    pub max_attempts: u32,
    pub jitter_ms: u64,
}

impl Default for PollingCfg {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            multiplier: 1.0,
            max_interval_ms: 30_000,
            max_attempts: 150,
            jitter_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeCfg {
    pub router: String,
    #[serde(default = "default_deadline_minutes")]
    pub deadline_minutes: i64,
    pub simulate: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletCfg {
    pub user_id: Option<String>,
    pub transfer_account: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub signer: SignerCfg,
    pub status: StatusCfg,
    #[serde(default)]
    pub polling: PollingCfg,
    pub trade: TradeCfg,
    #[serde(default)]
    pub wallet: WalletCfg,
}

fn default_status_timeout() -> u64 {
    10
}

fn default_deadline_minutes() -> i64 {
    5
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())?;
        let cfg: Self = toml::from_str(&s).context("parse Config.toml")?;
        Ok(cfg)
    }
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct AppCfg {
    pub simulate: bool,
    pub signer_url: String,
    pub signer_timeout: Option<Duration>,
    pub status_url: String,
    pub status_timeout: Duration,
    pub router: Principal,
    pub deadline_window: chrono::Duration,
    pub poll_policy: PollPolicy,
    pub user_id: Option<String>,
    pub transfer_account: Option<String>,
}

impl AppCfg {
    pub fn from_config(cfg: Config, override_simulate: bool) -> Result<Self> {
        let router = parse_principal(&cfg.trade.router).context("invalid trade.router")?;
        let deadline_window =
            deadline_window(cfg.trade.deadline_minutes).context("invalid trade.deadline_minutes")?;

        Ok(Self {
            simulate: override_simulate || cfg.trade.simulate.unwrap_or(false),
            signer_url: cfg.signer.url,
            signer_timeout: cfg.signer.timeout_secs.map(Duration::from_secs),
            status_url: cfg.status.url,
            status_timeout: Duration::from_secs(cfg.status.timeout_secs),
            router,
            deadline_window,
            poll_policy: cfg.polling.into(),
            user_id: cfg.wallet.user_id,
            transfer_account: cfg.wallet.transfer_account,
        })
    }

    pub fn from_cli_args(router: &str, simulate: bool) -> Result<Self> {
        let router = parse_principal(router).context("invalid --router")?;
        Ok(Self {
            simulate,
            signer_url: DEFAULT_BRIDGE_URL.to_string(),
            signer_timeout: None,
            status_url: DEFAULT_BRIDGE_URL.to_string(),
            status_timeout: Duration::from_secs(default_status_timeout()),
            router,
            deadline_window: deadline_window(default_deadline_minutes())?,
            poll_policy: PollPolicy::default(),
            user_id: None,
            transfer_account: None,
        })
    }
}

impl From<PollingCfg> for PollPolicy {
    fn from(cfg: PollingCfg) -> Self {
        Self {
            interval: Duration::from_millis(cfg.interval_ms),
            multiplier: cfg.multiplier,
            max_interval: Duration::from_millis(cfg.max_interval_ms),
            max_attempts: cfg.max_attempts.max(1),
            jitter: (cfg.jitter_ms > 0).then(|| Duration::from_millis(cfg.jitter_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml() {
        let raw = r#"
            [signer]
            url = "http://localhost:9000"

            [status]
            url = "http://localhost:9001"

            [polling]
            interval_ms = 1000
            multiplier = 1.5

            [trade]
            router = "2ouva-viaaa-aaaaq-aaamq-cai"

            [wallet]
            user_id = "user-1"
        "#;
        let cfg: Config = toml::from_str(raw).unwrap();
        assert_eq!(cfg.polling.max_attempts, 150);

        let app = AppCfg::from_config(cfg, false).unwrap();
        assert!(!app.simulate);
        assert_eq!(app.signer_timeout, None);
        assert_eq!(app.status_timeout, Duration::from_secs(10));
        assert_eq!(app.poll_policy.interval, Duration::from_secs(1));
        assert_eq!(app.poll_policy.jitter, None);
        assert_eq!(app.deadline_window, chrono::Duration::minutes(5));
        assert_eq!(app.user_id.as_deref(), Some("user-1"));
        assert_eq!(app.transfer_account, None);
    }

    #[test]
    fn test_out_of_range_deadline_is_rejected() {
        let raw = |minutes: &str| {
            format!(
                "[signer]\nurl = \"http://localhost:9000\"\n\n[status]\nurl = \"http://localhost:9001\"\n\n[trade]\nrouter = \"2ouva-viaaa-aaaaq-aaamq-cai\"\ndeadline_minutes = {}\n",
                minutes
            )
        };
        for minutes in ["0", "-5", "1441", "9223372036854775807"] {
            let cfg: Config = toml::from_str(&raw(minutes)).unwrap();
            assert!(AppCfg::from_config(cfg, false).is_err(), "{} minutes accepted", minutes);
        }

        let cfg: Config = toml::from_str(&raw("1440")).unwrap();
        let app = AppCfg::from_config(cfg, false).unwrap();
        assert_eq!(app.deadline_window, chrono::Duration::days(1));
    }

    #[test]
    fn test_invalid_router_is_rejected() {
        assert!(AppCfg::from_cli_args("not a canister", false).is_err());
        assert!(AppCfg::from_cli_args("ryjl3-tyaaa-aaaaa-aaaba-caj", false).is_err());
        assert!(AppCfg::from_cli_args("ryjl3-tyaaa-aaaaa-aaaba-cai", false).is_ok());
    }
}
