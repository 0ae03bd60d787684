// src/config.rs

pub mod session;

use crate::{
    cli::Cli,
    constants,
    error::{AppError, AppResult},
};
use anyhow::{Context, anyhow};
use log::info;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Browser-side tunables. Every field is optional in the file; missing
/// values fall back to the defaults in [`AppConfig::new`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BrowserConfig {
    pub page_load_timeout_secs: Option<u64>,
    pub page_load_retries: Option<u32>,
    pub caption_wait_secs: Option<u64>,
    pub ui_wait_secs: Option<u64>,
    pub inter_video_delay_ms: Option<u64>,
    pub debug_settle_secs: Option<u64>,
    pub session_max_age_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExternalConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

impl ExternalConfig {
    pub(crate) fn default_app_config() -> Self {
        Self {
            network: NetworkConfig {
                connect_timeout_secs: Some(10),
                timeout_secs: Some(30),
                max_retries: Some(3),
            },
            browser: BrowserConfig {
                page_load_timeout_secs: Some(30),
                page_load_retries: Some(2),
                caption_wait_secs: Some(15),
                ui_wait_secs: Some(3),
                inter_video_delay_ms: Some(1000),
                debug_settle_secs: Some(5),
                session_max_age_hours: Some(24 * 7),
            },
        }
    }
}

pub fn get_config_dir() -> AppResult<PathBuf> {
    let path = dirs::home_dir()
        .ok_or_else(|| AppError::Other(anyhow!("Cannot determine the user's home directory")))?
        .join(constants::CONFIG_DIR_NAME);
    Ok(path)
}

pub(crate) fn load_or_create_external_config() -> AppResult<ExternalConfig> {
    let config_path = get_config_dir()?.join(constants::CONFIG_FILE_NAME);
    if config_path.is_file() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file '{}'", config_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", config_path.display()))
            .map_err(AppError::from)
    } else {
        info!("Config file {:?} not found, writing defaults.", config_path);
        let config = ExternalConfig::default_app_config();

        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub headless: bool,
    pub login_timeout: Duration,
    pub page_load_timeout: Duration,
    pub page_load_retries: u32,
    pub caption_wait: Duration,
    pub ui_wait: Duration,
    pub inter_video_delay: Duration,
    pub debug_settle: Duration,
    pub session_max_age: Duration,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external = load_or_create_external_config()?;
        Ok(Self::from_parts(args, external))
    }

    fn from_parts(args: &Cli, external: ExternalConfig) -> Self {
        let session = args.command.session();
        let net = external.network;
        let browser = external.browser;
        Self {
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(net.connect_timeout_secs.unwrap_or(10)),
            timeout: Duration::from_secs(net.timeout_secs.unwrap_or(30)),
            max_retries: net.max_retries.unwrap_or(3),
            headless: session.headless,
            login_timeout: Duration::from_secs(session.login_timeout),
            page_load_timeout: Duration::from_secs(browser.page_load_timeout_secs.unwrap_or(30)),
            page_load_retries: browser.page_load_retries.unwrap_or(2),
            caption_wait: Duration::from_secs(browser.caption_wait_secs.unwrap_or(15)),
            ui_wait: Duration::from_secs(browser.ui_wait_secs.unwrap_or(3)),
            inter_video_delay: Duration::from_millis(browser.inter_video_delay_ms.unwrap_or(1000)),
            debug_settle: Duration::from_secs(browser.debug_settle_secs.unwrap_or(5)),
            session_max_age: Duration::from_secs(
                browser.session_max_age_hours.unwrap_or(24 * 7) * 3600,
            ),
        }
    }
}

#[cfg(feature = "testing")]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_agent: "test-agent/1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            max_retries: 0,
            headless: true,
            login_timeout: Duration::from_secs(1),
            page_load_timeout: Duration::from_secs(5),
            page_load_retries: 1,
            caption_wait: Duration::from_millis(200),
            ui_wait: Duration::from_millis(10),
            inter_video_delay: Duration::ZERO,
            debug_settle: Duration::ZERO,
            session_max_age: Duration::from_secs(3600),
        }
    }
}
