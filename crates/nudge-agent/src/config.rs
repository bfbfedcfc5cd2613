use crate::error::ConfigError;
use clap::Parser;
use nudge_core::logging::{env_true, resolve_log_dir, DEFAULT_LOG_DIR};
use std::time::Duration;
use url::Url;

pub const DEFAULT_HUB_URL: &str = "ws://127.0.0.1:8000/ws";

#[derive(Parser, Debug)]
#[command(name = "nudge-agent", about = "Resumes local playback when the hub raises an alert")]
pub struct Args {
    #[arg(long, default_value = "")]
    pub hub_url: String,
    /// Seconds to wait before reconnecting after the hub goes away.
    #[arg(long, default_value_t = 2)]
    pub reconnect_delay: u64,
    /// Command that flips media play/pause, split on whitespace.
    #[arg(long, default_value = "")]
    pub toggle_cmd: String,
    /// Log toggles instead of running a command.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
    #[arg(long, default_value = "")]
    pub log_dir: String,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub hub_url: String,
    pub reconnect_delay: Duration,
    pub toggle_cmd: Option<String>,
    pub dry_run: bool,
    pub log_dir: String,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub_url: DEFAULT_HUB_URL.to_string(),
            reconnect_delay: Duration::from_secs(2),
            toggle_cmd: None,
            dry_run: false,
            log_dir: DEFAULT_LOG_DIR.to_string(),
            debug: false,
        }
    }
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        Self {
            hub_url: resolve_hub_url(&args.hub_url),
            reconnect_delay: Duration::from_secs(args.reconnect_delay),
            toggle_cmd: resolve_toggle_cmd(&args.toggle_cmd),
            dry_run: args.dry_run,
            log_dir: resolve_log_dir(&args.log_dir),
            debug: args.debug || env_true("NUDGE_DEBUG"),
        }
    }

    pub fn parsed_hub_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.hub_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.hub_url.clone(),
            source,
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }
}

pub fn load_config() -> Config {
    Config::from_args(Args::parse())
}

fn resolve_hub_url(url_flag: &str) -> String {
    if !url_flag.trim().is_empty() {
        return url_flag.trim().to_string();
    }
    if let Ok(value) = std::env::var("NUDGE_HUB_URL") {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }
    DEFAULT_HUB_URL.to_string()
}

fn resolve_toggle_cmd(cmd_flag: &str) -> Option<String> {
    if !cmd_flag.trim().is_empty() {
        return Some(cmd_flag.trim().to_string());
    }
    std::env::var("NUDGE_TOGGLE_CMD")
        .ok()
        .filter(|value| !value.trim().is_empty())
}
