use crate::dispatcher::RetryPolicy;
use clap::Parser;
use nudge_core::logging::{env_true, resolve_log_dir, DEFAULT_LOG_DIR};
use std::{net::SocketAddr, time::Duration};
use thiserror::Error;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";

#[derive(Parser, Debug)]
#[command(name = "nudge-hub", about = "Broadcasts resume-playback alerts to connected agents")]
pub struct Args {
    #[arg(long, default_value = "")]
    pub addr: String,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
    /// Broadcast attempts per alert before it is abandoned.
    #[arg(long, default_value_t = 10)]
    pub retry_attempts: u32,
    #[arg(long, default_value_t = 1000)]
    pub retry_interval_ms: u64,
    /// Seconds between keepalive passes; 0 disables the monitor.
    #[arg(long, default_value_t = 30)]
    pub keepalive_interval: u64,
    #[arg(long, default_value_t = 2)]
    pub write_timeout: u64,
    #[arg(long, default_value = "")]
    pub log_dir: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: String,
    pub debug: bool,
    pub retry: RetryPolicy,
    pub keepalive_interval: Duration,
    pub write_timeout: Duration,
    pub log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            debug: false,
            retry: RetryPolicy::default(),
            keepalive_interval: Duration::from_secs(30),
            write_timeout: Duration::from_secs(2),
            log_dir: DEFAULT_LOG_DIR.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid listen address {addr}: {source}")]
    InvalidAddr {
        addr: String,
        source: std::net::AddrParseError,
    },
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        Self {
            addr: resolve_addr(&args.addr),
            debug: args.debug || env_true("NUDGE_DEBUG"),
            retry: RetryPolicy {
                attempts: args.retry_attempts,
                interval: Duration::from_millis(args.retry_interval_ms),
            },
            keepalive_interval: Duration::from_secs(args.keepalive_interval),
            write_timeout: Duration::from_secs(args.write_timeout),
            log_dir: resolve_log_dir(&args.log_dir),
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.addr
            .parse()
            .map_err(|source| ConfigError::InvalidAddr {
                addr: self.addr.clone(),
                source,
            })
    }
}

pub fn load_config() -> Config {
    Config::from_args(Args::parse())
}

fn resolve_addr(addr_flag: &str) -> String {
    if !addr_flag.trim().is_empty() {
        return addr_flag.to_string();
    }
    if let Ok(value) = std::env::var("NUDGE_HUB_ADDR") {
        if !value.trim().is_empty() {
            return value;
        }
    }
    DEFAULT_ADDR.to_string()
}
