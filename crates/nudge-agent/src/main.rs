mod config;
mod connection;
mod error;
mod playback;
mod session;

use config::{load_config, Config};
use nudge_core::logging::{init_logging, LogSettings};
use playback::{CommandToggle, LogToggle, PlaybackToggle};
use session::Session;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

/// Length of one alert minute on the wall clock.
const HOLD_UNIT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    let config = load_config();
    let _log_guard = init_logging(&LogSettings {
        name: "nudge-agent".to_string(),
        log_dir: config.log_dir.clone(),
        debug: config.debug,
        stdout: true,
    });
    let hub_url = match config.parsed_hub_url() {
        Ok(value) => value,
        Err(err) => {
            error!(event = "invalid_hub_url", error = %err);
            std::process::exit(2);
        }
    };

    let session = Session::new(build_toggle(&config), HOLD_UNIT);
    info!(
        event = "agent_start",
        url = %hub_url,
        dry_run = config.dry_run,
        reconnect_delay_secs = config.reconnect_delay.as_secs()
    );

    tokio::select! {
        _ = connection::run_with_reconnect(&hub_url, &session, config.reconnect_delay) => {}
        _ = tokio::signal::ctrl_c() => {
            info!(event = "agent_stop");
        }
    }
    session.shutdown().await;
}

fn build_toggle(config: &Config) -> Arc<dyn PlaybackToggle> {
    if config.dry_run {
        return Arc::new(LogToggle);
    }
    let toggle = match config.toggle_cmd.as_deref() {
        Some(line) => CommandToggle::from_command_line(line).unwrap_or_else(|| {
            warn!(event = "toggle_cmd_blank", fallback = "platform_default");
            CommandToggle::platform_default()
        }),
        None => CommandToggle::platform_default(),
    };
    info!(event = "toggle_ready", program = toggle.program());
    Arc::new(toggle)
}
