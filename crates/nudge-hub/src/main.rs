mod config;
mod dispatcher;
mod http;
mod hub;
mod keepalive;
mod ledger;
mod registry;

use config::load_config;
use hub::Hub;
use nudge_core::logging::{init_logging, LogSettings};
use std::{future::Future, io, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = load_config();
    let _log_guard = init_logging(&LogSettings {
        name: "nudge-hub".to_string(),
        log_dir: config.log_dir.clone(),
        debug: config.debug,
        stdout: true,
    });
    let addr = match config.socket_addr() {
        Ok(value) => value,
        Err(err) => {
            error!(event = "invalid_addr", error = %err);
            std::process::exit(2);
        }
    };

    let listener = match TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!(event = "hub_error", error = %err, addr = %addr);
            std::process::exit(1);
        }
    };

    let hub = Arc::new(Hub::new(config.clone()));
    info!(
        event = "hub_start",
        addr = %addr,
        retry_attempts = config.retry.attempts,
        keepalive_secs = config.keepalive_interval.as_secs()
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!(event = "hub_stop");
    };
    if let Err(err) = serve(listener, hub, shutdown).await {
        error!(event = "hub_error", error = %err);
    }
}

/// Starts the keepalive monitor and serves HTTP plus `/ws` until `shutdown`
/// resolves.
async fn serve<F>(listener: TcpListener, hub: Arc<Hub>, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let keepalive =
        keepalive::spawn_keepalive(hub.registry.clone(), hub.config.keepalive_interval);
    let app = http::build_router(hub);
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await;
    if let Some(handle) = keepalive {
        handle.abort();
    }
    result
}
