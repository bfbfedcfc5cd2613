use crate::registry::{ConnectionRegistry, SendOutcome};
use nudge_core::WireMsg;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Pings every registered connection once and evicts the ones whose send
/// fails. Pongs are not awaited; only a failed send marks a connection dead.
pub async fn run_pass(registry: &ConnectionRegistry) -> usize {
    let probe = WireMsg::Ping.encode();
    let mut evicted = 0;
    for conn in registry.snapshot().await {
        if conn.send_text(&probe).await == SendOutcome::Failed {
            warn!(event = "ping_failed", conn_id = %conn.conn_id());
            if registry.unregister(conn.conn_id(), "ping_failed").await {
                evicted += 1;
            }
        }
    }
    evicted
}

pub fn spawn_keepalive(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; nothing is registered yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = run_pass(&registry).await;
            let remaining = registry.len().await;
            debug!(
                event = "keepalive_pass",
                evicted = evicted,
                connections = remaining
            );
        }
    }))
}
