use crate::{
    config::Config,
    dispatcher::AlertDispatcher,
    ledger::ConfirmationLedger,
    registry::{Connection, ConnectionRegistry},
};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use nudge_core::{AlertKey, WireMsg, MAX_FRAME_BYTES};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const OUTBOUND_QUEUE: usize = 64;

/// Process-wide hub state, built once in `main` and shared with every
/// handler.
pub struct Hub {
    pub config: Config,
    pub registry: Arc<ConnectionRegistry>,
    pub ledger: Arc<ConfirmationLedger>,
    pub dispatcher: AlertDispatcher,
}

impl Hub {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let ledger = Arc::new(ConfirmationLedger::new());
        let dispatcher = AlertDispatcher::new(registry.clone(), ledger.clone(), config.retry);
        Self {
            config,
            registry,
            ledger,
            dispatcher,
        }
    }

    pub async fn handle_text(&self, conn_id: &str, text: &str) {
        if text.len() > MAX_FRAME_BYTES {
            warn!(event = "message_too_large", conn_id = %conn_id, size = text.len());
            return;
        }
        if self.config.debug {
            debug!(event = "message_received", conn_id = %conn_id, raw = %text);
        }
        match WireMsg::parse(text) {
            Ok(WireMsg::Pong) => {
                debug!(event = "pong", conn_id = %conn_id);
            }
            Ok(WireMsg::Ack { minutes }) => match AlertKey::try_from(minutes) {
                Ok(key) => {
                    self.dispatcher.acknowledge(key);
                }
                Err(err) => {
                    debug!(event = "ack_invalid_key", conn_id = %conn_id, error = %err);
                }
            },
            Ok(other) => {
                warn!(event = "unexpected_message", conn_id = %conn_id, message = %other);
            }
            Err(err) => {
                warn!(event = "unknown_message", conn_id = %conn_id, error = %err);
            }
        }
    }

    pub async fn handle_socket(self: Arc<Self>, socket: WebSocket, remote: SocketAddr) {
        let (mut ws_sender, mut ws_receiver) = socket.split();
        let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
        let write_timeout = self.config.write_timeout;
        let mut write_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match tokio::time::timeout(write_timeout, ws_sender.send(msg)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) | Err(_) => return,
                }
            }
        });

        let conn = Arc::new(Connection::new(self.registry.next_conn_id(), tx));
        info!(event = "handshake_ok", conn_id = %conn.conn_id(), remote = %remote);
        self.registry.register(conn.clone()).await;

        let mut writer_done = false;
        let reason = loop {
            tokio::select! {
                _ = &mut write_task, if !writer_done => {
                    writer_done = true;
                    warn!(event = "write_error", conn_id = %conn.conn_id());
                    break "write_error";
                }
                next = ws_receiver.next() => {
                    let msg = match next {
                        Some(Ok(value)) => value,
                        Some(Err(err)) => {
                            warn!(event = "read_error", conn_id = %conn.conn_id(), error = %err);
                            break "read_error";
                        }
                        None => break "disconnect",
                    };
                    match msg {
                        Message::Text(text) => self.handle_text(conn.conn_id(), &text).await,
                        Message::Close(_) => {
                            info!(event = "client_close", conn_id = %conn.conn_id());
                            break "disconnect";
                        }
                        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
                    }
                }
            }
        };

        self.registry.unregister(conn.conn_id(), reason).await;
        drop(conn);
        if !writer_done {
            let _ = write_task.await;
        }
    }
}
