use crate::{error::SessionError, session::Session};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};
use url::Url;

const OUTBOUND_QUEUE: usize = 32;

/// Connects, runs the session until the channel goes away, waits
/// `reconnect_delay` and starts over. Never returns.
pub async fn run_with_reconnect(hub_url: &Url, session: &Session, reconnect_delay: Duration) {
    loop {
        match run_connection(hub_url, session).await {
            Ok(()) => info!(event = "hub_closed", url = %hub_url),
            Err(err) => warn!(event = "hub_connection_lost", url = %hub_url, error = %err),
        }
        info!(
            event = "hub_reconnect_wait",
            delay_ms = reconnect_delay.as_millis() as u64
        );
        tokio::time::sleep(reconnect_delay).await;
    }
}

/// One connection lifetime. `Ok` when the hub closed the socket cleanly.
pub async fn run_connection(hub_url: &Url, session: &Session) -> Result<(), SessionError> {
    let (ws, _) = connect_async(hub_url.as_str())
        .await
        .map_err(SessionError::Connect)?;
    info!(event = "hub_connected", url = %hub_url);

    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let mut write_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            sink.send(Message::Text(text)).await?;
        }
        sink.close().await
    });

    let result = loop {
        tokio::select! {
            written = &mut write_task => {
                break match written {
                    Ok(Err(err)) => Err(SessionError::Transport(err)),
                    _ => Err(SessionError::Closed),
                };
            }
            next = stream.next() => match next {
                Some(Ok(Message::Text(text))) => {
                    if let Err(err) = session.handle_text(&text, &tx).await {
                        break Err(err);
                    }
                }
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(err)) => break Err(SessionError::Transport(err)),
            },
        }
    };
    write_task.abort();
    result
}
