use crate::{hub::Hub, ledger::LatestAlert};
use axum::{
    extract::{ConnectInfo, Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use nudge_core::{AlertKey, PERMITTED_MINUTES};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tracing::warn;

const PAGE_STYLE: &str = "body { text-align: center; font-family: Arial, sans-serif; background-color: #f4f4f4; } \
.container { margin-top: 100px; } \
.button { display: inline-block; padding: 10px 20px; margin: 10px; font-size: 20px; background-color: #4CAF50; color: white; text-decoration: none; border-radius: 5px; } \
.button:hover { background-color: #45a049; }";

pub fn build_router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/alert/:minutes", get(trigger_alert))
        .route("/status", get(status))
        .route("/health", get(|| async { "ok" }))
        .route("/ws", get(ws_handler))
        .with_state(hub)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(hub): State<Arc<Hub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        hub.handle_socket(socket, addr).await;
    })
}

async fn index() -> Html<String> {
    let buttons: String = PERMITTED_MINUTES
        .iter()
        .map(|minutes| {
            let label = if *minutes == 1 { "Minute" } else { "Minutes" };
            format!("<a href=\"/alert/{minutes}\" class=\"button\">{minutes} {label}</a>")
        })
        .collect::<Vec<_>>()
        .join("\n");
    Html(page(
        "Nudge Alert Hub",
        &format!(
            "<h2>Nudge alert hub</h2>\n<p>Pick how long connected agents should resume playback:</p>\n{buttons}"
        ),
    ))
}

async fn trigger_alert(Path(minutes): Path<u64>, State(hub): State<Arc<Hub>>) -> Response {
    match hub.dispatcher.raise_alert(minutes) {
        Ok(key) => Html(page(
            "Alert Sent",
            &format!(
                "<h2>Request received for {key} minute(s)</h2>\n<p>Connected agents will resume playback and pause again afterwards.</p>\n<p><a href=\"/\">Go back</a></p>"
            ),
        ))
        .into_response(),
        Err(err) => {
            warn!(event = "alert_rejected", minutes = minutes, error = %err);
            (
                StatusCode::BAD_REQUEST,
                Html(page(
                    "Invalid Duration",
                    &format!("<h2 style=\"color:red;\">{err}</h2>\n<p><a href=\"/\">Go back</a></p>"),
                )),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LedgerEntry {
    pub minutes: AlertKey,
    pub acknowledged: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub latest: Option<LatestAlert>,
    pub ledger: Vec<LedgerEntry>,
    pub in_flight: Vec<AlertKey>,
    pub connections: usize,
}

async fn status(State(hub): State<Arc<Hub>>) -> Json<StatusReport> {
    let ledger = hub
        .ledger
        .snapshot()
        .into_iter()
        .map(|(minutes, acknowledged)| LedgerEntry {
            minutes,
            acknowledged,
        })
        .collect();
    Json(StatusReport {
        latest: hub.ledger.latest(),
        ledger,
        in_flight: hub.dispatcher.in_flight(),
        connections: hub.registry.len().await,
    })
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<html>\n<head>\n<title>{title}</title>\n<style>{PAGE_STYLE}</style>\n</head>\n<body>\n<div class=\"container\">\n{body}\n</div>\n</body>\n</html>\n"
    )
}
