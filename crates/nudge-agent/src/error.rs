use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("hub connect failed: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("hub transport error: {0}")]
    Transport(#[source] tungstenite::Error),
    #[error("hub channel closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid hub url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("hub url must use ws:// or wss://, got {0}")]
    UnsupportedScheme(String),
}
