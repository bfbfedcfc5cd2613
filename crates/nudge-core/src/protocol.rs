use std::fmt;
use thiserror::Error;

/// Upper bound on a single inbound text frame. Every valid message is a
/// handful of bytes, anything larger is dropped unparsed.
pub const MAX_FRAME_BYTES: usize = 1024;

pub const PING: &str = "ping";
pub const PONG: &str = "pong";
const RESUME_PREFIX: &str = "resume";
const ACK_PREFIX: &str = "ack";

/// Text frames exchanged between hub and agent.
///
/// ```text
/// hub   -> agent  ping
/// agent -> hub    pong
/// hub   -> agent  resume,<minutes>
/// agent -> hub    ack,<minutes>
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMsg {
    Ping,
    Pong,
    Resume { minutes: u64 },
    Ack { minutes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,
    #[error("unknown message: {0}")]
    UnknownMessage(String),
    #[error("invalid minutes field: {0}")]
    InvalidMinutes(String),
}

impl WireMsg {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(ProtocolError::Empty);
        }
        match text {
            PING => return Ok(WireMsg::Ping),
            PONG => return Ok(WireMsg::Pong),
            _ => {}
        }
        let Some((kind, field)) = text.split_once(',') else {
            return Err(ProtocolError::UnknownMessage(text.to_string()));
        };
        let minutes = || parse_minutes(field);
        match kind.trim() {
            RESUME_PREFIX => Ok(WireMsg::Resume { minutes: minutes()? }),
            ACK_PREFIX => Ok(WireMsg::Ack { minutes: minutes()? }),
            _ => Err(ProtocolError::UnknownMessage(text.to_string())),
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WireMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireMsg::Ping => f.write_str(PING),
            WireMsg::Pong => f.write_str(PONG),
            WireMsg::Resume { minutes } => write!(f, "{RESUME_PREFIX},{minutes}"),
            WireMsg::Ack { minutes } => write!(f, "{ACK_PREFIX},{minutes}"),
        }
    }
}

fn parse_minutes(field: &str) -> Result<u64, ProtocolError> {
    let cleaned = field.trim();
    if cleaned.is_empty() || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidMinutes(field.to_string()));
    }
    cleaned
        .parse::<u64>()
        .map_err(|_| ProtocolError::InvalidMinutes(field.to_string()))
}
