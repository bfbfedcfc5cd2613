use crate::{error::SessionError, playback::PlaybackToggle};
use chrono::{Duration as ChronoDuration, Local};
use nudge_core::WireMsg;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing { minutes: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeOutcome {
    Started,
    AlreadyPlaying,
}

struct HoldTimer {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct SessionInner {
    state: PlaybackState,
    hold: Option<HoldTimer>,
}

/// Playback session for the whole process. It outlives individual hub
/// connections, so a hold started on one connection finishes on schedule
/// even if the agent reconnects in between.
#[derive(Clone)]
pub struct Session {
    toggle: Arc<dyn PlaybackToggle>,
    hold_unit: Duration,
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    /// `hold_unit` is the length of one alert minute.
    pub fn new(toggle: Arc<dyn PlaybackToggle>, hold_unit: Duration) -> Self {
        Self {
            toggle,
            hold_unit,
            inner: Arc::new(Mutex::new(SessionInner {
                state: PlaybackState::Idle,
                hold: None,
            })),
        }
    }

    #[cfg(test)]
    pub async fn state(&self) -> PlaybackState {
        self.inner.lock().await.state
    }

    /// Reacts to one inbound frame. Replies are queued on `out`; an error
    /// means the connection's writer is gone.
    pub async fn handle_text(
        &self,
        text: &str,
        out: &mpsc::Sender<String>,
    ) -> Result<(), SessionError> {
        match WireMsg::parse(text) {
            Ok(WireMsg::Ping) => reply(out, WireMsg::Pong).await,
            Ok(WireMsg::Resume { minutes }) => {
                // The ack goes out whatever the current state, so the hub
                // stops retrying even when this resume is ignored.
                reply(out, WireMsg::Ack { minutes }).await?;
                self.resume(minutes).await;
                Ok(())
            }
            Ok(other) => {
                warn!(event = "unexpected_message", message = %other);
                Ok(())
            }
            Err(err) => {
                warn!(event = "unknown_message", error = %err);
                Ok(())
            }
        }
    }

    pub async fn resume(&self, minutes: u64) -> ResumeOutcome {
        let mut inner = self.inner.lock().await;
        if let PlaybackState::Playing { minutes: active } = inner.state {
            info!(event = "resume_ignored", minutes = minutes, active_minutes = active);
            return ResumeOutcome::AlreadyPlaying;
        }

        inner.state = PlaybackState::Playing { minutes };
        self.toggle.toggle_playback();
        let hold = self.hold_for(minutes);
        let pause_at = ChronoDuration::from_std(hold)
            .ok()
            .and_then(|delta| Local::now().checked_add_signed(delta))
            .map(|at| at.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        info!(event = "playback_resumed", minutes = minutes, pause_at = %pause_at);

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = tokio::spawn(run_hold(
            self.inner.clone(),
            self.toggle.clone(),
            minutes,
            hold,
            cancel_rx,
        ));
        inner.hold = Some(HoldTimer {
            cancel: cancel_tx,
            handle,
        });
        ResumeOutcome::Started
    }

    /// Cuts a running hold short and pauses playback, leaving the session
    /// `Idle`. No-op when idle.
    pub async fn shutdown(&self) {
        let hold = self.inner.lock().await.hold.take();
        if let Some(timer) = hold {
            let _ = timer.cancel.send(());
            let _ = timer.handle.await;
        }
    }

    fn hold_for(&self, minutes: u64) -> Duration {
        let units = u32::try_from(minutes).unwrap_or(u32::MAX);
        self.hold_unit.saturating_mul(units)
    }
}

async fn run_hold(
    inner: Arc<Mutex<SessionInner>>,
    toggle: Arc<dyn PlaybackToggle>,
    minutes: u64,
    hold: Duration,
    cancel: oneshot::Receiver<()>,
) {
    let cut_short = tokio::select! {
        _ = tokio::time::sleep(hold) => false,
        _ = cancel => true,
    };
    let mut inner = inner.lock().await;
    if inner.state == PlaybackState::Idle {
        return;
    }
    toggle.toggle_playback();
    inner.state = PlaybackState::Idle;
    inner.hold = None;
    if cut_short {
        info!(event = "playback_paused", minutes = minutes, reason = "shutdown");
    } else {
        info!(event = "playback_paused", minutes = minutes);
    }
    debug!(event = "session_idle");
}

async fn reply(out: &mpsc::Sender<String>, msg: WireMsg) -> Result<(), SessionError> {
    out.send(msg.encode())
        .await
        .map_err(|_| SessionError::Closed)
}
