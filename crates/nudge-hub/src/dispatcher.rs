use crate::{ledger::ConfirmationLedger, registry::ConnectionRegistry};
use nudge_core::{AlertError, AlertKey, WireMsg};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Acknowledged,
    Cancelled,
    Expired,
}

struct DispatchTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<DispatchOutcome>,
}

impl DispatchTask {
    fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

pub struct AlertDispatcher {
    registry: Arc<ConnectionRegistry>,
    ledger: Arc<ConfirmationLedger>,
    policy: RetryPolicy,
    tasks: Mutex<HashMap<AlertKey, DispatchTask>>,
}

impl AlertDispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        ledger: Arc<ConfirmationLedger>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            ledger,
            policy,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<AlertKey, DispatchTask>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validates `minutes`, resets the ledger entry and starts the retry
    /// loop. Returns as soon as the loop is spawned.
    pub fn raise_alert(&self, minutes: u64) -> Result<AlertKey, AlertError> {
        let key = AlertKey::try_from(minutes)?;

        // The task table guard spans the ledger reset and the handle swap so a
        // concurrent `acknowledge` sees either the old alert or the new one.
        let mut tasks = self.tasks();
        self.ledger.reset(key);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_retry_loop(
            key,
            self.registry.clone(),
            self.ledger.clone(),
            self.policy,
            cancel_rx,
        ));
        let previous = tasks.insert(
            key,
            DispatchTask {
                cancel: cancel_tx,
                handle,
            },
        );
        drop(tasks);

        if let Some(stale) = previous {
            if !stale.handle.is_finished() {
                debug!(event = "dispatch_superseded", minutes = key.minutes());
            }
            stale.cancel();
        }
        info!(
            event = "alert_raised",
            minutes = key.minutes(),
            attempts = self.policy.attempts,
            interval_ms = self.policy.interval.as_millis() as u64
        );
        Ok(key)
    }

    /// Records the acknowledgment and stops the retry loop for `key`.
    /// Returns whether the ledger knew the key.
    pub fn acknowledge(&self, key: AlertKey) -> bool {
        let tasks = self.tasks();
        if !self.ledger.acknowledge(key) {
            drop(tasks);
            debug!(event = "ack_unknown_key", minutes = key.minutes());
            return false;
        }
        if let Some(task) = tasks.get(&key) {
            task.cancel();
        }
        drop(tasks);
        info!(event = "alert_acknowledged", minutes = key.minutes());
        true
    }

    pub fn in_flight(&self) -> Vec<AlertKey> {
        let mut keys: Vec<AlertKey> = self
            .tasks()
            .iter()
            .filter(|(_, task)| !task.handle.is_finished())
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        keys
    }

    /// Detaches the loop for `key` from the table and hands back its join
    /// handle. The detached loop can no longer be cancelled.
    #[cfg(test)]
    pub fn take_handle(&self, key: AlertKey) -> Option<JoinHandle<DispatchOutcome>> {
        self.tasks().remove(&key).map(|task| task.handle)
    }
}

async fn run_retry_loop(
    key: AlertKey,
    registry: Arc<ConnectionRegistry>,
    ledger: Arc<ConfirmationLedger>,
    policy: RetryPolicy,
    mut cancel: watch::Receiver<bool>,
) -> DispatchOutcome {
    let text = WireMsg::Resume {
        minutes: key.minutes(),
    }
    .encode();
    for attempt in 1..=policy.attempts {
        if ledger.is_acknowledged(key) {
            return DispatchOutcome::Acknowledged;
        }
        if *cancel.borrow() {
            return DispatchOutcome::Cancelled;
        }
        let outcomes = registry.broadcast(&text).await;
        debug!(
            event = "alert_broadcast",
            minutes = key.minutes(),
            attempt = attempt,
            recipients = outcomes.len()
        );
        if pause(policy.interval, &mut cancel).await {
            return settle(&ledger, key);
        }
    }
    if ledger.is_acknowledged(key) {
        return DispatchOutcome::Acknowledged;
    }
    warn!(
        event = "alert_expired",
        minutes = key.minutes(),
        attempts = policy.attempts
    );
    DispatchOutcome::Expired
}

/// Sleeps for `interval`, waking early when cancelled. A dropped sender is
/// not a cancellation; the loop then simply runs out its budget.
async fn pause(interval: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);
    let cancelled = tokio::select! {
        _ = &mut sleep => return false,
        changed = cancel.changed() => changed.is_ok() && *cancel.borrow(),
    };
    if cancelled {
        return true;
    }
    sleep.await;
    false
}

fn settle(ledger: &ConfirmationLedger, key: AlertKey) -> DispatchOutcome {
    if ledger.is_acknowledged(key) {
        DispatchOutcome::Acknowledged
    } else {
        DispatchOutcome::Cancelled
    }
}
