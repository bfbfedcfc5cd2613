use chrono::{DateTime, Utc};
use nudge_core::AlertKey;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatestAlert {
    pub key: AlertKey,
    pub issued_at: DateTime<Utc>,
    pub acknowledged: bool,
}

#[derive(Default)]
struct LedgerState {
    entries: BTreeMap<AlertKey, bool>,
    latest: Option<(AlertKey, DateTime<Utc>)>,
}

/// Per-key "acknowledged" flags. Every operation takes the one lock, so a
/// reset or acknowledgment is never observed half-applied.
#[derive(Default)]
pub struct ConfirmationLedger {
    state: Mutex<LedgerState>,
}

impl ConfirmationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn reset(&self, key: AlertKey) {
        let mut state = self.lock();
        state.entries.insert(key, false);
        state.latest = Some((key, Utc::now()));
    }

    /// Marks `key` acknowledged. Keys that were never dispatched are left
    /// untouched and reported as `false`.
    pub fn acknowledge(&self, key: AlertKey) -> bool {
        let mut state = self.lock();
        match state.entries.get_mut(&key) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    pub fn is_acknowledged(&self, key: AlertKey) -> bool {
        self.lock().entries.get(&key).copied().unwrap_or(false)
    }

    pub fn snapshot(&self) -> Vec<(AlertKey, bool)> {
        self.lock()
            .entries
            .iter()
            .map(|(key, flag)| (*key, *flag))
            .collect()
    }

    pub fn latest(&self) -> Option<LatestAlert> {
        let state = self.lock();
        let (key, issued_at) = state.latest?;
        Some(LatestAlert {
            key,
            issued_at,
            acknowledged: state.entries.get(&key).copied().unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_read_as_unacknowledged() {
        let ledger = ConfirmationLedger::new();
        for key in AlertKey::ALL {
            assert!(!ledger.is_acknowledged(key));
        }
        assert!(ledger.snapshot().is_empty());
        assert!(ledger.latest().is_none());
    }

    #[test]
    fn acknowledge_for_unknown_key_is_absorbed() {
        let ledger = ConfirmationLedger::new();
        assert!(!ledger.acknowledge(AlertKey::Five));
        assert!(!ledger.is_acknowledged(AlertKey::Five));
        assert!(ledger.snapshot().is_empty());
    }

    #[test]
    fn reset_then_acknowledge() {
        let ledger = ConfirmationLedger::new();
        ledger.reset(AlertKey::One);
        assert!(!ledger.is_acknowledged(AlertKey::One));
        assert!(ledger.acknowledge(AlertKey::One));
        assert!(ledger.is_acknowledged(AlertKey::One));

        ledger.reset(AlertKey::One);
        assert!(!ledger.is_acknowledged(AlertKey::One));
    }

    #[test]
    fn acknowledge_and_reset_are_idempotent() {
        let ledger = ConfirmationLedger::new();
        ledger.reset(AlertKey::Two);
        ledger.reset(AlertKey::Two);
        assert!(!ledger.is_acknowledged(AlertKey::Two));
        ledger.acknowledge(AlertKey::Two);
        ledger.acknowledge(AlertKey::Two);
        assert!(ledger.is_acknowledged(AlertKey::Two));
    }

    #[test]
    fn snapshot_reflects_current_state_in_key_order() {
        let ledger = ConfirmationLedger::new();
        ledger.reset(AlertKey::Ten);
        ledger.reset(AlertKey::One);
        assert_eq!(
            ledger.snapshot(),
            vec![(AlertKey::One, false), (AlertKey::Ten, false)]
        );
        ledger.acknowledge(AlertKey::Ten);
        assert_eq!(
            ledger.snapshot(),
            vec![(AlertKey::One, false), (AlertKey::Ten, true)]
        );
    }

    #[test]
    fn latest_tracks_most_recent_reset() {
        let ledger = ConfirmationLedger::new();
        ledger.reset(AlertKey::Five);
        ledger.acknowledge(AlertKey::Five);
        let latest = ledger.latest().expect("latest");
        assert_eq!(latest.key, AlertKey::Five);
        assert!(latest.acknowledged);

        ledger.reset(AlertKey::Two);
        let latest = ledger.latest().expect("latest");
        assert_eq!(latest.key, AlertKey::Two);
        assert!(!latest.acknowledged);
    }
}
