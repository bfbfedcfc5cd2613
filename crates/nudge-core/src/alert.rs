use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Durations, in minutes, that an alert may request.
pub const PERMITTED_MINUTES: [u64; 4] = [1, 2, 5, 10];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    #[error("invalid duration {0}: choose 1, 2, 5, or 10 minutes")]
    InvalidDuration(u64),
}

/// A permitted alert duration. Doubles as the key of the confirmation ledger
/// and of the in-flight dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u64", try_from = "u64")]
pub enum AlertKey {
    One,
    Two,
    Five,
    Ten,
}

impl AlertKey {
    pub const ALL: [AlertKey; 4] = [AlertKey::One, AlertKey::Two, AlertKey::Five, AlertKey::Ten];

    pub fn minutes(self) -> u64 {
        match self {
            AlertKey::One => 1,
            AlertKey::Two => 2,
            AlertKey::Five => 5,
            AlertKey::Ten => 10,
        }
    }
}

impl TryFrom<u64> for AlertKey {
    type Error = AlertError;

    fn try_from(minutes: u64) -> Result<Self, Self::Error> {
        match minutes {
            1 => Ok(AlertKey::One),
            2 => Ok(AlertKey::Two),
            5 => Ok(AlertKey::Five),
            10 => Ok(AlertKey::Ten),
            other => Err(AlertError::InvalidDuration(other)),
        }
    }
}

impl From<AlertKey> for u64 {
    fn from(key: AlertKey) -> Self {
        key.minutes()
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.minutes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permitted_minutes_map_to_keys() {
        for minutes in PERMITTED_MINUTES {
            let key = AlertKey::try_from(minutes).expect("permitted");
            assert_eq!(key.minutes(), minutes);
            assert_eq!(key.to_string(), minutes.to_string());
        }
        assert_eq!(AlertKey::ALL.len(), PERMITTED_MINUTES.len());
    }

    #[test]
    fn other_minutes_are_rejected() {
        for minutes in [0, 3, 4, 6, 9, 11, 60, u64::MAX] {
            assert_eq!(
                AlertKey::try_from(minutes),
                Err(AlertError::InvalidDuration(minutes))
            );
        }
    }

    #[test]
    fn serializes_as_plain_minutes() {
        let json = serde_json::to_string(&AlertKey::Ten).expect("encode");
        assert_eq!(json, "10");
        let key: AlertKey = serde_json::from_str("2").expect("decode");
        assert_eq!(key, AlertKey::Two);
        assert!(serde_json::from_str::<AlertKey>("7").is_err());
    }
}
