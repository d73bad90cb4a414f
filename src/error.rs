use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// A reference feed could not be loaded. Fatal: the simulation never starts.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{feed} feed is empty")]
    EmptyFeed { feed: &'static str },
}

/// A player request that was rejected. The state is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransactionError {
    #[error("Not enough cash: need ${needed:.2}, have ${available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },
    #[error("Invalid amount! You have {owned} {name}(s).")]
    InsufficientInventory { name: String, owned: usize },
    #[error("Insufficient coin: have {available:.8}")]
    InsufficientCoin { available: f64 },
    #[error("Invalid amount")]
    InvalidQuantity,
    #[error("{0} is not available for purchase")]
    HardwareUnavailable(String),
    #[error("Unknown hardware: {0}")]
    UnknownHardware(String),
    #[error("You do not own any {0}")]
    NotOwned(String),
    #[error("The coin market is not available yet!")]
    MarketUnavailable,
    #[error("Mining pools are not yet available!")]
    PoolsLocked,
    #[error("Already in a mining pool")]
    AlreadyPooled,
    #[error("Not in a mining pool")]
    NotPooled,
    #[error("The session is over")]
    SessionOver,
}

/// An unexpected fault while advancing time. The session is reset.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("calendar overflow advancing past {0}")]
    CalendarOverflow(NaiveDate),
}

/// Persisted payload failures. Logged; never fatal.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save store i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("save payload encoding: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("invalid save version: expected 0x{expected:016X}, got 0x{found:016X}")]
    Version { expected: u64, found: u64 },
    #[error("save blob is truncated")]
    Truncated,
    #[error("checksum verification failed")]
    Checksum,
}

/// Clamps a derived numeric value to 0 when it is NaN or infinite.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_non_finite() {
        assert_eq!(sanitize(f64::NAN), 0.0);
        assert_eq!(sanitize(f64::INFINITY), 0.0);
        assert_eq!(sanitize(f64::NEG_INFINITY), 0.0);
        assert_eq!(sanitize(12.5), 12.5);
    }

    #[test]
    fn test_rejection_messages_are_user_facing() {
        let err = TransactionError::InsufficientInventory {
            name: "CPU".to_string(),
            owned: 2,
        };
        assert_eq!(err.to_string(), "Invalid amount! You have 2 CPU(s).");
        assert_eq!(
            TransactionError::MarketUnavailable.to_string(),
            "The coin market is not available yet!"
        );
    }
}
