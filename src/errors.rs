//! Error types for the LuckyBet ledger and wagering engine
//!
//! Storage and configuration failures are operator problems and carry
//! detailed context. `WagerError` is the caller-facing taxonomy: every
//! variant except `Internal` is an expected, recoverable rejection that
//! leaves no state behind.

use std::fmt;

/// Root error type for service startup and plumbing
#[derive(Debug)]
pub enum LuckyBetError {
    /// Configuration related errors
    Configuration(ConfigurationError),

    /// Storage system errors
    Storage(StorageError),

    /// Wager, round or settlement rejections
    Wager(WagerError),
}

/// Configuration and validation errors
#[derive(Debug)]
pub enum ConfigurationError {
    ValidationFailed(String),
    InvalidValue { field: String, value: String, reason: String },
    LoadFailed(String),
}

/// Storage system errors
#[derive(Debug, Clone)]
pub enum StorageError {
    DatabaseOpenFailed(String),
    ReadFailed(String),
    WriteFailed(String),
    CorruptedData(String),
}

/// Caller-facing rejection reasons for wagers, round actions and settlement
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WagerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    #[error("Unknown game: {0}")]
    UnknownGame(String),

    #[error("Game is not active: {0}")]
    GameInactive(String),

    #[error("No round is accepting this action")]
    RoundClosed,

    #[error("No active bet in the current round")]
    NoActiveBet,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage or invariant failure; the message is for logs only
    #[error("Internal fault: {0}")]
    Internal(String),
}

impl WagerError {
    /// Stable machine-readable code used in API responses and metrics
    pub fn code(&self) -> &'static str {
        match self {
            WagerError::InvalidInput(_) => "INVALID_INPUT",
            WagerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WagerError::UnknownGame(_) => "UNKNOWN_GAME",
            WagerError::GameInactive(_) => "GAME_INACTIVE",
            WagerError::RoundClosed => "ROUND_CLOSED",
            WagerError::NoActiveBet => "NO_ACTIVE_BET",
            WagerError::Unauthorized(_) => "UNAUTHORIZED",
            WagerError::NotFound(_) => "NOT_FOUND",
            WagerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for LuckyBetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuckyBetError::Configuration(e) => write!(f, "Configuration error: {}", e),
            LuckyBetError::Storage(e) => write!(f, "Storage error: {}", e),
            LuckyBetError::Wager(e) => write!(f, "Wager error: {}", e),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::ValidationFailed(msg) => write!(f, "Validation failed: {}", msg),
            ConfigurationError::InvalidValue { field, value, reason } => {
                write!(f, "Invalid value for {}: '{}' ({})", field, value, reason)
            }
            ConfigurationError::LoadFailed(msg) => write!(f, "Failed to load configuration: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::DatabaseOpenFailed(msg) => write!(f, "Database open failed: {}", msg),
            StorageError::ReadFailed(msg) => write!(f, "Read failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            StorageError::CorruptedData(msg) => write!(f, "Corrupted data: {}", msg),
        }
    }
}

impl std::error::Error for LuckyBetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LuckyBetError::Configuration(e) => Some(e),
            LuckyBetError::Storage(e) => Some(e),
            LuckyBetError::Wager(e) => Some(e),
        }
    }
}

impl std::error::Error for ConfigurationError {}
impl std::error::Error for StorageError {}

impl From<ConfigurationError> for LuckyBetError {
    fn from(e: ConfigurationError) -> Self {
        LuckyBetError::Configuration(e)
    }
}

impl From<StorageError> for LuckyBetError {
    fn from(e: StorageError) -> Self {
        LuckyBetError::Storage(e)
    }
}

impl From<WagerError> for LuckyBetError {
    fn from(e: WagerError) -> Self {
        LuckyBetError::Wager(e)
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::WriteFailed(e.to_string())
    }
}

impl From<rocksdb::Error> for LuckyBetError {
    fn from(e: rocksdb::Error) -> Self {
        LuckyBetError::Storage(e.into())
    }
}

impl From<std::io::Error> for LuckyBetError {
    fn from(e: std::io::Error) -> Self {
        LuckyBetError::Storage(StorageError::ReadFailed(e.to_string()))
    }
}

// Storage faults never leak to callers beyond the generic internal code
impl From<StorageError> for WagerError {
    fn from(e: StorageError) -> Self {
        WagerError::Internal(e.to_string())
    }
}

pub type LuckyBetResult<T> = Result<T, LuckyBetError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type WagerResult<T> = Result<T, WagerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let config_error = ConfigurationError::ValidationFailed("tick".to_string());
        let err = LuckyBetError::Configuration(config_error);

        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("tick"));
    }

    #[test]
    fn test_insufficient_funds_details() {
        let err = WagerError::InsufficientFunds {
            requested: 5_000,
            available: 3_000,
        };

        assert!(err.to_string().contains("requested 5000"));
        assert!(err.to_string().contains("available 3000"));
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    }

    #[test]
    fn test_storage_error_becomes_internal() {
        let wager: WagerError = StorageError::WriteFailed("disk".to_string()).into();
        assert!(matches!(wager, WagerError::Internal(_)));
        assert_eq!(wager.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_error_source() {
        let err = LuckyBetError::Wager(WagerError::RoundClosed);
        assert!(err.source().is_some());
    }
}
