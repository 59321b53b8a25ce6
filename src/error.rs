//! Crate-level error types.
//!
//! Every failure is classified so callers can branch on *where* a cycle
//! broke without matching on message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::zkteco::ZkError;

/// Result type alias for pipeline operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Device unreachable, or a read failed even after the reconnect.
    #[error("Device connection error: {0}")]
    Connection(String),

    /// A device record could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The remote server never answered 200 within the attempt budget.
    #[error("Delivery failed after {attempts} attempt(s): {reason}")]
    Delivery { attempts: u32, reason: String },

    /// Aggregation could not produce a payload.
    #[error("Formatting failed: {0}")]
    Formatting(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A sync cycle is already running.
    #[error("Sync already in progress")]
    Busy,
}

/// Failure classification exposed on outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connection,
    Parse,
    Delivery,
    Formatting,
    Config,
    Busy,
}

impl SyncError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Connection(_) => FailureKind::Connection,
            SyncError::Parse(_) => FailureKind::Parse,
            SyncError::Delivery { .. } => FailureKind::Delivery,
            SyncError::Formatting(_) => FailureKind::Formatting,
            SyncError::Config(_) => FailureKind::Config,
            SyncError::Busy => FailureKind::Busy,
        }
    }
}

impl From<ZkError> for SyncError {
    fn from(err: ZkError) -> Self {
        match err {
            ZkError::Malformed(what) => SyncError::Parse(what.to_string()),
            other => SyncError::Connection(friendly_message(&other.to_string())),
        }
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}

/// Rewrite low-level socket errors into operator-facing text.
pub fn friendly_message(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") {
        return format!("Connection timeout - device may be unreachable or IP/port incorrect ({error})");
    }
    if lower.contains("refused") {
        return format!("Connection refused - check if device is powered on and network accessible ({error})");
    }
    if lower.contains("unreachable") {
        return format!("Host unreachable - check network configuration ({error})");
    }
    if lower.contains("auth") {
        return format!("Authentication failed - check communication key ({error})");
    }

    error.to_string()
}
