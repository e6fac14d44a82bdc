//! Error types for the kiosk core

use thiserror::Error;

use crate::config::ConfigError;
use crate::device_number::DeviceNumberError;
use crate::payment::FlowError;
use crate::terminal::ChannelError;
use crate::transaction::TransactionError;

/// Kiosk error types
#[derive(Debug, Error)]
pub enum KioskError {
    /// Keypad input rejected
    #[error("Device number: {0}")]
    DeviceNumber(#[from] DeviceNumberError),

    /// Payment flow step error
    #[error("Payment flow: {0}")]
    Flow(#[from] FlowError),

    /// Terminal channel error
    #[error("Terminal channel: {0}")]
    Channel(#[from] ChannelError),

    /// Transaction screen error
    #[error("Transaction: {0}")]
    Transaction(#[from] TransactionError),

    /// Invalid configuration
    #[error("Config: {0}")]
    Config(#[from] ConfigError),

    /// IO error (locale files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (locale files, host messages)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for kiosk operations
pub type KioskResult<T> = Result<T, KioskError>;
