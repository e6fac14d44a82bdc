//! Transaction status screen
//!
//! - [`TransactionMachine`]: pure state machine over terminal events
//! - [`TransactionScreen`]: async driver (subscription, settle delay, timeout)

mod machine;
mod screen;

use thiserror::Error;

use crate::terminal::ChannelError;

pub use machine::{
    ECR_NOT_CONNECTED, EventOutcome, FailureSource, LocalFault, PaymentFailure, RetryOutcome,
    TransactionMachine, TransactionState, UserAction,
};
pub use screen::{ScreenExit, ScreenHandle, TransactionScreen};

/// Transaction screen errors
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Action not offered in the current state
    #[error("Action {action} not allowed while {state}")]
    ActionNotAllowed {
        action: UserAction,
        state: &'static str,
    },

    /// Screen task has exited
    #[error("Transaction screen closed")]
    ScreenClosed,

    /// Status handler was taken over by another screen
    #[error("Status subscription lost")]
    SubscriptionLost,

    /// Could not install the status handler
    #[error("Terminal channel: {0}")]
    Channel(#[from] ChannelError),
}
