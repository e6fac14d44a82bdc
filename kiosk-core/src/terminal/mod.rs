//! Terminal status channel
//!
//! Boundary with the payment terminal embedded in the kiosk shell:
//! - Outbound: fire-and-forget order submission
//! - Inbound: asynchronous status callbacks `(kind, code, detail)`
//!
//! The result of a submission never comes back as a return value; it shows
//! up later as a [`TerminalEvent`] on the screen's [`StatusSubscription`].

mod bridge;
mod sim;

use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::draft::CheckoutDraft;

pub use bridge::{HostBridge, HostRequest};
pub use sim::{Script, ScriptStep, SimulatedTerminal, SubmissionLog};

/// Status/error category reported by the terminal
///
/// Numeric values are the codes the kiosk host uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    PaymentConnecting,
    PaymentPending,
    PaymentPrinting,
    PaymentSuccess,
    ValidationError,
    PaymentError,
    OrderSaveError,
    EcrError,
    ActionResponse,
    /// Not part of the known taxonomy; swallowed by the state machine
    Other(u16),
}

impl StatusKind {
    /// Wire code
    pub fn code(&self) -> u16 {
        match self {
            Self::PaymentConnecting => 100,
            Self::PaymentPending => 101,
            Self::PaymentPrinting => 102,
            Self::PaymentSuccess => 200,
            Self::ValidationError => 400,
            Self::PaymentError => 500,
            Self::OrderSaveError => 501,
            Self::EcrError => 502,
            Self::ActionResponse => 503,
            Self::Other(code) => *code,
        }
    }

    /// Parse the SCREAMING_SNAKE name some hosts send instead of the code
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PAYMENT_CONNECTING" => Some(Self::PaymentConnecting),
            "PAYMENT_PENDING" => Some(Self::PaymentPending),
            "PAYMENT_PRINTING" => Some(Self::PaymentPrinting),
            "PAYMENT_SUCCESS" => Some(Self::PaymentSuccess),
            "VALIDATION_ERROR" => Some(Self::ValidationError),
            "PAYMENT_ERROR" => Some(Self::PaymentError),
            "ORDER_SAVE_ERROR" => Some(Self::OrderSaveError),
            "ECR_ERROR" => Some(Self::EcrError),
            "ACTION_RESPONSE" => Some(Self::ActionResponse),
            _ => None,
        }
    }

    /// Error kinds that put the screen in the error state
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationError
                | Self::PaymentError
                | Self::OrderSaveError
                | Self::EcrError
                | Self::ActionResponse
        )
    }
}

impl From<u16> for StatusKind {
    fn from(code: u16) -> Self {
        match code {
            100 => Self::PaymentConnecting,
            101 => Self::PaymentPending,
            102 => Self::PaymentPrinting,
            200 => Self::PaymentSuccess,
            400 => Self::ValidationError,
            500 => Self::PaymentError,
            501 => Self::OrderSaveError,
            502 => Self::EcrError,
            503 => Self::ActionResponse,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaymentConnecting => write!(f, "PAYMENT_CONNECTING"),
            Self::PaymentPending => write!(f, "PAYMENT_PENDING"),
            Self::PaymentPrinting => write!(f, "PAYMENT_PRINTING"),
            Self::PaymentSuccess => write!(f, "PAYMENT_SUCCESS"),
            Self::ValidationError => write!(f, "VALIDATION_ERROR"),
            Self::PaymentError => write!(f, "PAYMENT_ERROR"),
            Self::OrderSaveError => write!(f, "ORDER_SAVE_ERROR"),
            Self::EcrError => write!(f, "ECR_ERROR"),
            Self::ActionResponse => write!(f, "ACTION_RESPONSE"),
            Self::Other(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

/// One status notification from the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalEvent {
    pub kind: StatusKind,
    /// Terminal-specific code, used as the localisation key
    pub code: String,
    /// Free text substituted into the localised template
    pub detail: String,
    /// Submission this event answers, when the host echoes it
    pub submission: Option<u64>,
}

impl TerminalEvent {
    pub fn new(kind: StatusKind, code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            detail: detail.into(),
            submission: None,
        }
    }

    /// Tag the event with the submission it answers
    pub fn for_submission(mut self, submission: u64) -> Self {
        self.submission = Some(submission);
        self
    }
}

/// Terminal channel errors
#[derive(Debug, Error)]
pub enum ChannelError {
    /// No terminal host (running outside the kiosk shell)
    #[error("Terminal host not available")]
    Unavailable,

    /// Host went away while sending
    #[error("Terminal host disconnected")]
    Closed,

    /// Malformed host message
    #[error("Invalid host message: {0}")]
    InvalidMessage(#[from] serde_json::Error),
}

/// Contract the kiosk expects from the terminal integration
pub trait TerminalChannel: Send + Sync {
    /// Check whether the terminal host is reachable
    fn is_available(&self) -> bool;

    /// Send the draft to the terminal; returns as soon as the request is handed over
    fn submit(&self, draft: &CheckoutDraft, submission: u64) -> Result<(), ChannelError>;

    /// Install the status handler for one transaction screen
    ///
    /// Only one handler is live at a time. Dropping the subscription restores
    /// the no-op handler.
    fn subscribe(&self) -> Result<StatusSubscription, ChannelError>;
}

/// Live status handler for one transaction screen
///
/// Releases the handler slot when dropped.
pub struct StatusSubscription {
    events: mpsc::UnboundedReceiver<TerminalEvent>,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl StatusSubscription {
    /// Wrap a receiver and the action that uninstalls the handler
    pub fn new(
        events: mpsc::UnboundedReceiver<TerminalEvent>,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            events,
            release: Some(Box::new(release)),
        }
    }

    /// Next status event; `None` once the channel side is gone
    pub async fn recv(&mut self) -> Option<TerminalEvent> {
        self.events.recv().await
    }
}

impl fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
