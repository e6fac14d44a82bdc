//! Transaction state machine
//!
//! Pure state: no timers, no channel. The screen driver feeds it terminal
//! events, local faults and user actions, and reads back the derived state.
//!
//! The visible state is a function of `(last observation, is_retrying)`:
//!
//! | Observation | State |
//! |---|---|
//! | none, or retrying | Connecting |
//! | PAYMENT_CONNECTING | Connecting |
//! | PAYMENT_PENDING | Pending |
//! | PAYMENT_PRINTING | Printing |
//! | PAYMENT_SUCCESS | Success |
//! | error kinds, local faults | Error |

use std::fmt;
use std::sync::Arc;

use crate::i18n::Translations;
use crate::terminal::{StatusKind, TerminalEvent};

use super::TransactionError;

/// Error code used for connectivity faults raised on the kiosk side
pub const ECR_NOT_CONNECTED: &str = "ECR_NOT_CONNECTED";

/// User action on the transaction screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAction {
    Retry,
    /// Cancel the order (from an error) or finish (after success)
    ReturnToMenu,
    ChangePaymentMethod,
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "retry"),
            Self::ReturnToMenu => write!(f, "return_to_menu"),
            Self::ChangePaymentMethod => write!(f, "change_payment_method"),
        }
    }
}

/// Where a payment failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSource {
    /// Error reported by the terminal
    Terminal(StatusKind),
    /// Terminal host missing or submission refused
    Channel,
    /// No answer within the response timeout
    Timeout,
}

/// Error shown on the transaction screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFailure {
    pub source: FailureSource,
    pub code: String,
    /// Localised message
    pub message: String,
}

impl PaymentFailure {
    /// Recovery actions offered with the error
    pub fn actions(&self) -> &'static [UserAction] {
        &[
            UserAction::Retry,
            UserAction::ReturnToMenu,
            UserAction::ChangePaymentMethod,
        ]
    }
}

/// State shown on the transaction screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionState {
    Connecting,
    Pending,
    Printing,
    Success,
    Error(PaymentFailure),
}

impl TransactionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Pending => "pending",
            Self::Printing => "printing",
            Self::Success => "success",
            Self::Error(_) => "error",
        }
    }

    /// Waiting on the terminal
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Connecting | Self::Pending | Self::Printing)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn failure(&self) -> Option<&PaymentFailure> {
        match self {
            Self::Error(failure) => Some(failure),
            _ => None,
        }
    }

    /// Check if an action is valid in this state
    pub fn allows(&self, action: UserAction) -> bool {
        match action {
            UserAction::Retry | UserAction::ChangePaymentMethod => matches!(self, Self::Error(_)),
            UserAction::ReturnToMenu => matches!(self, Self::Success | Self::Error(_)),
        }
    }

    /// Translation label for the screen title
    pub fn label_key(&self) -> &'static str {
        match self {
            Self::Connecting => "paymentConnecting",
            Self::Pending => "paymentPending",
            Self::Printing => "paymentPrinting",
            Self::Success => "paymentCompleted",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(failure) => write!(f, "error({}: {})", failure.code, failure.message),
            other => f.write_str(other.name()),
        }
    }
}

/// Fault detected on the kiosk side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalFault {
    ChannelUnavailable(String),
    ResponseTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Connecting,
    Pending,
    Printing,
    Success,
    Failed,
}

fn classify(kind: StatusKind) -> Option<Stage> {
    match kind {
        StatusKind::PaymentSuccess => Some(Stage::Success),
        StatusKind::PaymentPending => Some(Stage::Pending),
        StatusKind::PaymentPrinting => Some(Stage::Printing),
        StatusKind::PaymentConnecting => Some(Stage::Connecting),
        StatusKind::ValidationError
        | StatusKind::PaymentError
        | StatusKind::OrderSaveError
        | StatusKind::EcrError
        | StatusKind::ActionResponse => Some(Stage::Failed),
        StatusKind::Other(_) => None,
    }
}

#[derive(Debug, Clone)]
enum Observation {
    Terminal { stage: Stage, event: TerminalEvent },
    Fault(LocalFault),
}

fn derive_state(
    observation: Option<&Observation>,
    is_retrying: bool,
    translations: &Translations,
) -> TransactionState {
    let Some(observation) = observation.filter(|_| !is_retrying) else {
        return TransactionState::Connecting;
    };

    match observation {
        Observation::Terminal { stage, event } => match stage {
            Stage::Connecting => TransactionState::Connecting,
            Stage::Pending => TransactionState::Pending,
            Stage::Printing => TransactionState::Printing,
            Stage::Success => TransactionState::Success,
            Stage::Failed => TransactionState::Error(PaymentFailure {
                source: FailureSource::Terminal(event.kind),
                code: event.code.clone(),
                message: translations.error_message(&event.code, &event.detail),
            }),
        },
        Observation::Fault(fault) => {
            let (source, detail) = match fault {
                LocalFault::ChannelUnavailable(detail) => (FailureSource::Channel, detail.as_str()),
                LocalFault::ResponseTimeout => (FailureSource::Timeout, "Terminal did not respond"),
            };
            TransactionState::Error(PaymentFailure {
                source,
                code: ECR_NOT_CONNECTED.to_string(),
                message: translations.error_message(ECR_NOT_CONNECTED, detail),
            })
        }
    }
}

/// What happened to an incoming terminal event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Became the current event
    Applied,
    /// Answers an older submission
    Stale,
    /// Kind outside the known taxonomy
    Unrecognized,
    /// Arrived after success was reached
    Latched,
}

/// Result of a retry request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Resubmission scheduled under this submission number
    Scheduled { submission: u64 },
    /// A retry is already waiting; nothing new scheduled
    AlreadyPending,
}

/// Transaction screen state machine
#[derive(Debug, Clone)]
pub struct TransactionMachine {
    observation: Option<Observation>,
    is_retrying: bool,
    /// Between retry and the resubmission; nothing is outstanding for the
    /// reserved number, so every event answers an older submission
    settling: bool,
    submission: u64,
    latch_success: bool,
    translations: Arc<Translations>,
}

impl TransactionMachine {
    pub fn new(translations: Arc<Translations>, latch_success: bool) -> Self {
        Self {
            observation: None,
            is_retrying: false,
            settling: false,
            submission: 0,
            latch_success,
            translations,
        }
    }

    /// Current visible state
    pub fn state(&self) -> TransactionState {
        derive_state(self.observation.as_ref(), self.is_retrying, &self.translations)
    }

    pub fn is_retrying(&self) -> bool {
        self.is_retrying
    }

    /// Latest submission number (0 before the first submission)
    pub fn submission(&self) -> u64 {
        self.submission
    }

    /// Reserve the number for a new submission
    pub fn begin_submission(&mut self) -> u64 {
        self.submission += 1;
        self.submission
    }

    fn is_latched(&self) -> bool {
        self.latch_success
            && matches!(
                self.observation,
                Some(Observation::Terminal {
                    stage: Stage::Success,
                    ..
                })
            )
            && !self.is_retrying
    }

    /// Feed one terminal event
    pub fn on_event(&mut self, event: TerminalEvent) -> EventOutcome {
        if self.is_latched() {
            return EventOutcome::Latched;
        }
        if self.settling {
            return EventOutcome::Stale;
        }
        if let Some(n) = event.submission
            && n != self.submission
        {
            return EventOutcome::Stale;
        }
        let Some(stage) = classify(event.kind) else {
            return EventOutcome::Unrecognized;
        };

        self.observation = Some(Observation::Terminal { stage, event });
        self.is_retrying = false;
        EventOutcome::Applied
    }

    /// Record a fault raised on the kiosk side
    ///
    /// Ignored once the payment succeeded.
    pub fn on_fault(&mut self, fault: LocalFault) -> bool {
        if self.is_latched() {
            return false;
        }
        self.observation = Some(Observation::Fault(fault));
        self.is_retrying = false;
        self.settling = false;
        true
    }

    /// User pressed retry
    ///
    /// Hides the error and reserves the next submission number; events for
    /// older submissions are dropped from here on. Until [`resubmitted`]
    /// every event is dropped, untagged ones included.
    ///
    /// [`resubmitted`]: Self::resubmitted
    pub fn retry(&mut self) -> Result<RetryOutcome, TransactionError> {
        if self.is_retrying {
            return Ok(RetryOutcome::AlreadyPending);
        }
        self.check(UserAction::Retry)?;

        self.is_retrying = true;
        self.settling = true;
        let submission = self.begin_submission();
        Ok(RetryOutcome::Scheduled { submission })
    }

    /// The scheduled resubmission could not be handed to the terminal
    ///
    /// The previous error becomes visible again.
    pub fn resubmit_failed(&mut self) {
        self.is_retrying = false;
        self.settling = false;
    }

    /// The scheduled resubmission reached the terminal; its answers count again
    pub fn resubmitted(&mut self) {
        self.settling = false;
    }

    /// Validate return-to-menu (cancel or finish)
    pub fn return_to_menu(&self) -> Result<(), TransactionError> {
        self.check(UserAction::ReturnToMenu)
    }

    /// Validate change-payment-method
    pub fn change_payment_method(&self) -> Result<(), TransactionError> {
        self.check(UserAction::ChangePaymentMethod)
    }

    fn check(&self, action: UserAction) -> Result<(), TransactionError> {
        let state = self.state();
        if state.allows(action) {
            Ok(())
        } else {
            Err(TransactionError::ActionNotAllowed {
                action,
                state: state.name(),
            })
        }
    }
}
