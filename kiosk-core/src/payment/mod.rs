//! Payment flow
//!
//! Steps 1 to 3 before the transaction screen: order notes, device number
//! and payment method.

mod flow;
mod methods;

use thiserror::Error;

use crate::device_number::DeviceNumberError;

pub use flow::{FlowOutcome, PaymentFlow, PaymentStep};
pub use methods::{MethodGroups, PaymentMethodOption};

/// Payment flow errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// Keypad input rejected; shown inline under the keypad
    #[error(transparent)]
    DeviceNumber(#[from] DeviceNumberError),

    /// Operation belongs to another step
    #[error("{operation} is not available at step {current}")]
    WrongStep {
        operation: &'static str,
        current: PaymentStep,
    },

    /// Step number outside 1..=3
    #[error("Invalid step number: {0}")]
    InvalidStep(u8),

    /// Method kind other than credit card or meal card
    #[error("Unsupported payment method kind: {0}")]
    UnsupportedMethodKind(String),
}
