//! Three-step payment flow controller

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::{FlowError, PaymentMethodOption};
use crate::config::KioskConfig;
use crate::device_number::{self, DeviceNumberError, KeypadKey};
use crate::draft::{CheckoutDraft, DraftPatch, DraftStore};

/// Payment flow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PaymentStep {
    Notes = 1,
    DeviceNumber = 2,
    PaymentMethod = 3,
}

impl PaymentStep {
    pub const COUNT: u8 = 3;

    pub fn number(self) -> u8 {
        self as u8
    }

    /// Translation label for the step indicator
    pub fn label_key(self) -> &'static str {
        match self {
            Self::Notes => "orderNotes",
            Self::DeviceNumber => "selectedDevice",
            Self::PaymentMethod => "paymentMethod",
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            Self::Notes => None,
            Self::DeviceNumber => Some(Self::Notes),
            Self::PaymentMethod => Some(Self::DeviceNumber),
        }
    }
}

impl TryFrom<u8> for PaymentStep {
    type Error = FlowError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Notes),
            2 => Ok(Self::DeviceNumber),
            3 => Ok(Self::PaymentMethod),
            other => Err(FlowError::InvalidStep(other)),
        }
    }
}

impl fmt::Display for PaymentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Where the flow goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Stay in the flow at this step
    Step(PaymentStep),
    /// Method stored; open the transaction screen
    StartTransaction,
    /// Back from step 1; leave to the cart
    BackToCart,
}

/// Controller for the three payment steps
///
/// All values go straight to the [`DraftStore`]; the flow only keeps the
/// current step and the inline keypad error.
pub struct PaymentFlow {
    store: Arc<dyn DraftStore>,
    step: PaymentStep,
    error: Option<DeviceNumberError>,
    device_number_max_len: Option<usize>,
}

impl PaymentFlow {
    /// Start at step 1
    pub fn new(store: Arc<dyn DraftStore>, config: &KioskConfig) -> Self {
        Self::at_step(store, config, PaymentStep::Notes)
    }

    /// Enter at a given step (change payment method re-enters at step 3)
    pub fn at_step(store: Arc<dyn DraftStore>, config: &KioskConfig, step: PaymentStep) -> Self {
        debug!(step = %step, "Entering payment flow");
        Self {
            store,
            step,
            error: None,
            device_number_max_len: config.device_number_max_len,
        }
    }

    pub fn step(&self) -> PaymentStep {
        self.step
    }

    /// Progress bar value, step / 3 as a percentage
    pub fn progress(&self) -> f64 {
        f64::from(self.step.number()) / f64::from(PaymentStep::COUNT) * 100.0
    }

    /// Inline keypad error, if any
    pub fn error(&self) -> Option<DeviceNumberError> {
        self.error
    }

    pub fn draft(&self) -> CheckoutDraft {
        self.store.get()
    }

    /// Step 1: store the notes and continue
    pub fn submit_notes(&mut self, notes: impl Into<String>) -> Result<FlowOutcome, FlowError> {
        self.expect_step(PaymentStep::Notes, "submit_notes")?;
        self.store.update(DraftPatch::notes(notes));
        Ok(self.advance(PaymentStep::DeviceNumber))
    }

    /// Step 2: apply one keypad press
    ///
    /// Returns the stored value. A rejected key leaves the value unchanged
    /// and is remembered as the inline error until the next accepted key.
    pub fn press_key(&mut self, key: KeypadKey) -> Result<String, FlowError> {
        self.expect_step(PaymentStep::DeviceNumber, "press_key")?;
        let current = self.store.get().device_number;

        match device_number::apply_with_limit(&current, key, self.device_number_max_len) {
            Ok(value) => {
                self.store.update(DraftPatch::device_number(value.clone()));
                self.error = None;
                Ok(value)
            }
            Err(e) => {
                debug!(?key, "Keypad input rejected: {}", e);
                self.error = Some(e);
                Err(e.into())
            }
        }
    }

    /// Step 2: confirm the device number and continue
    pub fn submit_device_number(&mut self) -> Result<FlowOutcome, FlowError> {
        self.expect_step(PaymentStep::DeviceNumber, "submit_device_number")?;
        let draft = self.store.get();

        if let Err(e) = device_number::validate_for_submit(&draft.device_number) {
            self.error = Some(e);
            return Err(e.into());
        }
        self.error = None;
        Ok(self.advance(PaymentStep::PaymentMethod))
    }

    /// Step 3: store the chosen method; the caller opens the transaction screen
    pub fn select_method(&mut self, method: &PaymentMethodOption) -> Result<FlowOutcome, FlowError> {
        self.expect_step(PaymentStep::PaymentMethod, "select_method")?;
        let selected = method.to_selected()?;

        let draft = self.store.update(DraftPatch::payment_method(selected));
        info!(
            session_id = %draft.session_id,
            method = %method.key,
            payment_type = ?draft.payment_type,
            "Payment method selected"
        );
        Ok(FlowOutcome::StartTransaction)
    }

    /// One step back; from step 1 the flow is left
    pub fn back(&mut self) -> FlowOutcome {
        self.error = None;
        match self.step.previous() {
            Some(step) => self.advance(step),
            None => FlowOutcome::BackToCart,
        }
    }

    fn advance(&mut self, step: PaymentStep) -> FlowOutcome {
        debug!(from = %self.step, to = %step, "Payment step changed");
        self.step = step;
        FlowOutcome::Step(step)
    }

    fn expect_step(&self, step: PaymentStep, operation: &'static str) -> Result<(), FlowError> {
        if self.step == step {
            Ok(())
        } else {
            Err(FlowError::WrongStep {
                operation,
                current: self.step,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{InMemoryDraftStore, PaymentType};
    use rust_decimal::Decimal;

    fn flow() -> (PaymentFlow, Arc<InMemoryDraftStore>) {
        let store = InMemoryDraftStore::shared(CheckoutDraft::new(Decimal::new(4250, 2)));
        (PaymentFlow::new(store.clone(), &KioskConfig::default()), store)
    }

    fn visa() -> PaymentMethodOption {
        PaymentMethodOption {
            key: "visa".to_string(),
            id: 3,
            display_name: "Visa".to_string(),
            short_name: "Kapital Bank".to_string(),
            kind: "CREDIT_CARD".to_string(),
        }
    }

    fn type_digits(flow: &mut PaymentFlow, digits: &[u8]) {
        for d in digits {
            let _ = flow.press_key(KeypadKey::Digit(*d));
        }
    }

    #[test]
    fn test_full_flow() {
        let (mut flow, store) = flow();
        assert_eq!(flow.step(), PaymentStep::Notes);

        assert_eq!(
            flow.submit_notes("no onions").unwrap(),
            FlowOutcome::Step(PaymentStep::DeviceNumber)
        );
        type_digits(&mut flow, &[1, 2]);
        assert_eq!(
            flow.submit_device_number().unwrap(),
            FlowOutcome::Step(PaymentStep::PaymentMethod)
        );
        assert_eq!(flow.select_method(&visa()).unwrap(), FlowOutcome::StartTransaction);

        let draft = store.get();
        assert_eq!(draft.notes, "no onions");
        assert_eq!(draft.device_number, "12");
        assert_eq!(draft.payment_type, Some(PaymentType::CreditCard));
    }

    #[test]
    fn test_zero_first_shows_inline_error() {
        let (mut flow, store) = flow();
        flow.submit_notes("").unwrap();

        let err = flow.press_key(KeypadKey::Digit(0)).unwrap_err();
        assert_eq!(err, FlowError::DeviceNumber(DeviceNumberError::ZeroValue));
        assert_eq!(flow.error(), Some(DeviceNumberError::ZeroValue));
        assert!(store.get().device_number.is_empty());

        assert_eq!(flow.press_key(KeypadKey::Digit(7)).unwrap(), "7");
        assert_eq!(flow.error(), None);
        assert_eq!(flow.press_key(KeypadKey::Digit(0)).unwrap(), "70");
    }

    #[test]
    fn test_delete_clears_error() {
        let (mut flow, _store) = flow();
        flow.submit_notes("").unwrap();

        let _ = flow.press_key(KeypadKey::Digit(0));
        assert_eq!(flow.press_key(KeypadKey::Delete).unwrap(), "");
        assert_eq!(flow.error(), None);
    }

    #[test]
    fn test_empty_submit_stays_on_step() {
        let (mut flow, _store) = flow();
        flow.submit_notes("").unwrap();

        let err = flow.submit_device_number().unwrap_err();
        assert_eq!(err, FlowError::DeviceNumber(DeviceNumberError::Empty));
        assert_eq!(flow.step(), PaymentStep::DeviceNumber);
        assert_eq!(flow.error(), Some(DeviceNumberError::Empty));
    }

    #[test]
    fn test_max_len() {
        let store = InMemoryDraftStore::shared(CheckoutDraft::new(Decimal::from(5)));
        let config = KioskConfig::default().with_device_number_max_len(Some(2));
        let mut flow = PaymentFlow::at_step(store.clone(), &config, PaymentStep::DeviceNumber);

        type_digits(&mut flow, &[4, 5, 6]);
        assert_eq!(store.get().device_number, "45");
        assert_eq!(flow.error(), Some(DeviceNumberError::TooLong { max: 2 }));
    }

    #[test]
    fn test_wrong_step() {
        let (mut flow, _store) = flow();
        let err = flow.select_method(&visa()).unwrap_err();
        assert_eq!(
            err,
            FlowError::WrongStep {
                operation: "select_method",
                current: PaymentStep::Notes
            }
        );
    }

    #[test]
    fn test_unsupported_method_not_stored() {
        let (mut flow, store) = flow();
        flow.submit_notes("").unwrap();
        type_digits(&mut flow, &[3]);
        flow.submit_device_number().unwrap();

        let cash = PaymentMethodOption {
            kind: "CASH".to_string(),
            ..visa()
        };
        assert!(matches!(
            flow.select_method(&cash),
            Err(FlowError::UnsupportedMethodKind(_))
        ));
        assert!(store.get().payment_method.is_none());
    }

    #[test]
    fn test_back_navigation() {
        let (mut flow, _store) = flow();
        assert_eq!(flow.back(), FlowOutcome::BackToCart);

        flow.submit_notes("").unwrap();
        type_digits(&mut flow, &[9]);
        flow.submit_device_number().unwrap();

        assert_eq!(flow.back(), FlowOutcome::Step(PaymentStep::DeviceNumber));
        assert_eq!(flow.back(), FlowOutcome::Step(PaymentStep::Notes));
    }

    #[test]
    fn test_reenter_at_method_step_keeps_draft() {
        let (mut flow, store) = flow();
        flow.submit_notes("extra sauce").unwrap();
        type_digits(&mut flow, &[1, 5]);
        flow.submit_device_number().unwrap();
        flow.select_method(&visa()).unwrap();

        let reentered = PaymentFlow::at_step(
            store.clone(),
            &KioskConfig::default(),
            PaymentStep::try_from(3).unwrap(),
        );
        assert_eq!(reentered.step(), PaymentStep::PaymentMethod);
        let draft = reentered.draft();
        assert_eq!(draft.notes, "extra sauce");
        assert_eq!(draft.device_number, "15");
    }

    #[test]
    fn test_progress() {
        let (mut flow, _store) = flow();
        assert!((flow.progress() - 100.0 / 3.0).abs() < 1e-9);
        flow.submit_notes("").unwrap();
        type_digits(&mut flow, &[1]);
        flow.submit_device_number().unwrap();
        assert_eq!(flow.progress(), 100.0);
    }

    #[test]
    fn test_step_from_number() {
        assert_eq!(PaymentStep::try_from(2).unwrap(), PaymentStep::DeviceNumber);
        assert_eq!(PaymentStep::try_from(4), Err(FlowError::InvalidStep(4)));
    }
}
