//! Checkout draft
//!
//! The in-progress order for the current customer session. The cart store
//! owns it; the payment core only reads it and patches a handful of fields.
//! Field names on the wire follow the embedded host's order format.

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment type derived from the selected method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    CreditCard,
    MealCard,
}

impl PaymentType {
    /// Map a branch payment method kind ("CREDIT_CARD", "MEAL_CARD")
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "CREDIT_CARD" => Some(Self::CreditCard),
            "MEAL_CARD" => Some(Self::MealCard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "CREDIT_CARD",
            Self::MealCard => "MEAL_CARD",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method stored on the draft after step 3
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedPaymentMethod {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "PaymentMethodID")]
    pub id: i64,
    /// Label shown on the method card
    #[serde(rename = "PaymentName")]
    pub display_name: String,
    /// Secondary label (provider name)
    #[serde(rename = "Name")]
    pub short_name: String,
    #[serde(rename = "Type")]
    pub kind: PaymentType,
}

/// In-progress order for one customer session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutDraft {
    #[serde(rename = "SessionId")]
    pub session_id: Uuid,
    #[serde(rename = "Notes", default)]
    pub notes: String,
    /// Device/table number, digits only, no leading zeros; empty means unset
    #[serde(rename = "CallNumber", default)]
    pub device_number: String,
    #[serde(rename = "AmountDue", with = "rust_decimal::serde::float")]
    pub amount_due: Decimal,
    #[serde(rename = "PaymentMethod", default)]
    pub payment_method: Option<SelectedPaymentMethod>,
    #[serde(rename = "PaymentType", default)]
    pub payment_type: Option<PaymentType>,
}

impl CheckoutDraft {
    /// Start a new session for an order total
    pub fn new(amount_due: Decimal) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            notes: String::new(),
            device_number: String::new(),
            amount_due,
            payment_method: None,
            payment_type: None,
        }
    }

    /// Check if a device number has been entered
    pub fn has_device_number(&self) -> bool {
        !self.device_number.is_empty()
    }

    /// Apply a partial update (last writer wins)
    pub fn apply(&mut self, patch: DraftPatch) {
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(device_number) = patch.device_number {
            self.device_number = device_number;
        }
        if let Some(method) = patch.payment_method {
            self.payment_type = Some(method.kind);
            self.payment_method = Some(method);
        }
    }
}

/// Partial update of the draft fields the payment core owns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftPatch {
    pub notes: Option<String>,
    pub device_number: Option<String>,
    /// Also sets the derived payment type
    pub payment_method: Option<SelectedPaymentMethod>,
}

impl DraftPatch {
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Default::default()
        }
    }

    pub fn device_number(device_number: impl Into<String>) -> Self {
        Self {
            device_number: Some(device_number.into()),
            ..Default::default()
        }
    }

    pub fn payment_method(method: SelectedPaymentMethod) -> Self {
        Self {
            payment_method: Some(method),
            ..Default::default()
        }
    }
}

/// Cart store collaborator
///
/// The kiosk never persists the draft itself; it goes through this trait.
pub trait DraftStore: Send + Sync {
    /// Current draft snapshot
    fn get(&self) -> CheckoutDraft;

    /// Patch fields and return the updated draft
    fn update(&self, patch: DraftPatch) -> CheckoutDraft;

    /// Discard the session (return to menu, completed order)
    fn clear(&self);
}

/// Draft store held in memory, one per kiosk session
#[derive(Debug)]
pub struct InMemoryDraftStore {
    draft: Mutex<CheckoutDraft>,
}

impl InMemoryDraftStore {
    pub fn new(draft: CheckoutDraft) -> Self {
        Self {
            draft: Mutex::new(draft),
        }
    }

    /// Create a store behind an `Arc`, ready to hand to the flow and the screen
    pub fn shared(draft: CheckoutDraft) -> Arc<Self> {
        Arc::new(Self::new(draft))
    }
}

impl DraftStore for InMemoryDraftStore {
    fn get(&self) -> CheckoutDraft {
        self.draft.lock().clone()
    }

    fn update(&self, patch: DraftPatch) -> CheckoutDraft {
        let mut draft = self.draft.lock();
        draft.apply(patch);
        draft.clone()
    }

    fn clear(&self) {
        let mut draft = self.draft.lock();
        tracing::debug!(session_id = %draft.session_id, "Clearing checkout draft");
        *draft = CheckoutDraft::new(Decimal::ZERO);
    }
}
