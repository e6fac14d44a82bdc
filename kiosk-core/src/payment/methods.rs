//! Branch payment methods offered at step 3

use serde::{Deserialize, Serialize};

use super::FlowError;
use crate::draft::{PaymentType, SelectedPaymentMethod};

/// Payment method as configured for the branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodOption {
    #[serde(rename = "PaymentMethodKey")]
    pub key: String,
    #[serde(rename = "PaymentMethodID")]
    pub id: i64,
    #[serde(rename = "PaymentName")]
    pub display_name: String,
    #[serde(rename = "Name")]
    pub short_name: String,
    /// Raw kind from the branch data, e.g. "CREDIT_CARD"
    #[serde(rename = "Type")]
    pub kind: String,
}

impl PaymentMethodOption {
    pub fn payment_type(&self) -> Option<PaymentType> {
        PaymentType::from_kind(&self.kind)
    }

    /// Convert into the value stored on the draft
    pub fn to_selected(&self) -> Result<SelectedPaymentMethod, FlowError> {
        let kind = self
            .payment_type()
            .ok_or_else(|| FlowError::UnsupportedMethodKind(self.kind.clone()))?;

        Ok(SelectedPaymentMethod {
            key: self.key.clone(),
            id: self.id,
            display_name: self.display_name.clone(),
            short_name: self.short_name.clone(),
            kind,
        })
    }
}

/// Methods split into the two groups shown on screen
///
/// Kinds other than credit card and meal card are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodGroups {
    pub credit_card: Vec<PaymentMethodOption>,
    pub meal_card: Vec<PaymentMethodOption>,
}

impl MethodGroups {
    /// Partition by kind, keeping branch order within each group
    pub fn group(methods: &[PaymentMethodOption]) -> Self {
        let mut groups = Self::default();
        for method in methods {
            match method.payment_type() {
                Some(PaymentType::CreditCard) => groups.credit_card.push(method.clone()),
                Some(PaymentType::MealCard) => groups.meal_card.push(method.clone()),
                None => {}
            }
        }
        groups
    }

    /// Parse the branch payment method list
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let methods: Vec<PaymentMethodOption> = serde_json::from_str(json)?;
        Ok(Self::group(&methods))
    }

    pub fn len(&self) -> usize {
        self.credit_card.len() + self.meal_card.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a listed method by key
    pub fn find(&self, key: &str) -> Option<&PaymentMethodOption> {
        self.credit_card
            .iter()
            .chain(self.meal_card.iter())
            .find(|m| m.key == key)
    }
}
