//! Device number keypad
//!
//! Pure validation over the current value; the caller stores the result.

use std::str::FromStr;

use thiserror::Error;

/// Label key for the zero-value inline message
pub const ZERO_VALUE_LABEL: &str = "deviceNumberZeroError";
/// Label key for the empty-submission inline message
pub const EMPTY_LABEL: &str = "enterDeviceNumberWarning";

/// Keypad input rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceNumberError {
    /// A bare "0" is not a device number
    #[error("Device number cannot be 0")]
    ZeroValue,

    /// Submitted without a device number
    #[error("Device number is required")]
    Empty,

    /// Configured maximum length exceeded
    #[error("Device number longer than {max} digits")]
    TooLong { max: usize },

    /// Unknown keypad key
    #[error("Invalid keypad key")]
    InvalidKey,
}

impl DeviceNumberError {
    /// Translation label for the inline message shown under the keypad
    pub fn label_key(&self) -> &'static str {
        match self {
            Self::ZeroValue => ZERO_VALUE_LABEL,
            Self::Empty | Self::TooLong { .. } | Self::InvalidKey => EMPTY_LABEL,
        }
    }
}

/// One keypad press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadKey {
    Digit(u8),
    Delete,
}

impl FromStr for KeypadKey {
    type Err = DeviceNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete" => Ok(Self::Delete),
            _ => {
                let mut chars = s.chars();
                match (chars.next().and_then(|c| c.to_digit(10)), chars.next()) {
                    (Some(d), None) => Ok(Self::Digit(d as u8)),
                    _ => Err(DeviceNumberError::InvalidKey),
                }
            }
        }
    }
}

/// Apply a key press to the current value
///
/// Leading zeros are stripped from the result. Only the exact value "0" is
/// rejected, so "5" followed by "0" gives "50".
pub fn apply(current: &str, key: KeypadKey) -> Result<String, DeviceNumberError> {
    apply_with_limit(current, key, None)
}

/// [`apply`] with an optional maximum number of digits
pub fn apply_with_limit(
    current: &str,
    key: KeypadKey,
    max_len: Option<usize>,
) -> Result<String, DeviceNumberError> {
    match key {
        KeypadKey::Delete => {
            let mut value = current.to_string();
            value.pop();
            Ok(value)
        }
        KeypadKey::Digit(d) if d > 9 => Err(DeviceNumberError::InvalidKey),
        KeypadKey::Digit(d) => {
            let mut candidate = String::with_capacity(current.len() + 1);
            candidate.push_str(current);
            candidate.push(char::from(b'0' + d));

            if candidate == "0" {
                return Err(DeviceNumberError::ZeroValue);
            }

            let normalized = candidate.trim_start_matches('0').to_string();
            if let Some(max) = max_len
                && normalized.len() > max
            {
                return Err(DeviceNumberError::TooLong { max });
            }
            Ok(normalized)
        }
    }
}

/// Check the submission precondition for step 2
pub fn validate_for_submit(value: &str) -> Result<(), DeviceNumberError> {
    if value.is_empty() {
        Err(DeviceNumberError::Empty)
    } else {
        Ok(())
    }
}
