//! Kiosk configuration
//!
//! Values come from the environment with defaults, and can be overridden
//! with the `with_*` builders (tests, CLI flags).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Kiosk configuration
#[derive(Debug, Clone)]
pub struct KioskConfig {
    /// Wait before resubmitting after the user presses retry
    pub retry_settle_delay: Duration,

    /// Give up waiting for the terminal after this long (None = wait forever)
    pub response_timeout: Option<Duration>,

    /// Ignore terminal events once the payment succeeded
    pub latch_success: bool,

    /// Maximum number of digits on the device number keypad (None = no limit)
    pub device_number_max_len: Option<usize>,

    /// Locale code for terminal error messages (e.g. "az")
    pub locale: String,

    /// Directory holding `<locale>.json` tables; the bundled table is used when unset
    pub locale_dir: Option<PathBuf>,
}

impl KioskConfig {
    /// Load configuration from environment variables
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `KIOSK_RETRY_SETTLE_MS` | 2000 |
    /// | `KIOSK_RESPONSE_TIMEOUT_MS` | 180000 (0 disables) |
    /// | `KIOSK_LATCH_SUCCESS` | true |
    /// | `KIOSK_DEVICE_NUMBER_MAX_LEN` | unset |
    /// | `KIOSK_LOCALE` | az |
    /// | `KIOSK_LOCALE_DIR` | unset |
    pub fn from_env() -> Result<Self, ConfigError> {
        let retry_settle_ms: u64 = parse_env("KIOSK_RETRY_SETTLE_MS")?.unwrap_or(2000);
        let response_timeout_ms: u64 =
            parse_env("KIOSK_RESPONSE_TIMEOUT_MS")?.unwrap_or(180_000);

        Ok(Self {
            retry_settle_delay: Duration::from_millis(retry_settle_ms),
            response_timeout: (response_timeout_ms > 0)
                .then(|| Duration::from_millis(response_timeout_ms)),
            latch_success: parse_env("KIOSK_LATCH_SUCCESS")?.unwrap_or(true),
            device_number_max_len: parse_env("KIOSK_DEVICE_NUMBER_MAX_LEN")?,
            locale: std::env::var("KIOSK_LOCALE").unwrap_or_else(|_| "az".into()),
            locale_dir: std::env::var("KIOSK_LOCALE_DIR").ok().map(PathBuf::from),
        })
    }

    /// Set the retry settle delay
    pub fn with_retry_settle_delay(mut self, delay: Duration) -> Self {
        self.retry_settle_delay = delay;
        self
    }

    /// Set the response timeout (None disables it)
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Enable or disable the success latch
    pub fn with_latch_success(mut self, latch: bool) -> Self {
        self.latch_success = latch;
        self
    }

    /// Limit the device number length
    pub fn with_device_number_max_len(mut self, max_len: Option<usize>) -> Self {
        self.device_number_max_len = max_len;
        self
    }

    /// Set the locale and optional table directory
    pub fn with_locale(mut self, locale: impl Into<String>, dir: Option<PathBuf>) -> Self {
        self.locale = locale.into();
        self.locale_dir = dir;
        self
    }
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            retry_settle_delay: Duration::from_secs(2),
            response_timeout: Some(Duration::from_secs(180)),
            latch_success: true,
            device_number_max_len: None,
            locale: "az".into(),
            locale_dir: None,
        }
    }
}

/// Read and parse an optional env var; unset is `None`, garbage is an error
fn parse_env<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => {
            tracing::debug!("{} not set, using default", key);
            Ok(None)
        }
    }
}
