//! Translation tables
//!
//! Same shape as the kiosk's locale files: a `common` map of UI labels and
//! an `errors` map from terminal error code to message template.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::KioskConfig;
use crate::error::KioskResult;

const BUNDLED_AZ: &str = include_str!("../../locales/az.json");

/// Label and error tables for one locale
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Translations {
    #[serde(default)]
    pub common: HashMap<String, String>,
    #[serde(default)]
    pub errors: HashMap<String, String>,
}

impl Translations {
    /// Azerbaijani table shipped with the crate
    pub fn bundled() -> Self {
        serde_json::from_str(BUNDLED_AZ).unwrap_or_else(|e| {
            tracing::error!("Bundled locale table is invalid: {}", e);
            Self::default()
        })
    }

    /// Parse a table from JSON text
    pub fn from_json(json: &str) -> KioskResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load `<dir>/<locale>.json`
    pub fn load(dir: &Path, locale: &str) -> KioskResult<Self> {
        let path = dir.join(format!("{}.json", locale));
        let content = std::fs::read_to_string(&path)?;
        Self::from_json(&content)
    }

    /// Table selected by the configuration, falling back to the bundled one
    pub fn for_config(config: &KioskConfig) -> Self {
        let Some(dir) = config.locale_dir.as_deref() else {
            return Self::bundled();
        };

        match Self::load(dir, &config.locale) {
            Ok(table) => {
                tracing::info!(locale = %config.locale, "Loaded locale table");
                table
            }
            Err(e) => {
                tracing::warn!(
                    locale = %config.locale,
                    dir = %dir.display(),
                    "Failed to load locale table, using bundled: {}",
                    e
                );
                Self::bundled()
            }
        }
    }

    /// UI label, or the key itself when missing
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.common.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Localised message for a terminal error code
    pub fn error_message(&self, code: &str, detail: &str) -> String {
        super::resolve(code, detail, Some(&self.errors))
    }
}
