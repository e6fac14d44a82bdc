//! Terminal error message resolver

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{NoExpand, Regex};

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{(\w+)\}").expect("placeholder pattern"))
}

/// Resolve a terminal error code to a display message
///
/// When `code` has a template in `table`, every `${name}` placeholder is
/// replaced with `detail` (all placeholders get the same value). Otherwise
/// `detail` is returned unchanged.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use kiosk_core::i18n::resolve;
///
/// let table = HashMap::from([("502".to_string(), "Terminal error: ${x}".to_string())]);
/// assert_eq!(resolve("502", "ECR timeout", Some(&table)), "Terminal error: ECR timeout");
/// assert_eq!(resolve("999", "raw detail", Some(&table)), "raw detail");
/// ```
pub fn resolve(code: &str, detail: &str, table: Option<&HashMap<String, String>>) -> String {
    match table.and_then(|t| t.get(code)) {
        Some(template) => placeholder()
            .replace_all(template, NoExpand(detail))
            .into_owned(),
        None => detail.to_string(),
    }
}
