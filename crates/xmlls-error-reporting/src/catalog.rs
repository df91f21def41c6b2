//! Error code catalog and lookup.
//!
//! Maps the codes validators report (like `ETagRequired` or
//! `cvc-complex-type.2.4.a`) to their subsystem, title and message template.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata for an error code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    /// Subsystem name ("xml", "dtd", "xsd", "resource", "grammar")
    pub subsystem: String,

    /// Short title for the error
    pub title: String,

    /// Message template with positional `{0}`, `{1}`, ... placeholders
    pub message_template: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,

    /// When this error was introduced (version)
    pub since_version: String,
}

/// Global error catalog, embedded at compile time from `error_catalog.json`.
///
/// # Panics
///
/// Panics on first access if the embedded JSON is invalid, which can only
/// happen if the catalog file was edited incorrectly.
pub static ERROR_CATALOG: Lazy<HashMap<String, ErrorCodeInfo>> = Lazy::new(|| {
    let json_data = include_str!("../error_catalog.json");
    serde_json::from_str(json_data).expect("Invalid error catalog JSON")
});

/// Look up error code information.
pub fn get_error_info(code: &str) -> Option<&ErrorCodeInfo> {
    ERROR_CATALOG.get(code)
}

/// Get documentation URL for an error code.
pub fn get_docs_url(code: &str) -> Option<&str> {
    ERROR_CATALOG
        .get(code)
        .and_then(|info| info.docs_url.as_deref())
}

/// Get the subsystem name for an error code.
///
/// ```
/// use xmlls_error_reporting::catalog::get_subsystem;
///
/// assert_eq!(get_subsystem("dtd_not_found"), Some("resource"));
/// ```
pub fn get_subsystem(code: &str) -> Option<&str> {
    ERROR_CATALOG.get(code).map(|info| info.subsystem.as_str())
}

/// Expand the message template for `code` with positional arguments.
///
/// Placeholders without a matching argument are left as-is. Unknown codes
/// fall back to the code followed by the arguments, so a message is never
/// lost because the catalog lags behind a validator.
///
/// ```
/// use xmlls_error_reporting::catalog::format_message;
///
/// assert_eq!(
///     format_message("AttributeNotUnique", &["a", "id"]),
///     "Attribute \"id\" was already specified for element \"a\"."
/// );
/// ```
pub fn format_message(code: &str, args: &[&str]) -> String {
    let Some(info) = ERROR_CATALOG.get(code) else {
        return if args.is_empty() {
            code.to_string()
        } else {
            format!("{}: {}", code, args.join(", "))
        };
    };
    let mut message = info.message_template.clone();
    for (idx, arg) in args.iter().enumerate() {
        message = message.replace(&format!("{{{idx}}}"), arg);
    }
    message
}
