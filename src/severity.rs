//! Keyword-based severity classification of failures.

use crate::types::Severity;

/// Error text markers of a page that never became usable
const CRITICAL_ERROR_KEYWORDS: &[&str] = &[
    "timeout",
    "crash",
    "cannot load",
    "failed to load",
    "navigation",
    "net::err",
];

/// Test titles that exercise core business flows
const HIGH_TITLE_KEYWORDS: &[&str] = &[
    "login",
    "checkout",
    "payment",
    "submit",
    "form",
    "authentication",
    "authorization",
];

/// Error text markers of a missing or hidden element
const MEDIUM_ERROR_KEYWORDS: &[&str] = &["not found", "not visible", "missing", "locator"];

/// Classify a failure by its error text and test title.
///
/// Rules apply in order and the first match wins. Unknown failures are `High`.
pub fn classify(error: &str, title: &str) -> Severity {
    let error = error.to_lowercase();
    let title = title.to_lowercase();

    if contains_any(&error, CRITICAL_ERROR_KEYWORDS) {
        Severity::Critical
    } else if contains_any(&title, HIGH_TITLE_KEYWORDS) {
        Severity::High
    } else if contains_any(&error, MEDIUM_ERROR_KEYWORDS) {
        Severity::Medium
    } else {
        Severity::High
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
