//! Data model shared across the pipeline: page context, run results, and
//! the business-facing bug and recommendation records.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Descriptor of one form input found on the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputDescriptor {
    /// Input type attribute (e.g. "text", "email")
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub placeholder: String,
    /// Accessible label
    #[serde(deserialize_with = "null_as_default")]
    pub label: String,
}

/// Flat description of a live page, produced by the external crawler.
///
/// Read-only to the pipeline and passed through unchanged. A crawler that
/// could not load the page still sends its initial shape, with `null` fields
/// and `forms` as an empty list; both decode to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    /// Canonical URL after redirects
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    /// Heading texts (at most 10)
    #[serde(deserialize_with = "null_as_default")]
    pub headings: Vec<String>,
    /// Button labels (at most 15)
    #[serde(deserialize_with = "null_as_default")]
    pub buttons: Vec<String>,
    /// Link texts (at most 20)
    #[serde(deserialize_with = "null_as_default")]
    pub links: Vec<String>,
    /// Number of forms on the page; a list of forms counts its entries
    #[serde(deserialize_with = "form_count")]
    pub forms: usize,
    /// Input descriptors (at most 10)
    #[serde(deserialize_with = "null_as_default")]
    pub inputs: Vec<InputDescriptor>,
    #[serde(deserialize_with = "null_as_default")]
    pub meta_description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub has_navigation: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub has_footer: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn form_count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Array(forms) => Ok(forms.len()),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("invalid form count {n}"))),
        other => Err(serde::de::Error::custom(format!(
            "expected form count or list of forms, found {other}"
        ))),
    }
}

/// One test case's non-passing outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Test title
    pub title: String,
    /// Error message text
    pub error: String,
}

impl Failure {
    pub fn new(title: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            error: error.into(),
        }
    }
}

/// A screenshot captured during the run, encoded for transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub filename: String,
    /// Base64-encoded image bytes
    pub b64: String,
}

/// Business-facing urgency tier of a bug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Parse a severity name, ignoring case and surrounding whitespace
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Importance of a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Domain of a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Performance,
    Security,
    Accessibility,
    Seo,
    Ux,
}

impl Category {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "performance" => Some(Self::Performance),
            "security" => Some(Self::Security),
            "accessibility" => Some(Self::Accessibility),
            "seo" => Some(Self::Seo),
            "ux" => Some(Self::Ux),
            _ => None,
        }
    }
}

/// A plain-language bug report derived from one failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
    #[serde(rename = "bugId")]
    pub id: String,
    /// At most 255 characters
    pub title: String,
    /// At most 800 characters
    pub description: String,
    pub severity: Severity,
    pub steps_to_reproduce: Vec<String>,
    pub expected_result: String,
    pub actual_result: String,
    pub user_impact: String,
}

/// A plain-language improvement suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "recommendationId")]
    pub id: String,
    /// At most 255 characters
    pub title: String,
    pub description: String,
    pub impact: Impact,
    pub category: Category,
}

/// Final outcome of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
    Timeout,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound request: a generated script plus optional page context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default, alias = "test_script")]
    pub script: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "pageSnapshot", alias = "page_info")]
    pub page_snapshot: Option<PageSnapshot>,
}

impl RunRequest {
    pub fn new(script: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            url: url.into(),
            page_snapshot: None,
        }
    }

    pub fn page_snapshot(mut self, snapshot: PageSnapshot) -> Self {
        self.page_snapshot = Some(snapshot);
        self
    }
}

/// Outbound response. Every field is present on every outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub success: bool,
    pub status: RunStatus,
    /// User-visible log lines, deduplicated in first-seen order
    pub logs: Vec<String>,
    pub bugs: Vec<Bug>,
    pub recommendations: Vec<Recommendation>,
    /// Human-readable wall time, e.g. "4.2s" or "5m 3s"
    pub duration: String,
    pub screenshots: Vec<Screenshot>,
    /// Raw structured report from the runner, when it could be parsed
    pub results: Option<serde_json::Value>,
}
