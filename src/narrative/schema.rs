//! Lenient decoding of model output into bugs and recommendations.
//!
//! Every field of the raw records is optional and untyped, so a response that
//! is a JSON array of objects always decodes. Anything that is not an object
//! or an array of objects is rejected. Repair then coerces, clamps, and
//! defaults field by field.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{NarrativeError, NarrativeResult, new_id, truncate_chars};
use crate::script::strip_fences;
use crate::severity;
use crate::types::{Bug, Category, Failure, Impact, Recommendation, Severity};

/// Maximum title length for bugs and recommendations
pub const MAX_TITLE_CHARS: usize = 255;

/// Maximum bug description length
pub const MAX_DESCRIPTION_CHARS: usize = 800;

/// Strip fences from a model response and decode it as a list of records.
///
/// The response must be a JSON object or an array of objects. Any other shape,
/// including arrays holding strings or numbers, is a decode error.
pub fn decode_records<T: DeserializeOwned>(raw: &str) -> NarrativeResult<Vec<T>> {
    let text = strip_fences(raw);
    let decode_error = |reason: String| {
        NarrativeError::Decode(format!(
            "{reason}; response starts with {:?}",
            truncate_chars(&text, 80)
        ))
    };

    let value: Value = serde_json::from_str(&text).map_err(|e| decode_error(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(decode_error(format!(
                "expected object or array, found {}",
                kind(&other)
            )));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(decode_error(format!(
                    "record {index} is {}, expected object",
                    kind(&item)
                )));
            }
            serde_json::from_value(item).map_err(|e| decode_error(format!("record {index}: {e}")))
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Bug object exactly as the model wrote it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawBug {
    #[serde(rename = "bugId")]
    pub bug_id: Option<Value>,
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub severity: Option<Value>,
    pub steps_to_reproduce: Option<Value>,
    pub expected_result: Option<Value>,
    pub actual_result: Option<Value>,
    pub user_impact: Option<Value>,
}

impl RawBug {
    /// Repair into a [`Bug`] describing `failure`
    pub fn repair(self, failure: &Failure, url: &str) -> Bug {
        let severity = text(&self.severity)
            .as_deref()
            .and_then(Severity::parse)
            .unwrap_or_else(|| severity::classify(&failure.error, &failure.title));

        let steps_to_reproduce = steps(&self.steps_to_reproduce).unwrap_or_else(|| {
            vec![
                format!("1. Visit {url}"),
                format!("2. Run automated test: {}", failure.title),
                "3. Test fails".to_string(),
            ]
        });

        Bug {
            id: text(&self.bug_id).unwrap_or_else(|| new_id("bug")),
            title: truncate_chars(
                &text(&self.title).unwrap_or_else(|| failure.title.clone()),
                MAX_TITLE_CHARS,
            ),
            description: truncate_chars(
                &text(&self.description).unwrap_or_else(|| "A test failed".to_string()),
                MAX_DESCRIPTION_CHARS,
            ),
            severity,
            steps_to_reproduce,
            expected_result: text(&self.expected_result)
                .unwrap_or_else(|| "Test should pass".to_string()),
            actual_result: text(&self.actual_result).unwrap_or_else(|| "Test failed".to_string()),
            user_impact: text(&self.user_impact)
                .unwrap_or_else(|| "Users may experience issues with this feature".to_string()),
        }
    }
}

/// Recommendation object exactly as the model wrote it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRecommendation {
    #[serde(rename = "recommendationId")]
    pub recommendation_id: Option<Value>,
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub impact: Option<Value>,
    pub category: Option<Value>,
}

impl RawRecommendation {
    pub fn repair(self) -> Recommendation {
        Recommendation {
            id: text(&self.recommendation_id).unwrap_or_else(|| new_id("rec")),
            title: truncate_chars(
                &text(&self.title).unwrap_or_else(|| "Test Recommendation".to_string()),
                MAX_TITLE_CHARS,
            ),
            description: text(&self.description)
                .unwrap_or_else(|| "No description provided".to_string()),
            impact: text(&self.impact)
                .as_deref()
                .and_then(Impact::parse)
                .unwrap_or(Impact::Medium),
            category: text(&self.category)
                .as_deref()
                .and_then(Category::parse)
                .unwrap_or(Category::Ux),
        }
    }
}

/// Non-blank text of a field; non-string JSON is rendered as JSON
fn text(value: &Option<Value>) -> Option<String> {
    value.as_ref().and_then(value_text)
}

fn value_text(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!rendered.is_empty()).then_some(rendered)
}

/// Steps as a list of non-blank strings; a bare string is a single step
fn steps(value: &Option<Value>) -> Option<Vec<String>> {
    let steps: Vec<String> = match value.as_ref()? {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        single @ Value::String(_) => value_text(single).into_iter().collect(),
        _ => return None,
    };
    (!steps.is_empty()).then_some(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn failure() -> Failure {
        Failure::new(
            "login form submits",
            "Timeout 30000ms exceeded waiting for locator('#email')",
        )
    }

    #[test]
    fn test_decode_fenced_array() {
        let raw = "```json\n[{\"title\": \"A\"}, {\"title\": \"B\"}]\n```";
        let records: Vec<RawRecommendation> = decode_records(raw).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_decode_single_object() {
        let records: Vec<RawBug> = decode_records(r#"{"title": "only one"}"#).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_decode_rejects_prose() {
        let result = decode_records::<RawBug>("Sorry, I can't help with that");
        assert!(matches!(result, Err(NarrativeError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_array_of_strings() {
        let raw = r#"["The signup button is broken", "Fix it soon", "Users cannot register"]"#;
        assert!(matches!(
            decode_records::<RawBug>(raw),
            Err(NarrativeError::Decode(_))
        ));
        assert!(matches!(
            decode_records::<RawRecommendation>(raw),
            Err(NarrativeError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_mixed_array() {
        let result = decode_records::<RawBug>(r#"[{"title": "real"}, "junk"]"#);
        match result {
            Err(NarrativeError::Decode(reason)) => assert!(reason.contains("record 1")),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_bare_string() {
        let result = decode_records::<RawRecommendation>(r#""just advice""#);
        assert!(matches!(result, Err(NarrativeError::Decode(_))));
    }

    #[test]
    fn test_bug_repair_fills_defaults() {
        let bug = RawBug::default().repair(&failure(), "https://acme.test");
        assert!(bug.id.starts_with("bug_"));
        assert_eq!(bug.title, "login form submits");
        assert_eq!(bug.description, "A test failed");
        assert_eq!(bug.severity, Severity::Critical);
        assert_eq!(
            bug.steps_to_reproduce,
            vec![
                "1. Visit https://acme.test".to_string(),
                "2. Run automated test: login form submits".to_string(),
                "3. Test fails".to_string(),
            ]
        );
        assert_eq!(bug.expected_result, "Test should pass");
        assert_eq!(bug.actual_result, "Test failed");
    }

    #[test]
    fn test_bug_repair_clamps_and_coerces() {
        let raw: RawBug = serde_json::from_value(serde_json::json!({
            "bugId": 42,
            "title": "x".repeat(300),
            "description": "y".repeat(900),
            "severity": "LOW",
            "steps_to_reproduce": "Open the page",
            "user_impact": null
        }))
        .unwrap();
        let bug = raw.repair(&failure(), "https://acme.test");
        assert_eq!(bug.id, "42");
        assert_eq!(bug.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(bug.description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert_eq!(bug.severity, Severity::Low);
        assert_eq!(bug.steps_to_reproduce, vec!["Open the page".to_string()]);
        assert_eq!(bug.user_impact, "Users may experience issues with this feature");
    }

    #[test]
    fn test_invalid_severity_is_reclassified() {
        let raw: RawBug =
            serde_json::from_value(serde_json::json!({"severity": "urgent"})).unwrap();
        let failure = Failure::new("Checkout completes", "expected 1 to equal 2");
        assert_eq!(raw.repair(&failure, "").severity, Severity::High);
    }

    #[test]
    fn test_recommendation_repair() {
        let raw: RawRecommendation = serde_json::from_value(serde_json::json!({
            "title": "",
            "impact": "HIGH",
            "category": "branding"
        }))
        .unwrap();
        let rec = raw.repair();
        assert!(rec.id.starts_with("rec_"));
        assert_eq!(rec.title, "Test Recommendation");
        assert_eq!(rec.description, "No description provided");
        assert_eq!(rec.impact, Impact::High);
        assert_eq!(rec.category, Category::Ux);
    }
}
