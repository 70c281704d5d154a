//! Extraction of the runner's structured JSON report.
//!
//! The runner's stdout should be a single JSON document, but crashes and
//! stray logging can surround or truncate it. Extraction never fails loudly:
//! an unrecoverable stream yields `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Failure;

/// Start of the report's top-level object
static REPORT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\s*"(?:config|suites)"\s*:"#).expect("static report marker must compile"));

/// Terminal color sequences embedded in runner error messages
static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("static ANSI pattern must compile"));

/// Result statuses that count as failures
const FAILING_STATUSES: [&str; 2] = ["failed", "timedOut"];

/// One flattened test result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub title: String,
    pub status: String,
    /// Error message for failing results
    pub message: Option<String>,
}

impl TestOutcome {
    pub fn is_failure(&self) -> bool {
        FAILING_STATUSES.contains(&self.status.as_str())
    }
}

/// Pass/fail counts over a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Number of tests declared in the report
    pub total: usize,
    /// Number of results that passed
    pub passed: usize,
    pub failed: usize,
}

/// Recover the structured report from raw runner stdout.
///
/// First tries the whole text. Otherwise finds the first report marker and
/// shrinks the candidate span from the end until it parses.
pub fn extract_report(stdout: &str) -> Option<Value> {
    if stdout.trim().is_empty() {
        return None;
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(stdout) {
        return Some(value);
    }

    let start = REPORT_MARKER.find(stdout)?.start();
    let candidate = &stdout[start..];

    // A JSON object can only end on a closing brace, so only those ends are tried.
    candidate
        .match_indices('}')
        .rev()
        .find_map(|(idx, _)| serde_json::from_str::<Value>(&candidate[..=idx]).ok())
        .filter(Value::is_object)
}

/// Flatten the suite/spec/test/result tree into ordered outcomes
pub fn flatten_results(report: &Value) -> Vec<TestOutcome> {
    let mut outcomes = Vec::new();
    for suite in array(report, "suites") {
        walk_suite(suite, &mut outcomes);
    }
    outcomes
}

fn walk_suite(suite: &Value, outcomes: &mut Vec<TestOutcome>) {
    for spec in array(suite, "specs") {
        let spec_title = spec.get("title").and_then(Value::as_str);
        for test in array(spec, "tests") {
            let title = test
                .get("title")
                .and_then(Value::as_str)
                .or(spec_title)
                .unwrap_or("Unnamed")
                .to_string();

            for result in array(test, "results") {
                let status = result
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let message = FAILING_STATUSES
                    .contains(&status.as_str())
                    .then(|| error_message(result));

                outcomes.push(TestOutcome {
                    title: title.clone(),
                    status,
                    message,
                });
            }
        }
    }

    for nested in array(suite, "suites") {
        walk_suite(nested, outcomes);
    }
}

/// Message text of a failing result
fn error_message(result: &Value) -> String {
    let error = result
        .get("error")
        .or_else(|| result.get("errors").and_then(|errors| errors.get(0)));

    let message = match error {
        Some(Value::Object(map)) => map
            .get("message")
            .map(value_text)
            .unwrap_or_else(|| "Unknown error".to_string()),
        Some(Value::Null) | None => "Unknown error".to_string(),
        Some(other) => value_text(other),
    };

    ANSI_ESCAPE.replace_all(&message, "").into_owned()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Failing outcomes as [`Failure`] records, in report order
pub fn collect_failures(outcomes: &[TestOutcome]) -> Vec<Failure> {
    outcomes
        .iter()
        .filter(|outcome| outcome.is_failure())
        .map(|outcome| {
            Failure::new(
                outcome.title.clone(),
                outcome.message.clone().unwrap_or_default(),
            )
        })
        .collect()
}

/// Count tests and passing results across every suite
pub fn run_stats(report: &Value) -> RunStats {
    fn visit(suite: &Value, stats: &mut RunStats) {
        for spec in array(suite, "specs") {
            for test in array(spec, "tests") {
                stats.total += 1;
                stats.passed += array(test, "results")
                    .filter(|r| r.get("status").and_then(Value::as_str) == Some("passed"))
                    .count();
            }
        }
        for nested in array(suite, "suites") {
            visit(nested, stats);
        }
    }

    let mut stats = RunStats::default();
    for suite in array(report, "suites") {
        visit(suite, &mut stats);
    }
    stats.failed = stats.total.saturating_sub(stats.passed);
    stats
}

fn array<'v>(value: &'v Value, key: &str) -> impl Iterator<Item = &'v Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter())
        .into_iter()
        .flatten()
}
