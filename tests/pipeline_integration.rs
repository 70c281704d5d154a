//! End-to-end pipeline runs against a scripted stand-in for the test runner.
//!
//! The runner command is `sh -c <body> <report path>`, so the body sees the
//! report fixture as `$0`, the composed script as `$1`, and the capture
//! directory as `$PW_SCREENSHOT_DIR`.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use web_triage::generator::GenerateResult;
use web_triage::{
    Category, Config, Impact, PageSnapshot, Pipeline, PipelineError, RunRequest, RunResponse,
    RunStatus, RunnerSettings, Severity, Unavailable,
};

const URL: &str = "https://acme.test";

const SCRIPT: &str = "```javascript
import { test, expect } from '@playwright/test';

test('login works', async ({ page }) => {
  await page.goto('https://acme.test');
  await page.getByRole('button', { name: 'Login' }).click();
});
```";

struct Workspace {
    /// Where run-scoped files are created
    work: TempDir,
    fixtures: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            work: tempfile::tempdir().unwrap(),
            fixtures: tempfile::tempdir().unwrap(),
        }
    }

    fn report(&self, report: &serde_json::Value) -> PathBuf {
        let path = self.fixtures.path().join("report.json");
        fs::write(&path, serde_json::to_string_pretty(report).unwrap()).unwrap();
        path
    }

    fn config(&self, body: &str, arg0: &Path, timeout_secs: u64) -> Config {
        let mut config = Config::defaults();
        config.runner = RunnerSettings::defaults()
            .command([
                "sh".to_string(),
                "-c".to_string(),
                body.to_string(),
                arg0.to_string_lossy().into_owned(),
            ])
            .timeout_secs(timeout_secs)
            .temp_dir(self.work.path());
        config
    }

    fn assert_clean(&self) {
        let leftovers: Vec<_> = fs::read_dir(self.work.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "run files left behind: {leftovers:?}");
    }
}

fn result(title: &str, status: &str, error: Option<&str>) -> serde_json::Value {
    let mut result = json!({ "status": status });
    if let Some(message) = error {
        result["error"] = json!({ "message": message });
    }
    json!({ "title": title, "tests": [{ "results": [result] }] })
}

fn report(specs: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "config": { "workers": 1 },
        "suites": [{ "title": "ai_test.spec.js", "specs": specs }],
        "errors": []
    })
}

fn page() -> PageSnapshot {
    PageSnapshot {
        title: "Acme".into(),
        url: URL.into(),
        headings: vec!["Welcome to Acme".into()],
        buttons: vec!["Sign Up".into(), "Login".into()],
        ..Default::default()
    }
}

fn assert_invariants(response: &RunResponse, failures: usize) {
    assert!(response.bugs.len() <= failures.min(5));
    assert!(!response.recommendations.is_empty());
    assert!(response.recommendations.len() <= 5);
    for bug in &response.bugs {
        assert!(bug.title.chars().count() <= 255);
        assert!(bug.description.chars().count() <= 800);
    }
}

const CAPTURE_AND_REPORT: &str = r#"printf 'png' > "$PW_SCREENSHOT_DIR/login_works_1.png"; cat "$0""#;

#[test]
fn passing_run_has_no_bugs_and_keeps_screenshots() {
    let ws = Workspace::new();
    let report_path = ws.report(&report(vec![result("login works", "passed", None)]));
    let config = ws.config(CAPTURE_AND_REPORT, &report_path, 30);
    let generator = Unavailable::new("offline");

    let request = RunRequest::new(SCRIPT, URL).page_snapshot(page());
    let response = Pipeline::new(&config, &generator).run(&request).unwrap();

    assert_eq!(response.status, RunStatus::Passed);
    assert!(response.success);
    assert!(response.bugs.is_empty());
    assert_eq!(response.screenshots.len(), 1);
    assert_eq!(response.screenshots[0].filename, "login_works_1.png");
    assert!(response.results.is_some());
    assert!(response.logs.contains(&"▶ login works: passed".to_string()));
    assert!(response.duration.ends_with('s'));
    assert_invariants(&response, 0);

    // Only "Login" is referenced by the script, so "Sign Up" is reported as untested.
    let rec = &response.recommendations[0];
    assert_eq!(rec.title, "Test additional buttons on Acme");
    assert!(rec.description.contains("'Sign Up'"));
    assert_eq!((rec.impact, rec.category), (Impact::Medium, Category::Ux));

    ws.assert_clean();
}

#[test]
fn failing_run_produces_plain_language_bugs() {
    let ws = Workspace::new();
    let report_path = ws.report(&report(vec![
        result("homepage loads", "passed", None),
        result(
            "clicking 'Sign Up' opens the form",
            "failed",
            Some("Timeout 30000ms exceeded waiting for locator('button:has-text(\"Sign Up\")')"),
        ),
    ]));
    let config = ws.config(r#"cat "$0""#, &report_path, 30);
    let generator = Unavailable::new("offline");

    let response = Pipeline::new(&config, &generator)
        .run(&RunRequest::new(SCRIPT, URL))
        .unwrap();

    assert_eq!(response.status, RunStatus::Failed);
    assert!(response.success);
    assert_eq!(response.bugs.len(), 1);
    let bug = &response.bugs[0];
    assert_eq!(bug.severity, Severity::Critical);
    assert!(bug.title.contains("Sign Up"));
    assert_eq!(bug.steps_to_reproduce[1], "2. Try to use the 'Sign Up' feature");

    assert_eq!(response.recommendations.len(), 1);
    assert_eq!(response.recommendations[0].impact, Impact::High);
    assert_invariants(&response, 1);
    ws.assert_clean();
}

#[test]
fn model_output_is_bounded_by_failures() {
    let ws = Workspace::new();
    let specs = (1..=7)
        .map(|i| result(&format!("check {i}"), "failed", Some("expected true")))
        .collect();
    let report_path = ws.report(&report(specs));
    let config = ws.config(r#"cat "$0""#, &report_path, 30);

    let generator = |prompt: &str| -> GenerateResult<String> {
        let items: Vec<String> = if prompt.contains("\"bugId\"") {
            (0..9)
                .map(|i| format!(r#"{{"title": "Bug {i}", "severity": "low"}}"#))
                .collect()
        } else {
            (0..9)
                .map(|i| format!(r#"{{"title": "Tip {i}", "impact": "high"}}"#))
                .collect()
        };
        Ok(format!("```json\n[{}]\n```", items.join(",\n")))
    };

    let response = Pipeline::new(&config, &generator)
        .run(&RunRequest::new(SCRIPT, URL))
        .unwrap();

    assert_eq!(response.status, RunStatus::Failed);
    assert_eq!(response.bugs.len(), 5);
    assert!(response.bugs.iter().all(|bug| bug.severity == Severity::Low));
    assert_eq!(response.recommendations.len(), 5);
    assert_invariants(&response, 7);
    ws.assert_clean();
}

#[test]
fn noisy_output_and_stderr_are_handled() {
    let ws = Workspace::new();
    let report_path = ws.report(&report(vec![result("login works", "passed", None)]));
    let body = r#"echo "Running 1 test using 1 worker"; cat "$0"; echo "npm notice done"; for i in 1 2 3 4 5 6 7 8; do echo "warn $i" >&2; done; exit 1"#;
    let config = ws.config(body, &report_path, 30);
    let generator = Unavailable::new("offline");

    let response = Pipeline::new(&config, &generator)
        .run(&RunRequest::new(SCRIPT, URL))
        .unwrap();

    assert_eq!(response.status, RunStatus::Passed);
    assert!(response.results.is_some());
    let stderr_at = response.logs.iter().position(|l| l == "STDERR:").unwrap();
    assert_eq!(response.logs[stderr_at + 1], "warn 1");
    assert!(response.logs.contains(&"warn 6".to_string()));
    assert!(!response.logs.contains(&"warn 7".to_string()));
    ws.assert_clean();
}

#[test]
fn unparseable_output_degrades_to_null_results() {
    let ws = Workspace::new();
    let config = ws.config("echo 'Error: no tests found'", Path::new("runner"), 30);
    let generator = Unavailable::new("offline");

    let response = Pipeline::new(&config, &generator)
        .run(&RunRequest::new(SCRIPT, URL))
        .unwrap();

    assert_eq!(response.status, RunStatus::Passed);
    assert!(response.results.is_none());
    assert!(response.bugs.is_empty());
    assert!(
        response
            .logs
            .contains(&"Could not parse test runner JSON output.".to_string())
    );
    assert_invariants(&response, 0);
    ws.assert_clean();
}

#[test]
fn slow_runner_times_out_with_canned_bug() {
    let ws = Workspace::new();
    let config = ws.config(
        r#"printf 'png' > "$PW_SCREENSHOT_DIR/late.png"; sleep 30"#,
        Path::new("runner"),
        1,
    );
    let generator = |_: &str| -> GenerateResult<String> {
        Ok("Sorry, I can't help with that".to_string())
    };

    let response = Pipeline::new(&config, &generator)
        .run(&RunRequest::new(SCRIPT, URL).page_snapshot(page()))
        .unwrap();

    assert_eq!(response.status, RunStatus::Timeout);
    assert!(!response.success);
    assert_eq!(response.bugs.len(), 1);
    assert_eq!(response.bugs[0].severity, Severity::Critical);
    assert_eq!(response.bugs[0].title, "Website is taking too long to respond");
    assert!(response.screenshots.is_empty());
    assert!(response.results.is_none());
    assert!(response.logs.contains(&"Test execution timeout (1s limit)".to_string()));

    // The synthetic timeout failure drives the fallback recommendation.
    assert_eq!(response.recommendations.len(), 1);
    assert_eq!(
        response.recommendations[0].title,
        "Fix an issue with 'Test Timeout' on your website"
    );
    ws.assert_clean();
}

#[test]
fn launch_failure_is_an_error_outcome() {
    let ws = Workspace::new();
    let mut config = Config::defaults();
    config.runner = RunnerSettings::defaults()
        .command(["/nonexistent/playwright"])
        .temp_dir(ws.work.path());
    let generator = Unavailable::new("offline");

    let response = Pipeline::new(&config, &generator)
        .run(&RunRequest::new(SCRIPT, URL))
        .unwrap();

    assert_eq!(response.status, RunStatus::Error);
    assert!(!response.success);
    assert_eq!(response.bugs.len(), 1);
    assert_eq!(response.bugs[0].severity, Severity::Medium);
    assert!(response.bugs[0].description.contains("/nonexistent/playwright"));
    assert!(response.logs.iter().any(|l| l.starts_with("Unexpected error:")));
    assert_eq!(response.recommendations.len(), 1);
    assert!(response.screenshots.is_empty());
    ws.assert_clean();
}

#[test]
fn missing_script_is_rejected_before_any_work() {
    let ws = Workspace::new();
    let config = ws.config("exit 0", Path::new("runner"), 30);
    let generator = Unavailable::new("offline");

    let err = Pipeline::new(&config, &generator)
        .run(&RunRequest::new("", URL))
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput(_)));
    ws.assert_clean();
}

#[test]
fn response_serializes_with_wire_names() {
    let ws = Workspace::new();
    let report_path = ws.report(&report(vec![result(
        "submit form",
        "failed",
        Some("boom"),
    )]));
    let config = ws.config(r#"cat "$0""#, &report_path, 30);
    let generator = Unavailable::new("offline");

    let response = Pipeline::new(&config, &generator)
        .run(&RunRequest::new(SCRIPT, URL))
        .unwrap();
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["status"], "failed");
    assert_eq!(value["bugs"][0]["severity"], "high");
    assert!(value["bugs"][0]["bugId"].as_str().unwrap().starts_with("bug_"));
    assert!(
        value["recommendations"][0]["recommendationId"]
            .as_str()
            .unwrap()
            .starts_with("rec_")
    );
    assert!(value["results"]["suites"].is_array());
    assert!(value["screenshots"].as_array().unwrap().is_empty());
}
