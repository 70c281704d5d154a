//! End-to-end run orchestration.
//!
//! A run moves through `Normalizing`, `Executing`, `Extracting`,
//! `Classifying`, `Collecting` and finally `Done`. Execution can instead end
//! in `TimedOut` or `Errored`; both still produce a complete response with a
//! canned bug and generated recommendations. The run's temporary files are
//! removed on every path.

use std::collections::HashSet;
use std::fmt;
use std::thread;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::artifacts::{ScreenshotSet, collect_screenshots};
use crate::config::Config;
use crate::generator::TextGenerator;
use crate::narrative::{NarrativeGenerator, NarrativeInput, fallback, truncate_chars};
use crate::report::{self, RunStats};
use crate::runner::{InstrumentedRunner, RawRun, RunnerError, format_duration};
use crate::script::{ScriptProfile, analyze_script, normalize_script};
use crate::session::RunSession;
use crate::types::{Failure, RunRequest, RunResponse, RunStatus};

/// Diagnostic stream lines copied into the response logs
const STDERR_LOG_LINES: usize = 6;

/// Raw stdout kept in the logs when no report could be parsed
const UNPARSED_STDOUT_CHARS: usize = 800;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that reject a request before any work begins
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Missing '{0}' parameter")]
    MissingInput(&'static str),
}

impl RunRequest {
    /// Reject requests without a script
    pub fn validate(&self) -> PipelineResult<()> {
        if self.script.trim().is_empty() {
            return Err(PipelineError::MissingInput("script"));
        }
        Ok(())
    }
}

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalizing,
    Executing,
    Extracting,
    Classifying,
    Collecting,
    Done,
    TimedOut,
    Errored,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Normalizing => "normalizing",
            Stage::Executing => "executing",
            Stage::Extracting => "extracting",
            Stage::Classifying => "classifying",
            Stage::Collecting => "collecting",
            Stage::Done => "done",
            Stage::TimedOut => "timed_out",
            Stage::Errored => "errored",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-visible log lines, deduplicated in first-seen order on output
#[derive(Debug, Default)]
struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn into_lines(self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.lines
            .into_iter()
            .filter(|line| seen.insert(line.clone()))
            .collect()
    }
}

/// What the report said about a finished run
#[derive(Debug, Default)]
struct Extraction {
    results: Option<Value>,
    failures: Vec<Failure>,
    stats: Option<RunStats>,
}

/// Runs scripts end to end with one configuration and one generator
pub struct Pipeline<'a> {
    config: &'a Config,
    generator: &'a dyn TextGenerator,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, generator: &'a dyn TextGenerator) -> Self {
        Self { config, generator }
    }

    /// Execute one request.
    ///
    /// Only a request without a script is rejected. Every other problem is
    /// reported through the response's `status`.
    pub fn run(&self, request: &RunRequest) -> PipelineResult<RunResponse> {
        self.run_traced(request).map(|(response, _)| response)
    }

    /// Execute one request, also returning the stages it passed through
    fn run_traced(&self, request: &RunRequest) -> PipelineResult<(RunResponse, Vec<Stage>)> {
        request.validate()?;

        let started = Instant::now();
        let mut session = RunSession::new(&self.config.runner.temp_dir);
        let mut log = RunLog::default();
        let mut trace = StageTrace::new(&session.id);
        info!(run_id = %session.id, url = %request.url, "starting run");

        trace.enter(Stage::Normalizing);
        let script = normalize_script(&request.script);
        let profile = analyze_script(&script);
        debug!(
            run_id = %session.id,
            tests = profile.test_names.len(),
            selectors = profile.selectors.len(),
            "analyzed script"
        );

        let response = match self.execute(&script, &session, &mut log, &mut trace) {
            Ok(raw) => self.complete(request, &profile, &session, raw, log, &mut trace),
            Err(RunnerError::Timeout { limit, elapsed }) => {
                trace.enter(Stage::TimedOut);
                let limit = limit.as_secs();
                log.push(format!("Test execution timeout ({limit}s limit)"));
                let failures = [Failure::new(
                    "Test Timeout",
                    format!("Execution exceeded {limit}s limit"),
                )];
                let narrative = NarrativeGenerator::new(self.generator);
                let input = NarrativeInput::new(&request.url, &profile, &failures)
                    .page(request.page_snapshot.as_ref());

                RunResponse {
                    success: false,
                    status: RunStatus::Timeout,
                    logs: log.into_lines(),
                    bugs: vec![fallback::timeout_bug(&request.url)],
                    recommendations: narrative.recommendations(&input),
                    duration: format_duration(elapsed),
                    screenshots: Vec::new(),
                    results: None,
                }
            }
            Err(e) => {
                trace.enter(Stage::Errored);
                warn!(run_id = %session.id, error = %e, "run failed");
                let message = e.to_string();
                log.push(format!("Unexpected error: {message}"));
                let failures = [Failure::new("Execution Error", message.clone())];
                let narrative = NarrativeGenerator::new(self.generator);
                let input = NarrativeInput::new(&request.url, &profile, &failures)
                    .page(request.page_snapshot.as_ref());

                RunResponse {
                    success: false,
                    status: RunStatus::Error,
                    logs: log.into_lines(),
                    bugs: vec![fallback::technical_issue_bug(&message)],
                    recommendations: narrative.recommendations(&input),
                    duration: format_duration(started.elapsed()),
                    screenshots: Vec::new(),
                    results: None,
                }
            }
        };

        if let Err(e) = session.cleanup() {
            warn!(run_id = %session.id, error = %e, "failed to remove run files");
        }

        info!(
            run_id = %session.id,
            status = %response.status,
            bugs = response.bugs.len(),
            recommendations = response.recommendations.len(),
            duration = %response.duration,
            "run finished"
        );
        Ok((response, trace.stages))
    }

    fn execute(
        &self,
        script: &str,
        session: &RunSession,
        log: &mut RunLog,
        trace: &mut StageTrace,
    ) -> Result<RawRun, RunnerError> {
        trace.enter(Stage::Executing);
        session.init()?;
        log.push(format!(
            "Executing: {} <script> --reporter=json --workers=1",
            self.config.runner.command.join(" ")
        ));
        InstrumentedRunner::new(&self.config.runner).run(script, session)
    }

    /// Finish a run whose runner exited on its own.
    ///
    /// Screenshots are gathered on a scoped thread while the narratives are
    /// generated.
    fn complete(
        &self,
        request: &RunRequest,
        profile: &ScriptProfile,
        session: &RunSession,
        raw: RawRun,
        mut log: RunLog,
        trace: &mut StageTrace,
    ) -> RunResponse {
        let stderr_lines: Vec<&str> = raw.stderr.lines().take(STDERR_LOG_LINES).collect();
        if !stderr_lines.is_empty() {
            log.push("STDERR:");
            for line in stderr_lines {
                log.push(line);
            }
        }

        trace.enter(Stage::Extracting);
        let extraction = extract(&raw, &mut log);

        trace.enter(Stage::Classifying);
        let status = if extraction.failures.is_empty() {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };
        let narrative = NarrativeGenerator::new(self.generator);
        let input = NarrativeInput::new(&request.url, profile, &extraction.failures)
            .page(request.page_snapshot.as_ref())
            .stats(extraction.stats);

        let (bugs, recommendations, screenshots) = thread::scope(|scope| {
            trace.enter(Stage::Collecting);
            let collector = scope.spawn(|| collect_screenshots(&session.capture_dir));
            let bugs = narrative.bugs(&input);
            let recommendations = narrative.recommendations(&input);
            let screenshots = collector.join().unwrap_or_else(|_| {
                warn!(run_id = %session.id, "screenshot collector panicked");
                ScreenshotSet::default()
            });
            (bugs, recommendations, screenshots)
        });

        log.push(format!("Collected {} screenshots.", screenshots.len()));
        if let Some(path) = &screenshots.representative {
            debug!(run_id = %session.id, path = %path.display(), "representative screenshot");
        }

        log.push(format!(
            "Generated {} bug reports and {} recommendations.",
            bugs.len(),
            recommendations.len()
        ));
        log.push("Test execution complete.");
        trace.enter(Stage::Done);

        RunResponse {
            success: true,
            status,
            logs: log.into_lines(),
            bugs,
            recommendations,
            duration: format_duration(raw.elapsed),
            screenshots: screenshots.screenshots,
            results: extraction.results,
        }
    }
}

/// Parse the runner's report and pull out its failures
fn extract(raw: &RawRun, log: &mut RunLog) -> Extraction {
    let Some(results) = report::extract_report(&raw.stdout) else {
        log.push("Could not parse test runner JSON output.");
        let head = truncate_chars(&raw.stdout, UNPARSED_STDOUT_CHARS);
        if !head.trim().is_empty() {
            log.push(head);
        }
        return Extraction::default();
    };

    let outcomes = report::flatten_results(&results);
    for outcome in &outcomes {
        log.push(format!("▶ {}: {}", outcome.title, outcome.status));
    }

    Extraction {
        failures: report::collect_failures(&outcomes),
        stats: Some(report::run_stats(&results)),
        results: Some(results),
    }
}

/// Stages a run has entered, in order
#[derive(Debug)]
struct StageTrace {
    run_id: String,
    stages: Vec<Stage>,
}

impl StageTrace {
    fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            stages: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!(run_id = %self.run_id, %stage, "entering stage");
        self.stages.push(stage);
    }
}
