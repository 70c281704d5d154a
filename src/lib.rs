//! Web Triage - sandboxed execution and plain-language triage of generated
//! browser test scripts.
//!
//! This crate provides:
//! - Script normalization and static analysis of test declarations and selectors
//! - Instrumented execution in an isolated runner process with a hard timeout
//! - Recovery of the runner's JSON report, even from noisy or truncated output
//! - Severity classification and business-readable bug reports
//! - Recommendations grounded in the page and the run, with deterministic fallbacks
//! - Screenshot collection and guaranteed cleanup of run-scoped files
//!
//! # Example
//!
//! ```rust,no_run
//! use web_triage::{Config, Pipeline, RunRequest, Unavailable};
//!
//! let config = Config::from_env();
//! let generator = Unavailable::new("offline");
//! let pipeline = Pipeline::new(&config, &generator);
//! let request = RunRequest::new(
//!     "test('home', async ({ page }) => { await page.goto('https://example.com'); });",
//!     "https://example.com",
//! );
//! let response = pipeline.run(&request).unwrap();
//! println!("{}: {} bugs", response.status, response.bugs.len());
//! ```

pub mod artifacts;
pub mod config;
pub mod generator;
pub mod narrative;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod script;
pub mod session;
pub mod severity;
pub mod types;

// Re-export configuration
pub use config::{Config, GeneratorSettings, RunnerSettings};

// Re-export the data model
pub use types::{
    Bug, Category, Failure, Impact, InputDescriptor, PageSnapshot, Recommendation, RunRequest,
    RunResponse, RunStatus, Screenshot, Severity,
};

// Re-export the orchestrator
pub use pipeline::{Pipeline, PipelineError, PipelineResult, Stage};

// Re-export generator clients
pub use generator::{GeminiClient, GenerateError, GenerateResult, TextGenerator, Unavailable};

// Re-export script tooling
pub use script::{GeneratedScript, ScriptProfile, analyze_script, generate_test_script, normalize_script};
