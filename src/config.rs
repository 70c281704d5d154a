//! Configuration management with environment variable support.
//!
//! A [`Config`] is built once at process start and handed to the pipeline by
//! reference. Nothing here is cached globally.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WEB_TRIAGE_GENERATOR_ENDPOINT` | Generative model API base URL | `https://generativelanguage.googleapis.com/v1beta` |
//! | `WEB_TRIAGE_GENERATOR_MODEL` | Model name (falls back to `GEMINI_MODEL`) | `gemini-2.0-flash-exp` |
//! | `WEB_TRIAGE_GENERATOR_API_KEY` | API key (falls back to `GEMINI_API_KEY`) | unset |
//! | `WEB_TRIAGE_GENERATOR_TIMEOUT` | Request timeout in seconds | `60` |
//! | `WEB_TRIAGE_RUNNER_COMMAND` | Test runner command, split on whitespace | `npx playwright test` |
//! | `WEB_TRIAGE_RUNNER_WORKDIR` | Working directory for the runner | current dir |
//! | `WEB_TRIAGE_RUNNER_TIMEOUT` | Wall-clock ceiling in seconds | `300` |
//! | `WEB_TRIAGE_TEMP_DIR` | Base directory for run-scoped files | OS temp dir |
//!
//! # Example
//!
//! ```bash
//! export WEB_TRIAGE_GENERATOR_API_KEY="..."
//! export WEB_TRIAGE_RUNNER_WORKDIR="/srv/playwright-project"
//! export WEB_TRIAGE_RUNNER_TIMEOUT=120
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default generative model API base URL
pub const DEFAULT_GENERATOR_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model name
pub const DEFAULT_GENERATOR_MODEL: &str = "gemini-2.0-flash-exp";

/// Default request timeout for the generative call (seconds)
pub const DEFAULT_GENERATOR_TIMEOUT: u64 = 60;

/// Default browser-test runner command
pub const DEFAULT_RUNNER_COMMAND: &str = "npx playwright test";

/// Default wall-clock ceiling for one runner invocation (seconds)
pub const DEFAULT_RUNNER_TIMEOUT: u64 = 300;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_GENERATOR_ENDPOINT: &str = "WEB_TRIAGE_GENERATOR_ENDPOINT";
pub const ENV_GENERATOR_MODEL: &str = "WEB_TRIAGE_GENERATOR_MODEL";
pub const ENV_GENERATOR_API_KEY: &str = "WEB_TRIAGE_GENERATOR_API_KEY";
pub const ENV_GENERATOR_TIMEOUT: &str = "WEB_TRIAGE_GENERATOR_TIMEOUT";
pub const ENV_RUNNER_COMMAND: &str = "WEB_TRIAGE_RUNNER_COMMAND";
pub const ENV_RUNNER_WORKDIR: &str = "WEB_TRIAGE_RUNNER_WORKDIR";
pub const ENV_RUNNER_TIMEOUT: &str = "WEB_TRIAGE_RUNNER_TIMEOUT";
pub const ENV_TEMP_DIR: &str = "WEB_TRIAGE_TEMP_DIR";

// ============================================================================
// Legacy Environment Variable Support
// ============================================================================

/// Model name variable used by the earlier service deployment
pub const ENV_GENERATOR_MODEL_LEGACY: &str = "GEMINI_MODEL";

/// API key variable used by the earlier service deployment
pub const ENV_GENERATOR_API_KEY_LEGACY: &str = "GEMINI_API_KEY";

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Generative model settings
    pub generator: GeneratorSettings,
    /// Test runner settings
    pub runner: RunnerSettings,
}

/// Settings for the external generative text call
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// API base URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// API key; the pipeline runs on fallbacks when absent
    pub api_key: Option<String>,
    /// Request timeout (seconds)
    pub request_timeout: u64,
}

/// Settings for the browser-test subprocess
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Program followed by its leading arguments
    pub command: Vec<String>,
    /// Working directory for the child process
    pub working_dir: Option<PathBuf>,
    /// Wall-clock ceiling (seconds)
    pub timeout_secs: u64,
    /// Base directory for run-scoped files
    pub temp_dir: PathBuf,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            generator: GeneratorSettings::from_env(),
            runner: RunnerSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            generator: GeneratorSettings::defaults(),
            runner: RunnerSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl GeneratorSettings {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var(ENV_GENERATOR_ENDPOINT)
                .unwrap_or_else(|_| DEFAULT_GENERATOR_ENDPOINT.to_string()),
            model: env::var(ENV_GENERATOR_MODEL)
                .or_else(|_| env::var(ENV_GENERATOR_MODEL_LEGACY))
                .unwrap_or_else(|_| DEFAULT_GENERATOR_MODEL.to_string()),
            api_key: env::var(ENV_GENERATOR_API_KEY)
                .or_else(|_| env::var(ENV_GENERATOR_API_KEY_LEGACY))
                .ok()
                .filter(|key| !key.trim().is_empty()),
            request_timeout: parse_env(ENV_GENERATOR_TIMEOUT).unwrap_or(DEFAULT_GENERATOR_TIMEOUT),
        }
    }

    pub fn defaults() -> Self {
        Self {
            endpoint: DEFAULT_GENERATOR_ENDPOINT.to_string(),
            model: DEFAULT_GENERATOR_MODEL.to_string(),
            api_key: None,
            request_timeout: DEFAULT_GENERATOR_TIMEOUT,
        }
    }
}

impl RunnerSettings {
    pub fn from_env() -> Self {
        Self {
            command: env::var(ENV_RUNNER_COMMAND)
                .ok()
                .and_then(|raw| parse_command(&raw))
                .unwrap_or_else(default_command),
            working_dir: env::var(ENV_RUNNER_WORKDIR).ok().map(PathBuf::from),
            timeout_secs: parse_env(ENV_RUNNER_TIMEOUT).unwrap_or(DEFAULT_RUNNER_TIMEOUT),
            temp_dir: env::var(ENV_TEMP_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            command: default_command(),
            working_dir: None,
            timeout_secs: DEFAULT_RUNNER_TIMEOUT,
            temp_dir: env::temp_dir(),
        }
    }

    /// Wall-clock ceiling as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Replace the runner command (program followed by leading arguments)
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Split a command line on whitespace. Returns `None` for a blank command.
fn parse_command(raw: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() { None } else { Some(parts) }
}

fn default_command() -> Vec<String> {
    DEFAULT_RUNNER_COMMAND
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
