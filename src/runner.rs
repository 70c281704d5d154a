//! Instrumented execution of a test script in an isolated runner process.
//!
//! The script is prefixed with an `afterEach` hook that screenshots every
//! test into the run's capture directory, written to the run's script file,
//! and handed to the runner command as a discrete argument (no shell). The
//! child runs with one worker and a hard wall-clock ceiling.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::RunnerSettings;
use crate::session::RunSession;

/// Environment variable the hook reads its capture directory from
pub const SCREENSHOT_DIR_ENV: &str = "PW_SCREENSHOT_DIR";

/// Flags appended after the script path
const RUNNER_FLAGS: [&str; 2] = ["--reporter=json", "--workers=1"];

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for output pipes to close once the child has exited.
/// Grandchildren that outlive the runner can hold the pipes open.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Result type for runner operations
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while composing or executing a script
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The process outlived the wall-clock ceiling and was killed
    #[error("Test execution exceeded the {}s limit", .limit.as_secs())]
    Timeout { limit: Duration, elapsed: Duration },
    /// The runner program could not be started
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// No runner program configured
    #[error("Runner command is empty")]
    EmptyCommand,
    /// I/O error while writing the script or polling the child
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw output of one runner invocation
#[derive(Debug, Clone)]
pub struct RawRun {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, if the process exited normally. Informational only.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

/// Prefix `script` with the per-test screenshot hook.
///
/// The hook imports under private aliases so it cannot clash with the
/// script's own `import { test }`. Capture failures are logged by the hook
/// and never fail the test.
pub fn compose_script(script: &str, capture_dir: &Path) -> String {
    let dir = capture_dir.to_string_lossy().replace('\\', "/");
    let dir_literal = serde_json::Value::String(dir).to_string();

    format!(
        r#"// --- Auto Screenshot Hook ---
import {{ test as __captureTest }} from '@playwright/test';
import __capturePath from 'path';
__captureTest.afterEach(async ({{ page }}, testInfo) => {{
  try {{
    const dir = process.env.{SCREENSHOT_DIR_ENV} || {dir_literal};
    const safe = testInfo.title.replace(/[^a-zA-Z0-9-_]/g, '_').slice(0, 100);
    const file = __capturePath.join(dir, `${{safe}}_${{Date.now()}}.png`);
    await page.screenshot({{ path: file, fullPage: true }});
  }} catch (e) {{
    console.warn('Screenshot hook error', e);
  }}
}});

{script}"#
    )
}

/// Format a wall time as "4.2s" under a minute, "5m 3s" otherwise
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let whole = elapsed.as_secs();
        format!("{}m {}s", whole / 60, whole % 60)
    }
}

/// Executes composed scripts with the configured runner command
#[derive(Debug, Clone, Copy)]
pub struct InstrumentedRunner<'a> {
    settings: &'a RunnerSettings,
}

impl<'a> InstrumentedRunner<'a> {
    pub fn new(settings: &'a RunnerSettings) -> Self {
        Self { settings }
    }

    /// Compose, persist, and execute `script` inside `session`
    pub fn run(&self, script: &str, session: &RunSession) -> RunnerResult<RawRun> {
        session.write_script(&compose_script(script, &session.capture_dir))?;
        debug!(run_id = %session.id, path = %session.script_path.display(), "wrote composed script");
        self.execute(session)
    }

    fn execute(&self, session: &RunSession) -> RunnerResult<RawRun> {
        let (program, leading) = self
            .settings
            .command
            .split_first()
            .ok_or(RunnerError::EmptyCommand)?;

        let mut command = Command::new(program);
        command
            .args(leading)
            .arg(&session.script_path)
            .args(RUNNER_FLAGS)
            .env(SCREENSHOT_DIR_ENV, &session.capture_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.settings.working_dir {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        info!(run_id = %session.id, %program, "starting test runner");
        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| RunnerError::Launch {
            program: program.clone(),
            source,
        })?;

        let stdout_rx = spawn_drain(child.stdout.take());
        let stderr_rx = spawn_drain(child.stderr.take());

        let limit = self.settings.timeout();
        let status = match wait_with_deadline(&mut child, started, limit) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let elapsed = started.elapsed();
                warn!(run_id = %session.id, ?elapsed, "test runner timed out, killing process group");
                return Err(RunnerError::Timeout { limit, elapsed });
            }
            Err(e) => {
                terminate(&mut child);
                return Err(RunnerError::Io(e));
            }
        };
        let elapsed = started.elapsed();

        // Stragglers left in the group would keep the pipes open
        kill_group(&child);
        let drain_deadline = Instant::now() + OUTPUT_DRAIN_TIMEOUT;

        let run = RawRun {
            stdout: collect_output(&stdout_rx, drain_deadline, "stdout"),
            stderr: collect_output(&stderr_rx, drain_deadline, "stderr"),
            exit_code: status.code(),
            elapsed,
        };

        info!(
            run_id = %session.id,
            exit_code = ?run.exit_code,
            stdout_bytes = run.stdout.len(),
            ?elapsed,
            "test runner finished"
        );
        Ok(run)
    }
}

/// Poll the child until it exits or `limit` passes. `Ok(None)` means the
/// deadline passed and the child has been killed.
fn wait_with_deadline(
    child: &mut Child,
    started: Instant,
    limit: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= limit {
            terminate(child);
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child together with anything it spawned
fn terminate(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// SIGKILL every process left in the child's process group
fn kill_group(child: &Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Err(err) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            debug!(%err, "killpg found nothing to kill");
        }
    }
    #[cfg(not(unix))]
    let _ = child;
}

/// Forward a pipe in chunks. The channel disconnects at end of stream.
fn spawn_drain<R>(reader: Option<R>) -> Receiver<Vec<u8>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    if let Some(mut reader) = reader {
        thread::spawn(move || {
            let mut buffer = vec![0u8; READ_CHUNK_BYTES];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buffer[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });
    }
    rx
}

/// Gather chunks until the stream closes or `deadline` passes. Output read
/// before the deadline is kept either way.
fn collect_output(rx: &Receiver<Vec<u8>>, deadline: Instant, stream: &str) -> String {
    let mut bytes = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                bytes.extend(rx.try_iter().flatten());
                warn!(
                    stream,
                    bytes = bytes.len(),
                    "runner output did not close in time; keeping what was read"
                );
                break;
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
