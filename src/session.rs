//! Run-scoped temporary resources.
//!
//! Every pipeline run owns one script file and one capture directory, both
//! named with a per-run random suffix so concurrent runs never collide. The
//! [`RunSession`] releases them when [`RunSession::cleanup`] is called and,
//! as a backstop, when it is dropped on any other exit path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Prefix of the composed test script file
const SCRIPT_PREFIX: &str = "ai_test_";

/// Suffix the test runner needs to recognise the file as a spec
const SCRIPT_SUFFIX: &str = ".spec.js";

/// Prefix of the screenshot capture directory
const CAPTURE_PREFIX: &str = "pw_screens_";

/// Temporary files owned by a single pipeline run
#[derive(Debug)]
pub struct RunSession {
    /// Random run identifier (12 hex characters)
    pub id: String,
    /// Where the composed script is written
    pub script_path: PathBuf,
    /// Where the screenshot hook writes captures
    pub capture_dir: PathBuf,
    released: bool,
}

impl RunSession {
    /// Plan a new session under `base_dir`. Nothing is created until [`init`](Self::init).
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let id = generate_run_id();
        let base_dir = base_dir.as_ref();

        Self {
            script_path: base_dir.join(format!("{SCRIPT_PREFIX}{id}{SCRIPT_SUFFIX}")),
            capture_dir: base_dir.join(format!("{CAPTURE_PREFIX}{id}")),
            id,
            released: false,
        }
    }

    /// Create the capture directory
    pub fn init(&self) -> io::Result<()> {
        if let Some(parent) = self.capture_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(&self.capture_dir)
    }

    /// Persist the composed script
    pub fn write_script(&self, contents: &str) -> io::Result<()> {
        fs::write(&self.script_path, contents)
    }

    /// Remove the script file and capture directory.
    ///
    /// Both removals are attempted even if the first fails; the first error
    /// is returned. Missing resources are not an error.
    pub fn cleanup(&mut self) -> io::Result<()> {
        self.released = true;
        let file_result = remove_file_if_exists(&self.script_path);
        let dir_result = remove_dir_if_exists(&self.capture_dir);
        file_result.and(dir_result)
    }
}

impl Drop for RunSession {
    fn drop(&mut self) {
        if !self.released {
            let _ = remove_file_if_exists(&self.script_path);
            let _ = remove_dir_if_exists(&self.capture_dir);
        }
    }
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Generate a unique run ID
fn generate_run_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_paths_are_unique_and_scoped() {
        let base = tempfile::tempdir().unwrap();
        let a = RunSession::new(base.path());
        let b = RunSession::new(base.path());

        assert_eq!(a.id.len(), 12);
        assert_ne!(a.id, b.id);
        assert!(a.script_path.starts_with(base.path()));
        assert!(a.script_path.to_string_lossy().ends_with(".spec.js"));
        assert!(a.capture_dir.ends_with(format!("pw_screens_{}", a.id)));
    }

    #[test]
    fn test_cleanup_removes_everything() {
        let base = tempfile::tempdir().unwrap();
        let mut session = RunSession::new(base.path());
        session.init().unwrap();
        session.write_script("test('a', () => {});").unwrap();
        fs::write(session.capture_dir.join("shot.png"), b"png").unwrap();

        session.cleanup().unwrap();
        assert!(!session.script_path.exists());
        assert!(!session.capture_dir.exists());

        // A second cleanup finds nothing to remove.
        session.cleanup().unwrap();
    }

    #[test]
    fn test_drop_releases_resources() {
        let base = tempfile::tempdir().unwrap();
        let (script_path, capture_dir) = {
            let session = RunSession::new(base.path());
            session.init().unwrap();
            session.write_script("x").unwrap();
            (session.script_path.clone(), session.capture_dir.clone())
        };
        assert!(!script_path.exists());
        assert!(!capture_dir.exists());
    }
}
