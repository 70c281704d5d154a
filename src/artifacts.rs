//! Screenshot collection from a run's capture directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use base64::Engine;
use image::ImageFormat;
use tracing::{debug, warn};

use crate::types::Screenshot;

/// Screenshots of one run, oldest first
#[derive(Debug, Clone, Default)]
pub struct ScreenshotSet {
    pub screenshots: Vec<Screenshot>,
    /// Path of the earliest capture
    pub representative: Option<PathBuf>,
}

impl ScreenshotSet {
    pub fn len(&self) -> usize {
        self.screenshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screenshots.is_empty()
    }
}

/// Collect every image in `dir`, ordered by modification time.
///
/// An unreadable directory yields an empty set. Files that cannot be read
/// are skipped.
pub fn collect_screenshots(dir: &Path) -> ScreenshotSet {
    match image_files(dir) {
        Ok(files) => encode_all(files),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "screenshot collection failed");
            ScreenshotSet::default()
        }
    }
}

/// Image files in `dir` sorted by mtime; equal times keep directory order
fn image_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || ImageFormat::from_path(&path).is_err() {
            continue;
        }
        let modified = entry.metadata()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((modified, path));
    }

    files.sort_by_key(|(modified, _)| *modified);
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn encode_all(files: Vec<PathBuf>) -> ScreenshotSet {
    let mut set = ScreenshotSet::default();

    for path in files {
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable screenshot");
                continue;
            }
        };

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(%filename, bytes = bytes.len(), "collected screenshot");

        set.screenshots.push(Screenshot {
            filename,
            b64: base64::engine::general_purpose::STANDARD.encode(&bytes),
        });
        if set.representative.is_none() {
            set.representative = Some(path);
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::thread;
    use std::time::Duration;

    fn write_png(path: &Path) {
        RgbImage::from_pixel(4, 4, Rgb([200, 30, 30])).save(path).unwrap();
    }

    #[test]
    fn test_collects_images_in_capture_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("zz_first_100.png"));
        thread::sleep(Duration::from_millis(20));
        write_png(&dir.path().join("aa_second_200.png"));
        fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let set = collect_screenshots(dir.path());
        let names: Vec<&str> = set.screenshots.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(names, vec!["zz_first_100.png", "aa_second_200.png"]);
        assert_eq!(set.representative, Some(dir.path().join("zz_first_100.png")));
    }

    #[test]
    fn test_payload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        write_png(&path);

        let set = collect_screenshots(dir.path());
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&set.screenshots[0].b64)
            .unwrap();
        assert_eq!(decoded, fs::read(&path).unwrap());
        assert_eq!(image::guess_format(&decoded).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = collect_screenshots(&dir.path().join("gone"));
        assert!(set.is_empty());
        assert_eq!(set.representative, None);
    }
}
