//! Housekeeping for files the analysis process leaves behind

use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::error::{KioskError, Result};

/// Captured frames
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tga"];

/// Generated voice clips
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl PurgeReport {
    fn merge(&mut self, other: PurgeReport) {
        self.removed.extend(other.removed);
        self.failed.extend(other.failed);
    }
}

/// Delete image and audio files from the capture and voice directories.
pub fn purge(storage: &StorageConfig) -> Result<PurgeReport> {
    let extensions: Vec<&str> = IMAGE_EXTENSIONS
        .iter()
        .chain(AUDIO_EXTENSIONS)
        .copied()
        .collect();

    let mut report = PurgeReport::default();
    for dir in [&storage.capture_dir, &storage.voice_dir] {
        report.merge(purge_dir(dir, &extensions)?);
    }
    info!(
        removed = report.removed.len(),
        failed = report.failed.len(),
        "purge finished"
    );
    Ok(report)
}

/// Delete files in `dir` (not recursive) whose extension is listed. A missing
/// directory is skipped.
pub fn purge_dir(dir: &Path, extensions: &[&str]) -> Result<PurgeReport> {
    let mut report = PurgeReport::default();
    if !dir.is_dir() {
        return Ok(report);
    }

    let base = Pattern::escape(&dir.to_string_lossy());
    for ext in extensions {
        for upper in [false, true] {
            let ext = if upper {
                ext.to_uppercase()
            } else {
                ext.to_string()
            };
            let pattern = format!("{}/*.{}", base, ext);
            let paths = glob::glob(&pattern).map_err(|e| KioskError::InvalidConfig {
                reason: format!("bad purge pattern '{}': {}", pattern, e),
            })?;

            for path in paths.flatten() {
                if !path.is_file() || report.removed.contains(&path) {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => report.removed.push(path),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "could not delete");
                        report.failed.push(path);
                    }
                }
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_purge_removes_media_only() {
        let root = TempDir::new().unwrap();
        let capture = root.path().join("capture");
        let voice = root.path().join("voice");
        fs::create_dir_all(&capture).unwrap();
        fs::create_dir_all(&voice).unwrap();

        touch(&capture, "cap_001.jpg");
        touch(&capture, "cap_002.PNG");
        touch(&capture, "notes.txt");
        touch(&voice, "line.wav");
        touch(&voice, "line.mp3");

        let storage = StorageConfig {
            capture_dir: capture.clone(),
            voice_dir: voice.clone(),
            ..StorageConfig::default()
        };
        let report = purge(&storage).unwrap();

        assert_eq!(report.removed.len(), 4);
        assert!(report.failed.is_empty());
        assert!(capture.join("notes.txt").exists());
        assert!(!voice.join("line.wav").exists());
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let root = TempDir::new().unwrap();
        let report = purge_dir(&root.path().join("nope"), IMAGE_EXTENSIONS).unwrap();
        assert_eq!(report, PurgeReport::default());
    }
}
