//! Output location for each recording cycle

use chrono::Local;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{RecordingError, RecordingResult};

/// Supplies the file path for the next cycle
pub trait OutputTarget: Send + Sync {
    fn next_target(&self) -> RecordingResult<PathBuf>;
}

/// Always the same path; an existing file is overwritten by the writer
#[derive(Debug, Clone)]
pub struct FixedTarget {
    path: PathBuf,
}

impl FixedTarget {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl OutputTarget for FixedTarget {
    fn next_target(&self) -> RecordingResult<PathBuf> {
        if self.path.as_os_str().is_empty() {
            return Err(RecordingError::TargetUnavailable("empty output path".to_string()));
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(RecordingError::TargetUnavailable(format!(
                    "directory {:?} does not exist",
                    parent
                )));
            }
        }
        Ok(self.path.clone())
    }
}

/// Names each recording after the local time it started, e.g.
/// `recordings/2026-10-19 14-03-22.mp4`
#[derive(Debug, Clone)]
pub struct TimestampedTarget {
    directory: PathBuf,
    extension: String,
    name_format: String,
}

impl TimestampedTarget {
    pub const DEFAULT_NAME_FORMAT: &'static str = "%Y-%m-%d %H-%M-%S";

    pub fn new<P: Into<PathBuf>>(directory: P, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
            name_format: Self::DEFAULT_NAME_FORMAT.to_string(),
        }
    }

    /// chrono `strftime` pattern for the file stem
    pub fn with_name_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = format.into();
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_name(&self, stem: &str, attempt: u32) -> String {
        let ext = self.extension.trim_start_matches('.');
        match (attempt, ext.is_empty()) {
            (0, true) => stem.to_string(),
            (0, false) => format!("{stem}.{ext}"),
            (n, true) => format!("{stem} ({n})"),
            (n, false) => format!("{stem} ({n}).{ext}"),
        }
    }
}

impl OutputTarget for TimestampedTarget {
    fn next_target(&self) -> RecordingResult<PathBuf> {
        fs::create_dir_all(&self.directory).map_err(|e| {
            RecordingError::TargetUnavailable(format!(
                "cannot create output directory {:?}: {}",
                self.directory, e
            ))
        })?;

        let mut stem = String::new();
        write!(stem, "{}", Local::now().format(&self.name_format)).map_err(|_| {
            RecordingError::TargetUnavailable(format!("invalid name format {:?}", self.name_format))
        })?;
        if stem.is_empty() || stem.contains(std::path::MAIN_SEPARATOR) {
            return Err(RecordingError::TargetUnavailable(format!(
                "name format {:?} does not produce a file name",
                self.name_format
            )));
        }

        // Two cycles in the same second get a numeric suffix
        for attempt in 0..1000 {
            let candidate = self.directory.join(self.file_name(&stem, attempt));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(RecordingError::TargetUnavailable(format!(
            "no free file name for {:?} in {:?}",
            stem, self.directory
        )))
    }
}

impl<F> OutputTarget for F
where
    F: Fn() -> RecordingResult<PathBuf> + Send + Sync,
{
    fn next_target(&self) -> RecordingResult<PathBuf> {
        self()
    }
}
