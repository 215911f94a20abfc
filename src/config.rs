//! Configuration surface.
//!
//! `ScanConfig` is a plain data struct: no env/file loading happens here.
//! It is constructed by its caller and handed to the controller rather than
//! loaded internally.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::ScanMode;

/// Default quick-pass per-job timeout: short, on the order of 30-60s.
pub const DEFAULT_QUICK_TIMEOUT: Duration = Duration::from_secs(45);
/// Default deep-pass per-job timeout: long, on the order of 15 minutes.
pub const DEFAULT_DEEP_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Name the inspector binary is resolved as from `PATH` when
/// [`ScanConfig::inspector_binary`] is `None`.
pub const DEFAULT_INSPECTOR_NAME: &str = "ffmpeg";

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub mode: ScanMode,
    pub root: PathBuf,
    pub recursive: bool,
    extensions: Vec<String>,
    pub worker_count: usize,
    pub quick_timeout: Duration,
    pub deep_timeout: Duration,
    pub inspector_binary: Option<PathBuf>,
    pub resume_enabled: bool,
    pub output_dir: Option<PathBuf>,
}

impl ScanConfig {
    pub fn new(mode: ScanMode, root: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            root: root.into(),
            recursive: true,
            extensions: Vec::new(),
            worker_count: num_workers_default(),
            quick_timeout: DEFAULT_QUICK_TIMEOUT,
            deep_timeout: DEFAULT_DEEP_TIMEOUT,
            inspector_binary: None,
            resume_enabled: true,
            output_dir: None,
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the extension allowlist; normalized immediately: lower-cased,
    /// leading dot ensured, so `.MP4` and `mp4` both become `.mp4`. An empty
    /// list means "accept every file".
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions.into_iter().map(|e| normalize_extension(e.as_ref())).collect();
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn with_quick_timeout(mut self, timeout: Duration) -> Self {
        self.quick_timeout = timeout;
        self
    }

    pub fn with_deep_timeout(mut self, timeout: Duration) -> Self {
        self.deep_timeout = timeout;
        self
    }

    pub fn with_inspector_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.inspector_binary = Some(path.into());
        self
    }

    pub fn with_resume_enabled(mut self, resume_enabled: bool) -> Self {
        self.resume_enabled = resume_enabled;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Already-normalized extension allowlist.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Where the WAL and its results-snapshot sibling live: the configured
    /// output directory, or the scan root if none was given.
    pub fn effective_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| self.root.clone())
    }
}

fn normalize_extension(ext: &str) -> String {
    let lower = ext.to_ascii_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

fn num_workers_default() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_normalized_on_construction() {
        let config = ScanConfig::new(ScanMode::Quick, "/videos").with_extensions([".MP4", "mkv", ".AVI"]);
        assert_eq!(config.extensions(), &[".mp4", ".mkv", ".avi"]);
    }

    #[test]
    fn worker_count_is_clamped_to_at_least_one() {
        let config = ScanConfig::new(ScanMode::Quick, "/videos").with_worker_count(0);
        assert_eq!(config.worker_count, 1);
    }

    #[test]
    fn output_dir_defaults_to_root() {
        let config = ScanConfig::new(ScanMode::Quick, "/videos");
        assert_eq!(config.effective_output_dir(), PathBuf::from("/videos"));
    }

    #[test]
    fn explicit_output_dir_overrides_root() {
        let config = ScanConfig::new(ScanMode::Quick, "/videos").with_output_dir("/var/scan-state");
        assert_eq!(config.effective_output_dir(), PathBuf::from("/var/scan-state"));
    }
}
