use serde::{Deserialize, Serialize};

use super::scan_mode::ScanDepth;

/// Classification outcome for one [`super::VideoFile`] at one [`ScanDepth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Healthy,
    Suspicious,
    Corrupt,
    Error,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Healthy => "healthy",
            ScanStatus::Suspicious => "suspicious",
            ScanStatus::Corrupt => "corrupt",
            ScanStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classification of one file at one depth. Created by the classifier,
/// appended to the WAL exactly once per (path, depth) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub path: String,
    pub status: ScanStatus,
    pub depth: ScanDepth,
    pub elapsed: f64,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ScanResult {
    pub fn new(
        path: impl Into<String>,
        status: ScanStatus,
        depth: ScanDepth,
        elapsed: f64,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            status,
            depth,
            elapsed,
            confidence,
            reason: reason.into(),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }
}
