use serde::{Deserialize, Serialize};

/// Caller-selected scan mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Single short bounded pass.
    Quick,
    /// Single long bounded pass.
    Deep,
    /// Quick pass first; suspicious/error results are escalated to deep.
    Hybrid,
    /// Deep pass with no per-file time bound.
    Full,
}

impl ScanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Quick => "quick",
            ScanMode::Deep => "deep",
            ScanMode::Hybrid => "hybrid",
            ScanMode::Full => "full",
        }
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal per-job depth, derived from [`ScanMode`] and the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanDepth {
    Quick,
    Deep,
    /// Deep semantics with no timeout (only reachable via [`ScanMode::Full`]).
    Full,
}

impl ScanDepth {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanDepth::Quick => "quick",
            ScanDepth::Deep => "deep",
            ScanDepth::Full => "full",
        }
    }

    /// Whether the driver should enforce a per-job timeout at all.
    pub fn is_timed(self) -> bool {
        !matches!(self, ScanDepth::Full)
    }
}

impl std::fmt::Display for ScanDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current pass reported to Progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    QuickScan,
    DeepScan,
}

impl ScanPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanPhase::Idle => "idle",
            ScanPhase::QuickScan => "quick_scan",
            ScanPhase::DeepScan => "deep_scan",
        }
    }
}
