use serde::{Deserialize, Serialize};

use super::scan_mode::ScanMode;

/// Why a scan ended without completing normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    Interrupt,
    Terminate,
}

/// Terminal aggregate over all [`super::ScanResult`]s for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub root: String,
    pub mode: ScanMode,
    pub healthy: usize,
    pub corrupt: usize,
    pub suspicious: usize,
    pub error: usize,
    pub total: usize,
    pub scan_time_seconds: f64,
    pub resumed: bool,
    pub started_at_unix: i64,
    /// `None` when the scan was interrupted/cancelled before finalizing.
    pub completed_at_unix: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

impl ScanSummary {
    pub fn is_complete(&self) -> bool {
        self.completed_at_unix.is_some()
    }
}
