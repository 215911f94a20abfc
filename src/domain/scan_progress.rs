use super::scan_mode::ScanPhase;
use super::scan_result::ScanStatus;

/// Live counters, mutated only by the Progress aggregator.
///
/// Cheap to clone: it is handed out as an atomic snapshot to [`crate::sinks::ProgressSink`]
/// callbacks, which must not block while holding it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    pub total: usize,
    pub processed: usize,
    pub healthy: usize,
    pub corrupt: usize,
    pub suspicious: usize,
    pub error: usize,
    pub current_file: Option<String>,
    pub phase: ScanPhase,
    pub start_time_unix: i64,
}

impl ScanProgress {
    pub fn new(total: usize, start_time_unix: i64) -> Self {
        Self {
            total,
            processed: 0,
            healthy: 0,
            corrupt: 0,
            suspicious: 0,
            error: 0,
            current_file: None,
            phase: ScanPhase::Idle,
            start_time_unix,
        }
    }

    /// Keeps healthy + corrupt + suspicious + error == processed at all times.
    pub(crate) fn record(&mut self, status: ScanStatus) {
        self.processed += 1;
        match status {
            ScanStatus::Healthy => self.healthy += 1,
            ScanStatus::Corrupt => self.corrupt += 1,
            ScanStatus::Suspicious => self.suspicious += 1,
            ScanStatus::Error => self.error += 1,
        }
    }
}
