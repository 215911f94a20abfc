mod scan_mode;
mod scan_progress;
mod scan_result;
mod scan_summary;
mod video_file;

pub use scan_mode::{ScanDepth, ScanMode, ScanPhase};
pub use scan_progress::ScanProgress;
pub use scan_result::{ScanResult, ScanStatus};
pub use scan_summary::{ScanSummary, StopReason};
pub use video_file::VideoFile;
