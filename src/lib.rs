//! corrupt-scan-core: a video corruption scanning engine.
//!
//! Discovers candidate video files under a root directory, shells out to an
//! external inspector (ffmpeg) to probe each one at an escalating depth, and
//! classifies the outcome into a health verdict. Runs are resumable across
//! process restarts via a write-ahead log, and bound their worker
//! concurrency with a fixed-size pool.
//!
//! [`ScanController::run`] is the crate's entry point; everything else is
//! exposed so a caller can construct [`ScanConfig`], supply the optional
//! sinks/probe [`ScanController::run`] takes, and interpret the
//! [`domain`] types it hands back.

mod classifier;
mod config;
mod controller;
mod discovery;
mod domain;
mod error;
mod inspector;
mod progress;
mod scheduler;
mod signals;
mod sinks;
mod sync_ext;
mod wal;
mod worker_pool;

#[cfg(test)]
pub mod test_support;

pub use config::{ScanConfig, DEFAULT_DEEP_TIMEOUT, DEFAULT_INSPECTOR_NAME, DEFAULT_QUICK_TIMEOUT};
pub use controller::ScanController;
pub use discovery::ContentProbe;
pub use domain::{
    ScanDepth, ScanMode, ScanPhase, ScanProgress, ScanResult, ScanStatus, ScanSummary, StopReason,
    VideoFile,
};
pub use error::ScanError;
pub use sinks::{ProgressSink, ResultSink, SummarySink};
