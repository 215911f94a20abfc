use thiserror::Error;

/// Fatal error kinds surfaced by the [`crate::controller::ScanController`].
/// Per-file failures never produce one of these — they are recovered
/// locally into an `error`-status [`crate::domain::ScanResult`].
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid scan root {path}: {reason}")]
    Input { path: String, reason: String },

    #[error("inspector driver error for {path}: {reason}")]
    Driver { path: String, reason: String },

    #[error("resume log error: {reason}")]
    Wal { reason: String },

    #[error("scan cancelled")]
    Cancelled,

    #[error("classifier invariant violated: {0}")]
    Classifier(String),
}
