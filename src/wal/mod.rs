//! A crash-safe, line-delimited JSON append log. Writers are serialized
//! through a single `Mutex`-guarded file handle.

mod format;

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde_json::Value;

use crate::domain::{ScanDepth, ScanMode, ScanResult, ScanStatus, ScanSummary};
use crate::error::ScanError;
use crate::sync_ext::MutexExt;

pub use format::{extensions_hash, wal_stem, WalFooter, WalHeader, WalTotals, WAL_SCHEMA_VERSION};

/// Parameters that must match an existing WAL's header for it to be
/// considered resumable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalParams {
    pub root: String,
    pub mode: ScanMode,
    pub extensions: Vec<String>,
}

/// Outcome of opening a possibly-pre-existing WAL. `header_matched = false`
/// means the existing file's parameters don't match this run's and it is
/// not resumable; `already_complete` means a footer was present.
///
/// `started_at` and `footer` are only populated when `header_matched` is
/// `true`; the Controller uses them to reconstruct a [`ScanSummary`] for an
/// already-complete WAL without re-running Discovery or the Scheduler.
#[derive(Debug, Clone, Default)]
pub struct WalLoadResult {
    pub header_matched: bool,
    pub already_complete: bool,
    pub prior_results: Vec<ScanResult>,
    pub started_at: Option<i64>,
    pub footer: Option<WalFooter>,
}

fn depth_rank(depth: ScanDepth) -> u8 {
    match depth {
        ScanDepth::Quick => 0,
        ScanDepth::Deep | ScanDepth::Full => 1,
    }
}

pub struct ResumeLog {
    wal_path: PathBuf,
    results_path: PathBuf,
    file: Mutex<File>,
    lock_held: bool,
}

impl ResumeLog {
    fn paths(output_dir: &Path, params: &WalParams) -> (PathBuf, PathBuf) {
        let stem = wal_stem(&params.root, params.mode, &params.extensions);
        (
            output_dir.join(format!("{stem}.wal.jsonl")),
            output_dir.join(format!("{stem}.results.jsonl")),
        )
    }

    /// Inspect a possibly-existing WAL for `params` without creating one.
    /// Does not open the log for writing.
    pub fn load_existing(output_dir: &Path, params: &WalParams) -> anyhow::Result<WalLoadResult> {
        let (wal_path, _results_path) = Self::paths(output_dir, params);
        if !wal_path.exists() {
            return Ok(WalLoadResult::default());
        }

        let file = File::open(&wal_path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let Some(first) = lines.next() else {
            return Ok(WalLoadResult::default());
        };
        let first = first?;
        let header: WalHeader = match serde_json::from_str(&first) {
            Ok(h) => h,
            Err(_) => return Ok(WalLoadResult::default()),
        };

        let expected_hash = extensions_hash(&params.extensions);
        let header_matched =
            header.root == params.root && header.mode == params.mode && header.exts_hash == expected_hash;
        if !header_matched {
            return Ok(WalLoadResult {
                header_matched: false,
                already_complete: false,
                prior_results: Vec::new(),
                started_at: None,
                footer: None,
            });
        }

        let mut by_path: std::collections::HashMap<String, ScanResult> = std::collections::HashMap::new();
        let mut footer: Option<WalFooter> = None;

        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&line)?;
            if value.get("completed_at").is_some() {
                footer = Some(serde_json::from_value(value)?);
                continue;
            }
            let entry: ScanResult = serde_json::from_value(value)?;
            match by_path.get(&entry.path) {
                Some(existing) if depth_rank(existing.depth) > depth_rank(entry.depth) => {}
                _ => {
                    by_path.insert(entry.path.clone(), entry);
                }
            }
        }

        let mut prior_results: Vec<ScanResult> = by_path.into_values().collect();
        prior_results.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(WalLoadResult {
            header_matched: true,
            already_complete: footer.is_some(),
            prior_results,
            started_at: Some(header.started_at),
            footer,
        })
    }

    /// Create (or truncate-and-recreate) the WAL for a fresh or resumed run
    /// and write its header. Acquires an advisory exclusive lock on the WAL
    /// file for the lifetime of this handle.
    pub fn create(output_dir: &Path, params: &WalParams, started_at: i64) -> anyhow::Result<Self> {
        fs::create_dir_all(output_dir)?;
        let (wal_path, results_path) = Self::paths(output_dir, params);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&wal_path)?;
        file.try_lock_exclusive().map_err(|err| {
            anyhow::anyhow!("another scan already holds the WAL lock for {}: {err}", wal_path.display())
        })?;

        // Fresh header only if the file is empty (append-across-resume keeps
        // the original header so `load_existing` still matches on restart).
        if file.metadata()?.len() == 0 {
            let header = WalHeader {
                v: WAL_SCHEMA_VERSION,
                mode: params.mode,
                root: params.root.clone(),
                exts: params.extensions.clone(),
                exts_hash: extensions_hash(&params.extensions),
                started_at,
            };
            let mut file_ref = &file;
            writeln!(file_ref, "{}", serde_json::to_string(&header)?)?;
            file_ref.sync_all()?;
        }

        Ok(Self {
            wal_path,
            results_path,
            file: Mutex::new(file),
            lock_held: true,
        })
    }

    /// Append one result: serialized, flushed, and fsynced before returning.
    /// Writers are serialized by the internal mutex.
    pub fn append(&self, result: &ScanResult) -> Result<(), ScanError> {
        let line = serde_json::to_string(result).map_err(|err| ScanError::Wal {
            reason: format!("failed to serialize result: {err}"),
        })?;

        let mut file = self.file.lock_unpoisoned();
        writeln!(file, "{line}").map_err(|err| ScanError::Wal {
            reason: format!("failed to append to WAL: {err}"),
        })?;
        file.sync_all().map_err(|err| ScanError::Wal {
            reason: format!("failed to fsync WAL: {err}"),
        })?;
        drop(file);

        // Sibling results snapshot mirrors the same entry lines.
        let mut results_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.results_path)
            .map_err(|err| ScanError::Wal {
                reason: format!("failed to open results snapshot: {err}"),
            })?;
        writeln!(results_file, "{line}").map_err(|err| ScanError::Wal {
            reason: format!("failed to append to results snapshot: {err}"),
        })?;
        Ok(())
    }

    /// Append the footer line and release the WAL lock. The results
    /// snapshot is left in place.
    pub fn finalize(&mut self, summary: &ScanSummary) -> Result<(), ScanError> {
        let footer = WalFooter {
            completed_at: summary.completed_at_unix.unwrap_or(summary.started_at_unix),
            totals: WalTotals {
                healthy: summary.healthy,
                corrupt: summary.corrupt,
                suspicious: summary.suspicious,
                error: summary.error,
            },
            scan_time: summary.scan_time_seconds,
        };
        let line = serde_json::to_string(&footer).map_err(|err| ScanError::Wal {
            reason: format!("failed to serialize footer: {err}"),
        })?;
        let mut file = self.file.lock_unpoisoned();
        writeln!(file, "{line}").map_err(|err| ScanError::Wal {
            reason: format!("failed to append footer: {err}"),
        })?;
        file.sync_all().map_err(|err| ScanError::Wal {
            reason: format!("failed to fsync footer: {err}"),
        })?;
        if self.lock_held {
            let _ = FileExt::unlock(&*file);
            self.lock_held = false;
        }
        Ok(())
    }

    /// Remove the WAL log without removing the results snapshot; only
    /// called when a scan completes cleanly without needing resumability
    /// (e.g. an empty-root scan).
    pub fn discard(self) -> anyhow::Result<()> {
        let path = self.wal_path.clone();
        drop(self);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

impl Drop for ResumeLog {
    fn drop(&mut self) {
        if self.lock_held {
            if let Ok(file) = self.file.lock() {
                let _ = FileExt::unlock(&*file);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn params() -> WalParams {
        WalParams {
            root: "/videos".to_string(),
            mode: ScanMode::Hybrid,
            extensions: vec![".mp4".to_string(), ".mkv".to_string()],
        }
    }

    #[test]
    fn load_existing_on_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let result = ResumeLog::load_existing(dir.path(), &params()).unwrap();
        assert!(!result.header_matched);
        assert!(result.prior_results.is_empty());
    }

    #[test]
    fn append_then_reload_round_trips() {
        let dir = tempdir().unwrap();
        let mut log = ResumeLog::create(dir.path(), &params(), 1000).unwrap();
        let r = ScanResult::new("/videos/a.mp4", ScanStatus::Healthy, ScanDepth::Quick, 1.0, 0.95, "");
        log.append(&r).unwrap();

        let summary = ScanSummary {
            root: "/videos".to_string(),
            mode: ScanMode::Hybrid,
            healthy: 1,
            corrupt: 0,
            suspicious: 0,
            error: 0,
            total: 1,
            scan_time_seconds: 1.0,
            resumed: false,
            started_at_unix: 1000,
            completed_at_unix: Some(1001),
            stop_reason: None,
        };
        log.finalize(&summary).unwrap();
        drop(log);

        let loaded = ResumeLog::load_existing(dir.path(), &params()).unwrap();
        assert!(loaded.header_matched);
        assert!(loaded.already_complete);
        assert_eq!(loaded.prior_results.len(), 1);
        assert_eq!(loaded.prior_results[0].path, "/videos/a.mp4");
    }

    #[test]
    fn mismatched_header_is_ignored() {
        let dir = tempdir().unwrap();
        let log = ResumeLog::create(dir.path(), &params(), 1000).unwrap();
        drop(log);

        let mut different = params();
        different.mode = ScanMode::Quick;
        let loaded = ResumeLog::load_existing(dir.path(), &different).unwrap();
        assert!(!loaded.header_matched);
    }

    #[test]
    fn deep_result_supersedes_quick_on_reload() {
        let dir = tempdir().unwrap();
        let mut log = ResumeLog::create(dir.path(), &params(), 1000).unwrap();
        log.append(&ScanResult::new(
            "/videos/a.mp4",
            ScanStatus::Suspicious,
            ScanDepth::Quick,
            1.0,
            0.5,
            "soft indicator",
        ))
        .unwrap();
        log.append(&ScanResult::new(
            "/videos/a.mp4",
            ScanStatus::Healthy,
            ScanDepth::Deep,
            5.0,
            0.99,
            "",
        ))
        .unwrap();
        drop(log);

        let loaded = ResumeLog::load_existing(dir.path(), &params()).unwrap();
        assert_eq!(loaded.prior_results.len(), 1);
        assert_eq!(loaded.prior_results[0].depth, ScanDepth::Deep);
        assert_eq!(loaded.prior_results[0].status, ScanStatus::Healthy);
    }

    #[test]
    fn discard_removes_wal_but_keeps_results_snapshot() {
        let dir = tempdir().unwrap();
        let log = ResumeLog::create(dir.path(), &params(), 1000).unwrap();
        let wal_path = log.wal_path.clone();
        let results_path = log.results_path.clone();
        log.append(&ScanResult::new("/videos/a.mp4", ScanStatus::Healthy, ScanDepth::Quick, 1.0, 0.95, ""))
            .unwrap();
        log.discard().unwrap();

        assert!(!wal_path.exists());
        assert!(results_path.exists());
    }

    #[test]
    fn partial_wal_without_footer_is_not_already_complete() {
        let dir = tempdir().unwrap();
        let mut log = ResumeLog::create(dir.path(), &params(), 1000).unwrap();
        log.append(&ScanResult::new("/videos/a.mp4", ScanStatus::Healthy, ScanDepth::Quick, 1.0, 0.95, ""))
            .unwrap();
        drop(log);

        let loaded = ResumeLog::load_existing(dir.path(), &params()).unwrap();
        assert!(loaded.header_matched);
        assert!(!loaded.already_complete);
        assert_eq!(loaded.prior_results.len(), 1);
    }
}
