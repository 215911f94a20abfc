use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::classifier::DriverOutcome;
use crate::domain::{ScanDepth, VideoFile};
use crate::error::ScanError;

use super::process_group;

/// Grace window between SIGTERM-to-group and SIGKILL-to-group.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// How often the wait loop polls the child and the cancel flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Launches the external inspector per file and depth, enforcing a timeout
/// and capturing its diagnostic stream.
#[derive(Debug, Clone)]
pub struct InspectorDriver {
    binary: PathBuf,
    quick_timeout: Duration,
    deep_timeout: Duration,
    /// Seconds of media the quick pass is allowed to decode before ffmpeg's
    /// own `-t` limit trips, independent of the wall-clock timeout. Both are
    /// upper bounds; whichever trips first wins.
    quick_probe_seconds: u64,
}

impl InspectorDriver {
    pub fn new(binary: PathBuf, quick_timeout: Duration, deep_timeout: Duration) -> Self {
        Self {
            binary,
            quick_timeout,
            deep_timeout,
            quick_probe_seconds: 30,
        }
    }

    pub fn with_quick_probe_seconds(mut self, seconds: u64) -> Self {
        self.quick_probe_seconds = seconds;
        self
    }

    /// Resolve an inspector binary name against `PATH`, used when the
    /// caller's [`crate::config::ScanConfig`] leaves the path unset.
    pub fn resolve_from_path(name: &str) -> anyhow::Result<PathBuf> {
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
            #[cfg(windows)]
            {
                let with_exe = dir.join(format!("{name}.exe"));
                if with_exe.is_file() {
                    return Ok(with_exe);
                }
            }
        }
        anyhow::bail!("inspector binary `{name}` not found on PATH")
    }

    fn args_for(&self, depth: ScanDepth, path: &Path) -> Vec<String> {
        let mut args = vec!["-v".to_string(), "error".to_string()];
        if depth == ScanDepth::Quick {
            args.push("-t".to_string());
            args.push(self.quick_probe_seconds.to_string());
        }
        args.push("-i".to_string());
        args.push(path.display().to_string());
        args.push("-f".to_string());
        args.push("null".to_string());
        args.push("-".to_string());
        args
    }

    fn timeout_for(&self, depth: ScanDepth) -> Option<Duration> {
        match depth {
            ScanDepth::Quick => Some(self.quick_timeout),
            ScanDepth::Deep => Some(self.deep_timeout),
            ScanDepth::Full => None,
        }
    }

    /// Run the inspector against one file at one depth. Never returns
    /// `Err` for a non-zero exit code (that is information for the
    /// classifier, not a driver failure) — only for inability to launch the
    /// process or read its output.
    pub fn inspect(
        &self,
        file: &VideoFile,
        depth: ScanDepth,
        cancel: &Arc<AtomicBool>,
    ) -> Result<DriverOutcome, ScanError> {
        let args = self.args_for(depth, file.path());
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        process_group::put_in_new_group(&mut cmd);

        tracing::debug!(path = %file.path().display(), depth = %depth, "launching inspector");

        let mut child = cmd.spawn().map_err(|err| ScanError::Driver {
            path: file.path().display().to_string(),
            reason: format!("failed to spawn inspector: {err}"),
        })?;
        let pid = child.id();

        let mut stderr_pipe = child.stderr.take();
        let stderr_handle = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                pipe.read_to_end(&mut buf)?;
            }
            Ok(buf)
        });

        let start = Instant::now();
        let timeout = self.timeout_for(depth);
        let mut timed_out = false;
        let mut cancelled = false;

        let status = loop {
            if let Some(status) = child.try_wait().map_err(|err| ScanError::Driver {
                path: file.path().display().to_string(),
                reason: format!("failed to poll inspector: {err}"),
            })? {
                break status;
            }

            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
                process_group::terminate_group(pid, TERMINATE_GRACE);
                break child.wait().map_err(|err| ScanError::Driver {
                    path: file.path().display().to_string(),
                    reason: format!("failed to wait after cancel: {err}"),
                })?;
            }

            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    timed_out = true;
                    process_group::terminate_group(pid, TERMINATE_GRACE);
                    break child.wait().map_err(|err| ScanError::Driver {
                        path: file.path().display().to_string(),
                        reason: format!("failed to wait after timeout: {err}"),
                    })?;
                }
            }

            std::thread::sleep(POLL_INTERVAL);
        };

        let stderr_bytes = stderr_handle.join().unwrap_or(Ok(Vec::new())).map_err(|err| {
            ScanError::Driver {
                path: file.path().display().to_string(),
                reason: format!("failed to read inspector stderr: {err}"),
            }
        })?;
        let stderr_text = String::from_utf8_lossy(&stderr_bytes).into_owned();

        if cancelled {
            tracing::debug!(path = %file.path().display(), "inspector cancelled mid-run");
        }

        Ok(DriverOutcome {
            exit_code: status.code(),
            stderr_text,
            timed_out,
            cancelled,
        })
    }
}
