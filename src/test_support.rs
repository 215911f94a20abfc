//! Test-only helpers shared by unit tests across the crate: an env-var
//! guard and lock so env-driven mock-process tests don't race under
//! `cargo test`'s thread-per-test execution, and a locator for the
//! compiled mock-inspector binary.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX.lock().unwrap_or_else(|err| err.into_inner())
}

pub fn set_env<K: AsRef<OsStr>, V: AsRef<OsStr>>(key: K, value: V) {
    unsafe { std::env::set_var(key, value) }
}

pub fn remove_env<K: AsRef<OsStr>>(key: K) {
    unsafe { std::env::remove_var(key) }
}

#[allow(dead_code)]
pub struct EnvVarGuard {
    prev: Vec<(String, Option<OsString>)>,
}

impl EnvVarGuard {
    #[allow(dead_code)]
    pub fn capture<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prev = keys
            .into_iter()
            .map(|k| {
                let key = k.as_ref().to_string();
                let value = std::env::var_os(&key);
                (key, value)
            })
            .collect();

        Self { prev }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.prev.drain(..) {
            match value {
                Some(v) => set_env(&key, v),
                None => remove_env(&key),
            }
        }
    }
}

fn is_candidate_exe(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    if cfg!(windows) {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("exe"))
    } else {
        path.extension().is_none()
    }
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("mock_inspector"))
        })
        .filter(|p| is_candidate_exe(p))
        .collect();
    matches.sort_by(|a, b| {
        let a_m = std::fs::metadata(a).and_then(|m| m.modified()).ok();
        let b_m = std::fs::metadata(b).and_then(|m| m.modified()).ok();
        b_m.cmp(&a_m).then_with(|| a.cmp(b))
    });
    matches.into_iter().next()
}

/// Locate the compiled `tests/mock_inspector.rs` binary so unit tests can
/// drive [`crate::inspector::InspectorDriver`] against a real child process.
pub fn mock_inspector_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_mock_inspector") {
        let p = PathBuf::from(path);
        if p.exists() {
            return p;
        }
    }

    if let Ok(current) = std::env::current_exe() {
        if let Some(dir) = current.parent() {
            if let Some(found) = find_in_dir(dir) {
                return found;
            }
        }
    }

    let crate_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let target_root = crate_root.join("target");
    for profile in ["debug", "release"] {
        let deps_dir = target_root.join(profile).join("deps");
        if deps_dir.exists() {
            if let Some(found) = find_in_dir(&deps_dir) {
                return found;
            }
        }
    }

    panic!("unable to locate mock_inspector executable under target/(debug|release)/deps");
}
