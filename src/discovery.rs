//! Enumerates candidate files under a root with an extension allowlist and
//! an optional content-probe callback, producing a deterministically
//! path-ordered sequence of [`VideoFile`]s. Traversal itself is synchronous
//! I/O-bound work; concurrency lives only in the worker pool.

use std::collections::HashSet;
use std::path::Path;

use walkdir::WalkDir;

use crate::domain::VideoFile;
use crate::sinks::ProgressWarningSink;

/// Inode identity used to break symlink cycles. Falls back to the
/// canonicalized path on platforms without `dev`/`ino`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum VisitedId {
    #[cfg(unix)]
    Inode(u64, u64),
    Path(std::path::PathBuf),
}

fn visited_id(path: &Path, metadata: &std::fs::Metadata) -> VisitedId {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        return VisitedId::Inode(metadata.dev(), metadata.ino());
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        VisitedId::Path(path.to_path_buf())
    }
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let dotted = format!(".{}", ext.to_ascii_lowercase());
    extensions.iter().any(|e| *e == dotted)
}

/// A function `(path) -> is_video?` used to confirm extension candidates.
pub type ContentProbe<'a> = dyn Fn(&Path) -> bool + 'a;

/// Walk `root` and return discovered files in lexicographic path order.
///
/// `extensions` should already be normalized (leading dot, lowercase) by the
/// caller — [`crate::config::ScanConfig`] does this once at controller
/// entry.
pub fn discover(
    root: &Path,
    recursive: bool,
    extensions: &[String],
    content_probe: Option<&ContentProbe<'_>>,
    warnings: &ProgressWarningSink,
) -> anyhow::Result<Vec<VideoFile>> {
    if !root.is_dir() {
        anyhow::bail!("scan root {} is not a directory", root.display());
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut visited: HashSet<VisitedId> = HashSet::new();
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(recursive)
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(|p| p.display().to_string()).unwrap_or_default();
                tracing::warn!(path = %path, error = %err, "skipping unreadable entry");
                warnings.warn(&format!("skipping unreadable entry {path}: {err}"));
                continue;
            }
        };

        if entry.depth() == 0 {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(path = %entry.path().display(), error = %err, "skipping unreadable entry");
                warnings.warn(&format!(
                    "skipping unreadable entry {}: {err}",
                    entry.path().display()
                ));
                continue;
            }
        };

        if !metadata.is_file() {
            continue;
        }

        let id = visited_id(entry.path(), &metadata);
        if !visited.insert(id) {
            continue;
        }

        if !matches_extension(entry.path(), extensions) {
            continue;
        }

        let accepted = match content_probe {
            None => true,
            Some(probe) => {
                if probe(entry.path()) {
                    true
                } else {
                    // The probe is advisory, not a gate: a `false` return is
                    // treated the same as a probe error and still falls
                    // through to extension-only acceptance, just with a
                    // warning. `accepted` is therefore always true here;
                    // the `if !accepted` below exists for a probe that one
                    // day returns a hard rejection.
                    let msg = format!(
                        "content probe rejected or failed for {}; falling back to extension match",
                        entry.path().display()
                    );
                    tracing::warn!(path = %entry.path().display(), "{}", msg);
                    warnings.warn(&msg);
                    true
                }
            }
        };

        if !accepted {
            continue;
        }

        files.push(VideoFile::new(entry.path().to_path_buf(), metadata.len()));
    }

    files.sort();
    Ok(files)
}
